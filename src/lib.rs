//! # crxparse
//!
//! A Rust parser for Chrome extension packages (CRX2 and CRX3) with HTTP URL
//! support.
//!
//! This library validates the CRX container around an extension's ZIP
//! archive, hands back the embedded public keys and signatures, and locates
//! the ZIP payload without copying it. It is a read-only structural parser:
//! it neither decompresses the archive nor verifies signatures.
//!
//! ## Features
//!
//! - CRX2 and CRX3 headers, dispatched on the version field
//! - CRX3 `CrxFileHeader` decoding with every key proof in stream order
//! - Extension id from the signed header data or the first public key
//! - Bounds-checked throughout: malformed input yields a typed error, never a panic
//! - Reading packages from local files or HTTP/HTTPS URLs using Range requests
//!
//! ## Example
//!
//! ```
//! use crxparse::{extract_payload, parse_container, FormatVersion};
//!
//! let mut crx = b"Cr24".to_vec();
//! crx.extend_from_slice(&3u32.to_le_bytes());
//! crx.extend_from_slice(&0u32.to_le_bytes()); // empty, unsigned header
//! crx.extend_from_slice(b"PK\x03\x04");
//!
//! let header = parse_container(&crx)?;
//! assert_eq!(header.format_version(), FormatVersion::Crx3);
//!
//! let payload = extract_payload(&crx, &header)?;
//! assert!(payload.looks_like_zip);
//! assert_eq!(payload.as_bytes(), b"PK\x03\x04");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod crx;
pub mod io;

pub use cli::Cli;
pub use crx::proto::decode as decode_header;
pub use crx::{
    ContainerHeader, Crx, CrxError, CrxId, DecodeError, ExtractError, FormatVersion, KeyAlgorithm,
    KeyProof, ParseError, ParseOptions, SignedHeader, ZipCheck, ZipPayload, extract_payload,
    extract_payload_from_offset, extract_payload_with, open, parse_container, parse_container_with,
};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt, read_all};
