//! CRX container parsing and payload extraction.
//!
//! This module reads Chrome extension packages, validates their container
//! header and locates the ZIP archive they wrap. It never decompresses the
//! archive and never verifies signatures; keys and signatures are handed back
//! as raw bytes.
//!
//! ## Architecture
//!
//! - [`structures`]: constants and the parsed header/payload types
//! - [`parser`]: container preamble parsing and version dispatch
//! - [`proto`]: decoder for the CRX3 protobuf header body
//! - [`extractor`]: ZIP payload slicing and the `PK` smoke test
//!
//! ## CRX Format Overview
//!
//! ```text
//! offset  size        CRX2                    CRX3
//! 0       4           "Cr24"                  "Cr24"
//! 4       4           version = 2 (LE)        version = 3 (LE)
//! 8       4           key length (LE)         header length N (LE)
//! 12      4 / N       signature length (LE)   CrxFileHeader (protobuf)
//! 16      key length  public key
//! ...     sig length  signature
//! zip_offset          ZIP archive             ZIP archive
//! ```
//!
//! All parsed values borrow from the caller's buffer; nothing is copied until
//! the caller asks for it.

mod error;
mod extractor;
mod parser;
pub mod proto;
mod structures;

pub use error::{CrxError, DecodeError, ExtractError, ParseError};
pub use extractor::{ZipCheck, extract_payload, extract_payload_from_offset, extract_payload_with};
pub use parser::{ParseOptions, parse_container, parse_container_with};
pub use structures::*;

/// A parsed container together with its ZIP payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crx<'a> {
    pub header: ContainerHeader<'a>,
    pub payload: ZipPayload<'a>,
}

/// Parse the header and slice out the payload in one step.
pub fn open<'a>(data: &'a [u8], options: &ParseOptions) -> Result<Crx<'a>, CrxError> {
    let header = parse_container_with(data, options)?;
    let payload = extract_payload_with(data, &header, options.zip_check)?;
    Ok(Crx { header, payload })
}
