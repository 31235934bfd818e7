//! Error types for the container parser, header decoder and payload extractor.

use thiserror::Error;

/// Failure to parse the container preamble and header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The first four bytes are not `Cr24`.
    #[error("Invalid CRX file: incorrect magic number")]
    BadMagic,

    /// The version field is neither 2 nor 3.
    #[error("Unsupported CRX version: {0}")]
    UnsupportedVersion(u32),

    /// A fixed field or declared length reads past the end of the buffer.
    #[error("CRX file truncated: need {needed} bytes, have {available}")]
    Truncated { needed: u64, available: u64 },

    /// CRX2 public key is zero-length.
    #[error("Invalid CRX2 structure: public key is empty")]
    EmptyPublicKey,

    /// CRX2 signature is zero-length.
    #[error("Invalid CRX2 structure: signature is empty")]
    EmptySignature,

    /// The CRX3 header body could not be decoded.
    #[error("Invalid CRX3 header: {0}")]
    Header(#[from] DecodeError),
}

/// Failure to decode the CRX3 `CrxFileHeader` record stream.
///
/// Offsets are relative to the start of the header body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A record's declared length overruns the bytes available to it.
    #[error("Record at offset {offset} declares {declared} bytes but only {available} remain")]
    TruncatedRecord {
        offset: usize,
        declared: u64,
        available: usize,
    },

    /// The records do not add up to the declared header length.
    #[error("Header length mismatch: declared {declared} bytes, records span {consumed}")]
    LengthMismatch { declared: usize, consumed: u64 },

    /// A nested record is cut short or starts with an invalid key.
    #[error("Malformed record at offset {offset}")]
    MalformedRecord { offset: usize },

    /// A varint is longer than 10 bytes or overflows 64 bits.
    #[error("Malformed varint at offset {offset}")]
    MalformedVarint { offset: usize },

    /// Group or reserved wire type, which cannot be skipped.
    #[error("Unsupported wire type {wire_type} at offset {offset}")]
    UnsupportedWireType { offset: usize, wire_type: u8 },

    /// A known field arrived with a wire type other than length-delimited.
    #[error("Field {field} has unexpected wire type {wire_type}")]
    UnexpectedWireType { field: u32, wire_type: u8 },

    /// A key proof lacks its public key or its signature.
    #[error("Key proof #{index} is missing its public key or signature")]
    IncompleteProof { index: usize },

    /// `crx_id` in the signed header data is not 16 bytes.
    #[error("Signed header crx_id is {len} bytes, expected 16")]
    InvalidCrxId { len: usize },
}

/// Failure to slice the ZIP payload out of the container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("ZIP offset {offset} is beyond the end of the {len}-byte buffer")]
    OffsetOutOfRange { offset: usize, len: usize },

    #[error("ZIP payload is {len} bytes, too short to hold a signature")]
    EmptyPayload { len: usize },

    /// The payload does not begin with `PK`.
    #[error("Invalid ZIP data in CRX file (PK signature missing, found {found:02x?})")]
    NotZip { found: [u8; 2] },
}

/// Any failure while opening a container and locating its payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrxError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}
