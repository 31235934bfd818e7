//! Container header parser.
//!
//! This module reads the CRX preamble, dispatches on the format version and
//! produces a [`ContainerHeader`] whose byte fields borrow from the input.
//!
//! ## Parsing Strategy
//!
//! 1. Check the `Cr24` magic and read the little-endian version
//! 2. CRX2: read the key and signature lengths, slice both out
//! 3. CRX3: read the header length and hand the bounded body to the
//!    [`proto`](super::proto) decoder
//!
//! Every declared length is checked against the buffer before it is used, so
//! the ZIP offset of a successfully parsed header never exceeds the input.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use tracing::debug;

use super::error::ParseError;
use super::extractor::ZipCheck;
use super::proto;
use super::structures::*;

/// Knobs for [`parse_container_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Reject CRX2 files whose public key or signature is empty
    pub require_crx2_proof: bool,
    /// What [`open`](super::open) does when the payload does not start with
    /// `PK`. Header parsing never looks at the payload and ignores this.
    pub zip_check: ZipCheck,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            require_crx2_proof: true,
            zip_check: ZipCheck::Strict,
        }
    }
}

impl ParseOptions {
    pub fn require_crx2_proof(mut self, require: bool) -> Self {
        self.require_crx2_proof = require;
        self
    }

    pub fn zip_check(mut self, check: ZipCheck) -> Self {
        self.zip_check = check;
        self
    }
}

/// Parse a CRX container header with the default options.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first structural violation found.
///
/// # Example
///
/// ```
/// let mut crx = Vec::new();
/// crx.extend_from_slice(b"Cr24");
/// crx.extend_from_slice(&2u32.to_le_bytes());
/// crx.extend_from_slice(&3u32.to_le_bytes());
/// crx.extend_from_slice(&3u32.to_le_bytes());
/// crx.extend_from_slice(b"keysig");
/// crx.extend_from_slice(b"PK\x03\x04");
///
/// let header = crxparse::parse_container(&crx).unwrap();
/// assert_eq!(header.zip_offset(), 22);
/// assert_eq!(header.public_keys(), vec![&b"key"[..]]);
/// ```
pub fn parse_container(data: &[u8]) -> Result<ContainerHeader<'_>, ParseError> {
    parse_container_with(data, &ParseOptions::default())
}

/// Parse a CRX container header.
pub fn parse_container_with<'a>(
    data: &'a [u8],
    options: &ParseOptions,
) -> Result<ContainerHeader<'a>, ParseError> {
    // Judge the magic on whatever prefix exists so short garbage is BadMagic
    let prefix_len = data.len().min(CRX_MAGIC.len());
    if data[..prefix_len] != CRX_MAGIC[..prefix_len] {
        return Err(ParseError::BadMagic);
    }
    ensure_len(data, COMMON_PREAMBLE_SIZE as u64)?;

    let mut cursor = Cursor::new(data);
    cursor.set_position(CRX_MAGIC.len() as u64);
    let raw_version = read_u32(&mut cursor, data)?;
    let version =
        FormatVersion::from_u32(raw_version).ok_or(ParseError::UnsupportedVersion(raw_version))?;

    let header = match version {
        FormatVersion::Crx2 => parse_crx2(&mut cursor, data, options)?,
        FormatVersion::Crx3 => parse_crx3(&mut cursor, data)?,
    };

    debug!(
        %version,
        zip_offset = header.zip_offset(),
        proofs = header.proofs().len(),
        "parsed CRX header"
    );

    Ok(header)
}

fn parse_crx2<'a>(
    cursor: &mut Cursor<&'a [u8]>,
    data: &'a [u8],
    options: &ParseOptions,
) -> Result<ContainerHeader<'a>, ParseError> {
    let preamble = FormatVersion::Crx2.preamble_size();
    ensure_len(data, preamble as u64)?;

    let key_len = read_u32(cursor, data)?;
    let sig_len = read_u32(cursor, data)?;

    // u64 keeps the sum of two u32 lengths from wrapping
    let zip_offset = preamble as u64 + u64::from(key_len) + u64::from(sig_len);
    ensure_len(data, zip_offset)?;

    let key_start = preamble;
    let key_end = key_start + key_len as usize;
    let sig_end = key_end + sig_len as usize;
    let public_key = slice(data, key_start, key_end)?;
    let signature = slice(data, key_end, sig_end)?;

    if options.require_crx2_proof {
        if public_key.is_empty() {
            return Err(ParseError::EmptyPublicKey);
        }
        if signature.is_empty() {
            return Err(ParseError::EmptySignature);
        }
    }

    Ok(ContainerHeader::Crx2 {
        proof: KeyProof {
            algorithm: None,
            public_key,
            signature,
        },
        zip_offset: sig_end,
    })
}

fn parse_crx3<'a>(
    cursor: &mut Cursor<&'a [u8]>,
    data: &'a [u8],
) -> Result<ContainerHeader<'a>, ParseError> {
    let preamble = FormatVersion::Crx3.preamble_size();
    ensure_len(data, preamble as u64)?;

    let header_length = read_u32(cursor, data)?;
    let zip_offset = preamble as u64 + u64::from(header_length);
    ensure_len(data, zip_offset)?;

    let body_end = preamble + header_length as usize;
    let body = slice(data, preamble, body_end)?;
    let header = proto::decode_within(body, data.len() - body_end)?;

    Ok(ContainerHeader::Crx3 {
        header_length,
        header,
        zip_offset: body_end,
    })
}

fn ensure_len(data: &[u8], needed: u64) -> Result<(), ParseError> {
    let available = data.len() as u64;
    if needed > available {
        return Err(ParseError::Truncated { needed, available });
    }
    Ok(())
}

fn read_u32(cursor: &mut Cursor<&[u8]>, data: &[u8]) -> Result<u32, ParseError> {
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| ParseError::Truncated {
            needed: cursor.position() + 4,
            available: data.len() as u64,
        })
}

fn slice(data: &[u8], start: usize, end: usize) -> Result<&[u8], ParseError> {
    data.get(start..end).ok_or(ParseError::Truncated {
        needed: end as u64,
        available: data.len() as u64,
    })
}
