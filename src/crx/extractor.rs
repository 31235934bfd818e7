use tracing::warn;

use super::error::ExtractError;
use super::structures::{ContainerHeader, ZIP_SIGNATURE, ZipPayload};

/// Policy for a payload that does not start with `PK`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZipCheck {
    /// Fail with [`ExtractError::NotZip`]
    #[default]
    Strict,
    /// Return the payload with `looks_like_zip == false` and log a warning
    Lenient,
}

/// Slice the ZIP payload described by `header` out of `data`.
///
/// The header is not trusted: its offset is re-checked against `data`.
pub fn extract_payload<'a>(
    data: &'a [u8],
    header: &ContainerHeader<'_>,
) -> Result<ZipPayload<'a>, ExtractError> {
    extract_payload_with(data, header, ZipCheck::Strict)
}

pub fn extract_payload_with<'a>(
    data: &'a [u8],
    header: &ContainerHeader<'_>,
    check: ZipCheck,
) -> Result<ZipPayload<'a>, ExtractError> {
    slice_payload(data, header.zip_offset(), check)
}

/// Slice the payload at a previously obtained offset without re-parsing.
///
/// Applies the same checks as [`extract_payload`].
pub fn extract_payload_from_offset(data: &[u8], zip_offset: usize) -> Result<&[u8], ExtractError> {
    slice_payload(data, zip_offset, ZipCheck::Strict).map(|payload| payload.bytes)
}

fn slice_payload(
    data: &[u8],
    zip_offset: usize,
    check: ZipCheck,
) -> Result<ZipPayload<'_>, ExtractError> {
    let bytes = data
        .get(zip_offset..)
        .ok_or(ExtractError::OffsetOutOfRange {
            offset: zip_offset,
            len: data.len(),
        })?;

    let &[first, second, ..] = bytes else {
        return Err(ExtractError::EmptyPayload { len: bytes.len() });
    };

    let looks_like_zip = [first, second] == *ZIP_SIGNATURE;
    if !looks_like_zip {
        match check {
            ZipCheck::Strict => {
                return Err(ExtractError::NotZip {
                    found: [first, second],
                });
            }
            ZipCheck::Lenient => warn!(
                zip_offset,
                found = ?[first, second],
                "payload does not start with a ZIP signature"
            ),
        }
    }

    Ok(ZipPayload {
        bytes,
        looks_like_zip,
    })
}
