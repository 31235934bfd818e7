//! Byte sources for CRX packages.
//!
//! The parser works on an in-memory buffer, so every source is read whole
//! through [`read_all`]. Remote packages are pulled in Range-sized chunks so a
//! dropped connection only costs the current chunk.

mod http;
mod local;

pub use http::{DEFAULT_MAX_RETRY, HttpRangeReader};
pub use local::LocalFileReader;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::debug;

/// Bytes requested per `read_at` call in [`read_all`]
pub const READ_CHUNK_SIZE: usize = 1024 * 1024;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

/// Read an entire source into memory.
///
/// Refuses sources larger than `max_size` before allocating, and fails if the
/// source ends before its advertised size.
pub async fn read_all<R: ReadAt + ?Sized>(reader: &R, max_size: u64) -> Result<Vec<u8>> {
    let size = reader.size();
    if size > max_size {
        bail!("Source is {} bytes, larger than the {} byte limit", size, max_size);
    }

    let mut data = vec![0u8; size as usize];
    let mut filled = 0usize;

    while filled < data.len() {
        let end = (filled + READ_CHUNK_SIZE).min(data.len());
        let n = reader.read_at(filled as u64, &mut data[filled..end]).await?;
        if n == 0 {
            bail!("Source ended after {} of {} bytes", filled, size);
        }
        filled += n;
    }

    debug!(size, "read source");
    Ok(data)
}
