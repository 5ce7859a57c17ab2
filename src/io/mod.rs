//! Random-access byte sources.
//!
//! Every archive is read through [`ReadAt`]: a single local file, a split
//! set stitched into one address space by [`MultiDiskReader`], or a remote
//! file fetched with HTTP Range requests.

mod http;
mod local;
mod multi_disk;
mod segment;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;
pub use multi_disk::{EocdPatch, MultiDiskReader, patch_end_of_central_directory};
pub use segment::{Segment, SegmentTable, SplitNaming};

use crate::error::{Result, ZipDirError};
use async_trait::async_trait;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// Returns fewer bytes than requested only at the end of the source.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Start of `disk` within this source's address space.
    ///
    /// Only split sets have more than one disk; everything else starts at 0.
    fn disk_offset(&self, _disk: u16) -> u64 {
        0
    }

    /// Fill `buf` completely or fail with [`ZipDirError::Format`].
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let read = self.read_at(offset, buf).await?;
        if read != buf.len() {
            return Err(ZipDirError::format(format!(
                "short read at offset {}: got {} expected {}",
                offset,
                read,
                buf.len()
            )));
        }
        Ok(())
    }
}
