//! Per-entry read surface.
//!
//! An [`Entry`] moves through these states:
//!
//! - unresolved: only the central directory record is known
//! - header resolved: the local header's absolute offset is known and its
//!   fixed part is cached
//! - stored entries are then read straight from the archive; deflated
//!   entries are materialized into scratch storage once and read from there
//!
//! Both lazy steps are single-flight: concurrent readers of an entry wait
//! on the same in-flight resolution or materialization instead of starting
//! their own.

use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::{Result, ZipDirError};
use crate::io::ReadAt;
use crate::options::OpenOptions;

use super::resolver::{self, ResolvedHeader};
use super::scratch::ScratchExtraction;
use super::structures::{CentralDirectoryEntry, CompressionMethod};

/// One archive member yielded by [`Directory::read`](crate::Directory::read).
pub struct Entry {
    reader: Arc<dyn ReadAt>,
    record: CentralDirectoryEntry,
    header_offset: u64,
    options: Arc<OpenOptions>,
    header: OnceCell<ResolvedHeader>,
    scratch: OnceCell<ScratchExtraction>,
}

impl Entry {
    pub(crate) fn new(
        reader: Arc<dyn ReadAt>,
        record: CentralDirectoryEntry,
        header_offset: u64,
        options: Arc<OpenOptions>,
    ) -> Self {
        Self {
            reader,
            record,
            header_offset,
            options,
            header: OnceCell::new(),
            scratch: OnceCell::new(),
        }
    }

    /// Member path, forward-slash separated
    pub fn name(&self) -> &str {
        &self.record.file_name
    }

    /// Uncompressed size in bytes
    pub fn size(&self) -> u64 {
        self.record.uncompressed_size
    }

    pub fn compressed_size(&self) -> u64 {
        self.record.compressed_size
    }

    pub fn crc32(&self) -> u32 {
        self.record.crc32
    }

    pub fn compression_method(&self) -> CompressionMethod {
        self.record.compression_method
    }

    pub fn is_directory(&self) -> bool {
        self.record.is_directory
    }

    pub fn mod_date(&self) -> (u16, u8, u8) {
        self.record.mod_date()
    }

    pub fn mod_time(&self) -> (u8, u8, u8) {
        self.record.mod_time()
    }

    /// Offset of the raw central directory record
    pub fn header_offset(&self) -> u64 {
        self.header_offset
    }

    /// Whether a deflated entry already sits in scratch storage
    pub fn is_materialized(&self) -> bool {
        self.scratch.initialized()
    }

    async fn resolved_header(&self) -> Result<&ResolvedHeader> {
        self.header
            .get_or_try_init(|| resolver::resolve(&*self.reader, &self.record, self.header_offset))
            .await
    }

    /// Absolute offset of the local file header, resolving it if needed.
    pub async fn local_header_offset(&self) -> Result<u64> {
        Ok(self.resolved_header().await?.absolute_offset)
    }

    /// Read decompressed content starting at `position` into `buf`.
    ///
    /// Returns the number of bytes copied, which is short only at the end
    /// of the entry. A `position` at or past the end fails with
    /// [`ZipDirError::EndOfData`].
    pub async fn read(&self, buf: &mut [u8], position: u64) -> Result<usize> {
        let header = self.resolved_header().await?;
        let local = header.local_header()?;
        let data_start = local.data_offset(header.absolute_offset);
        let data_end = data_start + self.record.compressed_size;
        let size = self.record.uncompressed_size;

        match self.record.compression_method {
            CompressionMethod::Stored => {
                if position >= size {
                    return Err(ZipDirError::EndOfData { position, size });
                }
                let start = data_start + position;
                let to_copy = (buf.len() as u64).min(data_end.saturating_sub(start)) as usize;
                self.reader.read_at(start, &mut buf[..to_copy]).await
            }
            CompressionMethod::Deflate => {
                if position >= size {
                    return Err(ZipDirError::EndOfData { position, size });
                }
                let to_copy = (buf.len() as u64).min(size - position) as usize;
                let scratch = self
                    .scratch
                    .get_or_try_init(|| {
                        ScratchExtraction::materialize(
                            &*self.reader,
                            data_start..data_end,
                            &self.record,
                            &self.options,
                        )
                    })
                    .await?;
                scratch.read_at(position, &mut buf[..to_copy]).await
            }
            CompressionMethod::Unknown(method) => Err(ZipDirError::UnsupportedCompression(method)),
        }
    }

    /// Read the whole decompressed content.
    pub async fn read_to_end(&self) -> Result<Vec<u8>> {
        let mut data = vec![0u8; self.size() as usize];
        let mut filled = 0;
        while filled < data.len() {
            let n = self.read(&mut data[filled..], filled as u64).await?;
            if n == 0 {
                return Err(ZipDirError::format(format!(
                    "'{}' ended after {} of {} bytes",
                    self.name(),
                    filled,
                    data.len()
                )));
            }
            filled += n;
        }
        Ok(data)
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.record.file_name)
            .field("size", &self.record.uncompressed_size)
            .field("method", &self.record.compression_method)
            .field("header_offset", &self.header_offset)
            .finish()
    }
}
