//! Scratch storage for deflated entries.
//!
//! A deflated entry is decompressed in full into an anonymous temporary
//! file the first time it is read. Random access is then served from that
//! file. The file is removed by the OS once the extraction is dropped.

use flate2::CrcWriter;
use flate2::write::DeflateDecoder;
use std::fs::File;
use std::io::Write;
use std::ops::Range;

use crate::error::{Result, ZipDirError};
use crate::io::{LocalFileReader, ReadAt};
use crate::options::OpenOptions;

use super::structures::CentralDirectoryEntry;

/// Fully decompressed copy of one entry.
pub struct ScratchExtraction {
    file: LocalFileReader,
}

impl ScratchExtraction {
    /// Decompress the raw bytes in `compressed` into a fresh scratch file.
    ///
    /// Returns only once the whole entry has been written.
    pub async fn materialize(
        reader: &dyn ReadAt,
        compressed: Range<u64>,
        entry: &CentralDirectoryEntry,
        options: &OpenOptions,
    ) -> Result<Self> {
        let file = match &options.scratch_dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        tracing::debug!(
            name = %entry.file_name,
            start = compressed.start,
            end = compressed.end,
            "materializing deflated entry"
        );

        let mut decoder = DeflateDecoder::new(CrcWriter::new(file));
        let mut chunk = vec![0u8; options.chunk_size.max(1)];
        let mut position = compressed.start;
        while position < compressed.end {
            let want = (compressed.end - position).min(chunk.len() as u64) as usize;
            let n = reader.read_at(position, &mut chunk[..want]).await?;
            if n == 0 {
                return Err(ZipDirError::format(format!(
                    "compressed data of '{}' ends at {} instead of {}",
                    entry.file_name, position, compressed.end
                )));
            }
            decoder.write_all(&chunk[..n])?;
            position += n as u64;
        }

        let crc_writer = decoder.finish()?;
        let crc = crc_writer.crc().sum();
        let mut file: File = crc_writer.into_inner();
        file.flush()?;

        let size = file.metadata()?.len();
        if size != entry.uncompressed_size {
            return Err(ZipDirError::format(format!(
                "'{}' decompressed to {} bytes, expected {}",
                entry.file_name, size, entry.uncompressed_size
            )));
        }
        if options.verify_crc && crc != entry.crc32 {
            return Err(ZipDirError::format(format!(
                "crc32 mismatch for '{}': expected 0x{:08x}, got 0x{:08x}",
                entry.file_name, entry.crc32, crc
            )));
        }

        Ok(Self {
            file: LocalFileReader::from_file(file)?,
        })
    }

    pub async fn read_at(&self, position: u64, buf: &mut [u8]) -> Result<usize> {
        self.file.read_at(position, buf).await
    }
}
