//! # zipdir
//!
//! Directory-like read access to ZIP archives, including archives split
//! across several physical files.
//!
//! Two split layouts are understood:
//!
//! - the classic `name.z01`, `name.z02`, ..., `name.zip` sets written by
//!   `zip -s`, opened through the final `name.zip`
//! - the `name.zip.001` ... `name.zip.NNN` sets written by some archivers,
//!   opened through the highest-numbered part
//!
//! A split set is presented as one contiguous address space. The trailing
//! end of central directory record is rewritten on the fly and local header
//! offsets are rebased per disk, so the archive reads like a plain
//! single-file one.
//!
//! ## Features
//!
//! - Single-file, split and remote (HTTP Range) archives
//! - Random access into STORED entries straight from the archive
//! - Random access into DEFLATE entries through a decompressed scratch file
//! - ZIP64 for single-disk archives
//!
//! ## Example
//!
//! ```no_run
//! use zipdir::OpenOptions;
//!
//! #[tokio::main]
//! async fn main() -> zipdir::Result<()> {
//!     let mut dir = zipdir::open("backup.zip", OpenOptions::default()).await?;
//!     while let Some(entry) = dir.read().await? {
//!         let mut head = [0u8; 16];
//!         let n = if entry.size() > 0 { entry.read(&mut head, 0).await? } else { 0 };
//!         println!("{} ({} bytes) starts with {:02x?}", entry.name(), entry.size(), &head[..n]);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
mod dir;
pub mod error;
pub mod io;
mod options;
pub mod zip;

pub use cli::Cli;
pub use dir::{Directory, open, open_remote};
pub use error::{Result, ZipDirError};
pub use io::{HttpRangeReader, LocalFileReader, MultiDiskReader, ReadAt};
pub use options::{DEFAULT_CHUNK_SIZE, OpenOptions};
pub use zip::{CompressionMethod, Entry};

/// Read up to `length` bytes of `entry`'s content at `position` into
/// `buffer[dest_offset..]`.
///
/// Returns the number of bytes read, short only at the end of the entry.
pub async fn read(
    entry: &Entry,
    buffer: &mut [u8],
    dest_offset: usize,
    length: usize,
    position: u64,
) -> Result<usize> {
    let end = dest_offset
        .checked_add(length)
        .filter(|end| *end <= buffer.len())
        .ok_or_else(|| {
            ZipDirError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "range {dest_offset}+{length} exceeds buffer of {} bytes",
                    buffer.len()
                ),
            ))
        })?;
    entry.read(&mut buffer[dest_offset..end], position).await
}
