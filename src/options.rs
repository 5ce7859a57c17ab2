//! Options controlling how an archive is opened and read.

use std::path::PathBuf;
use std::time::Duration;

/// Default chunk size for streaming compressed data and copying entries
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Options passed to [`open`](crate::open).
///
/// ```
/// use zipdir::OpenOptions;
///
/// let options = OpenOptions::new().verify_crc(false).chunk_size(64 * 1024);
/// assert!(!options.verify_crc);
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Directory for scratch files holding decompressed entries
    pub scratch_dir: Option<PathBuf>,
    /// Verify the CRC-32 of materialized entries
    pub verify_crc: bool,
    /// Chunk size used when pulling compressed data through the decoder
    pub chunk_size: usize,
    /// Per-request timeout for remote archives
    pub http_timeout: Duration,
    /// Retries for remote range requests on connect or timeout errors
    pub http_max_retry: u32,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            verify_crc: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            http_timeout: Duration::from_secs(30),
            http_max_retry: 10,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn verify_crc(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// Zero is treated as one byte.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn http_max_retry(mut self, retries: u32) -> Self {
        self.http_max_retry = retries;
        self
    }
}
