//! Error types for archive access.

use thiserror::Error;

/// Errors that can occur while opening or reading an archive
#[derive(Debug, Error)]
pub enum ZipDirError {
    /// A segment file is missing or unreadable, or another I/O failure occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad signature or malformed record; the archive is corrupt or an offset is wrong
    #[error("Invalid archive format: {0}")]
    Format(String),

    /// The entry uses a compression method other than store or deflate
    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// The read position is at or past the entry's logical end
    #[error("End of data: position {position} is not below entry size {size}")]
    EndOfData { position: u64, size: u64 },

    /// The path does not carry a recognized archive extension
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// A disk count could not be derived
    #[error("Configuration error: {0}")]
    Config(String),

    /// The archive's end record names a disk other than the first.
    ///
    /// Raised by the central-directory parser when it is handed a single
    /// physical file that is only the last part of a split set.
    #[error("multi-disk zip files are not supported: found disk number: {disk_number}")]
    MultiDisk { disk_number: u16 },
}

impl ZipDirError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Number of disks announced by a multi-disk rejection.
    pub fn disks(&self) -> Option<usize> {
        match self {
            Self::MultiDisk { disk_number } => Some(*disk_number as usize + 1),
            _ => None,
        }
    }

    /// Whether this signals a short read at the end of an entry rather than a failure.
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Self::EndOfData { .. })
    }

    /// Whether this is an I/O error caused by a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<reqwest::Error> for ZipDirError {
    fn from(err: reqwest::Error) -> Self {
        Self::Io(std::io::Error::other(err))
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ZipDirError>;
