//! ZIP archive parsing and entry access.
//!
//! ## Architecture
//!
//! - `structures`: binary layouts (EOCD, central and local headers)
//! - `parser`: locates the central directory and walks it record by record
//! - `resolver`: turns disk-relative local header offsets into absolute ones
//! - `scratch`: decompresses deflated entries into temporary files
//! - `entry`: random access into one member's content
//!
//! ## Supported Features
//!
//! - Single-file and split archives (through [`MultiDiskReader`](crate::io::MultiDiskReader))
//! - ZIP64 extensions for single-disk archives
//! - STORED and DEFLATE compression methods
//!
//! ## Limitations
//!
//! - No encryption support
//! - No BZIP2, LZMA, or other compression methods

mod entry;
mod parser;
mod resolver;
mod scratch;
mod structures;

pub use entry::Entry;
pub use parser::{CursorEntry, EntryCursor, ZipParser};
pub use resolver::{ResolvedHeader, resolve, resolve_local_header_offset};
pub use scratch::ScratchExtraction;
pub use structures::*;
