//! Resolution of local file headers to absolute offsets.
//!
//! In a split set a central directory record stores the local header offset
//! relative to the disk the header lives on. The disk number is part of the
//! raw record only, so the record is read again and the offset is shifted by
//! the start of that disk within the virtual address space.

use crate::error::Result;
use crate::io::ReadAt;

use super::structures::{CentralDirectoryEntry, CentralDirectoryHeader, LocalFileHeader};

/// Local file header of an entry, located in the reader's address space.
#[derive(Debug, Clone)]
pub struct ResolvedHeader {
    pub absolute_offset: u64,
    raw: [u8; LocalFileHeader::SIZE],
}

impl ResolvedHeader {
    /// Parse the cached 30-byte record, checking its signature.
    pub fn local_header(&self) -> Result<LocalFileHeader> {
        LocalFileHeader::from_bytes(&self.raw)
    }
}

/// Absolute offset of `entry`'s local header, given the offset of its raw
/// central directory record.
pub async fn resolve_local_header_offset(
    reader: &dyn ReadAt,
    entry: &CentralDirectoryEntry,
    header_offset: u64,
) -> Result<u64> {
    let mut raw = [0u8; CentralDirectoryHeader::SIZE];
    reader.read_exact_at(header_offset, &mut raw).await?;
    let record = CentralDirectoryHeader::from_bytes(&raw)?;

    let absolute = entry.lfh_offset + reader.disk_offset(record.disk_number_start);
    if absolute != entry.lfh_offset {
        tracing::debug!(
            name = %entry.file_name,
            disk = record.disk_number_start,
            from = entry.lfh_offset,
            to = absolute,
            "rebased local header offset"
        );
    }
    Ok(absolute)
}

/// Resolve the local header offset and read the fixed header found there.
pub async fn resolve(
    reader: &dyn ReadAt,
    entry: &CentralDirectoryEntry,
    header_offset: u64,
) -> Result<ResolvedHeader> {
    let absolute_offset = resolve_local_header_offset(reader, entry, header_offset).await?;
    let mut raw = [0u8; LocalFileHeader::SIZE];
    reader.read_exact_at(absolute_offset, &mut raw).await?;
    Ok(ResolvedHeader {
        absolute_offset,
        raw,
    })
}
