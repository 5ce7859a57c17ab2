//! Virtual reader presenting a split set as one contiguous archive.
//!
//! Besides stitching the segments together, the reader rewrites the end of
//! central directory record whenever a read reaches the tail of the address
//! space. The rewritten record claims disk 0 and points at the central
//! directory's virtual position, so a parser written for single-file
//! archives can read the set unmodified.

use async_trait::async_trait;
use byteorder::{ByteOrder, LittleEndian};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use super::ReadAt;
use super::segment::{SegmentTable, SplitNaming};
use crate::error::Result;
use crate::zip::EndOfCentralDirectory;

/// Random access over all segments of a split archive.
///
/// Segment files are opened for each read and closed again afterwards.
pub struct MultiDiskReader {
    table: SegmentTable,
}

impl MultiDiskReader {
    pub fn new(table: SegmentTable) -> Self {
        Self { table }
    }

    /// Discover the segments of the set `path` belongs to.
    pub async fn open(path: &Path, naming: SplitNaming, disks: usize) -> Result<Self> {
        tracing::debug!(path = %path.display(), disks, ?naming, "opening split archive");
        Ok(Self::new(SegmentTable::build(path, naming, disks).await?))
    }

    pub fn segment_table(&self) -> &SegmentTable {
        &self.table
    }
}

#[async_trait]
impl ReadAt for MultiDiskReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let length = buf.len();
        let mut read = 0usize;
        let mut skipped = 0u64;

        for segment in self.table.segments() {
            if read >= length {
                break;
            }
            let position = offset + read as u64;
            if position < skipped + segment.size {
                let offset_in_file = position - skipped;
                let to_copy = (length - read).min((segment.size - offset_in_file) as usize);
                tracing::trace!(
                    segment = %segment.path.display(),
                    start = offset_in_file,
                    len = to_copy,
                    "copying from segment"
                );
                let mut file = tokio::fs::File::open(&segment.path).await?;
                file.seek(SeekFrom::Start(offset_in_file)).await?;
                file.read_exact(&mut buf[read..read + to_copy]).await?;
                read += to_copy;
            }
            skipped += segment.size;
        }

        if offset + length as u64 >= self.table.total_size() {
            patch_end_of_central_directory(&mut buf[..read], &self.table);
        }
        Ok(read)
    }

    fn size(&self) -> u64 {
        self.table.total_size()
    }

    fn disk_offset(&self, disk: u16) -> u64 {
        self.table.start_offset_of_disk(disk)
    }
}

/// Outcome of [`patch_end_of_central_directory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EocdPatch {
    /// No end record signature in the buffer
    NotFound,
    /// The record already names disk 0
    Unchanged,
    /// Disk number and central directory offset were rewritten
    Patched { old_cd_offset: u32, new_cd_offset: u32 },
    /// The record was left as is, the archive may fail to parse later
    Skipped { disk_number: u16 },
}

/// Rewrite the last end of central directory record in `buf` in place.
///
/// A record on disk `n != 0` gets disk number 0 and a central directory
/// offset that keeps its distance to the end of the last segment:
/// `total_size - (last_size - old_offset)`.
pub fn patch_end_of_central_directory(buf: &mut [u8], table: &SegmentTable) -> EocdPatch {
    let Some(last_start) = buf.len().checked_sub(EndOfCentralDirectory::SIZE) else {
        return EocdPatch::NotFound;
    };
    let Some(pos) = (0..=last_start)
        .rev()
        .find(|&j| &buf[j..j + 4] == EndOfCentralDirectory::SIGNATURE)
    else {
        return EocdPatch::NotFound;
    };
    let record = &mut buf[pos..pos + EndOfCentralDirectory::SIZE];

    let disk_number = LittleEndian::read_u16(&record[4..6]);
    if disk_number == 0 {
        return EocdPatch::Unchanged;
    }
    if disk_number as usize > table.len() {
        tracing::warn!(
            disk_number,
            segments = table.len(),
            "end of central directory names a disk beyond the known segments, leaving it unmodified"
        );
        return EocdPatch::Skipped { disk_number };
    }

    let old_cd_offset = LittleEndian::read_u32(&record[16..20]);
    let new_cd_offset = table
        .last_size()
        .checked_sub(old_cd_offset as u64)
        .and_then(|distance| table.total_size().checked_sub(distance))
        .and_then(|offset| u32::try_from(offset).ok());
    let Some(new_cd_offset) = new_cd_offset else {
        tracing::warn!(
            disk_number,
            cd_offset = old_cd_offset,
            "central directory offset does not fit the last segment, leaving it unmodified"
        );
        return EocdPatch::Skipped { disk_number };
    };

    LittleEndian::write_u16(&mut record[4..6], 0);
    LittleEndian::write_u32(&mut record[16..20], new_cd_offset);
    tracing::debug!(
        disk_number,
        old_cd_offset,
        new_cd_offset,
        "patched end of central directory"
    );
    EocdPatch::Patched {
        old_cd_offset,
        new_cd_offset,
    }
}
