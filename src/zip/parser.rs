//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Walk the Central Directory one record at a time
//!
//! An EOCD that belongs to any disk but the first is rejected with
//! [`ZipDirError::MultiDisk`]. The caller is expected to assemble the
//! whole split set and retry through a reader spanning all of it.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::sync::Arc;

use crate::error::{Result, ZipDirError};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Central directory parser over a shared reader.
pub struct ZipParser {
    /// The underlying data source
    reader: Arc<dyn ReadAt>,
    /// Total size of the archive in bytes
    size: u64,
}

impl ZipParser {
    pub fn new(reader: Arc<dyn ReadAt>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Returns the record and its offset in the archive.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        // Fast path: no archive comment
        if self.size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = self.size - EndOfCentralDirectory::SIZE as u64;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader.read_exact_at(offset, &mut buf).await?;

            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
                return Ok((eocd, offset));
            }
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        // Search backwards, accepting a signature only when the comment
        // length matches the bytes that follow the record
        let last = buf.len().checked_sub(EndOfCentralDirectory::SIZE);
        for i in last.into_iter().flat_map(|last| (0..=last).rev()) {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(ZipDirError::format(
            "end of central directory record signature not found",
        ))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD has fields set to their ZIP64 sentinels.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        // The ZIP64 EOCD Locator is located immediately before the regular EOCD
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| ZipDirError::format("missing ZIP64 end of central directory locator"))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// Locate the central directory and return a cursor positioned at its
    /// first record.
    pub async fn entries(&self) -> Result<EntryCursor> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        if eocd.disk_number != 0 && eocd.disk_number != 0xFFFF {
            return Err(ZipDirError::MultiDisk {
                disk_number: eocd.disk_number,
            });
        }

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            if eocd64.disk_number != 0 {
                return Err(ZipDirError::format(format!(
                    "multi-disk ZIP64 archives are not supported: found disk number: {}",
                    eocd64.disk_number
                )));
            }
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        let cd_end = cd_offset
            .checked_add(cd_size)
            .filter(|end| *end <= self.size)
            .ok_or_else(|| {
                ZipDirError::format(format!(
                    "central directory [{cd_offset}, +{cd_size}) exceeds archive size {}",
                    self.size
                ))
            })?;
        tracing::debug!(cd_offset, cd_size, total_entries, "located central directory");

        Ok(EntryCursor {
            reader: self.reader.clone(),
            next_offset: cd_offset,
            cd_end,
            remaining: total_entries,
        })
    }
}

/// One central directory record as produced by [`EntryCursor::next_entry`].
#[derive(Debug, Clone)]
pub struct CursorEntry {
    /// Archive offset of the raw record, as seen before it was consumed
    pub header_offset: u64,
    pub entry: CentralDirectoryEntry,
}

/// Forward-only walk over the central directory, one record per call.
pub struct EntryCursor {
    reader: Arc<dyn ReadAt>,
    next_offset: u64,
    cd_end: u64,
    remaining: u64,
}

impl EntryCursor {
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read the next record; `None` once all records were consumed.
    pub async fn next_entry(&mut self) -> Result<Option<CursorEntry>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let header_offset = self.next_offset;
        if header_offset + CentralDirectoryHeader::SIZE as u64 > self.cd_end {
            return Err(ZipDirError::format(format!(
                "central directory ends before record at offset {header_offset}"
            )));
        }

        let mut fixed = [0u8; CentralDirectoryHeader::SIZE];
        self.reader.read_exact_at(header_offset, &mut fixed).await?;
        let header = CentralDirectoryHeader::from_bytes(&fixed)?;

        let mut variable = vec![0u8; header.variable_length()];
        let variable_offset = header_offset + CentralDirectoryHeader::SIZE as u64;
        self.reader
            .read_exact_at(variable_offset, &mut variable)
            .await?;

        let entry = parse_entry(&header, &variable)?;
        self.next_offset = variable_offset + variable.len() as u64;
        self.remaining -= 1;

        Ok(Some(CursorEntry {
            header_offset,
            entry,
        }))
    }
}

/// Build an entry from a record's fixed header and its variable part
/// (file name, extra field, comment).
fn parse_entry(header: &CentralDirectoryHeader, variable: &[u8]) -> Result<CentralDirectoryEntry> {
    let name_len = header.file_name_length as usize;
    let extra_len = header.extra_field_length as usize;

    // Use lossy conversion to handle non-UTF8 filenames gracefully
    let file_name = String::from_utf8_lossy(&variable[..name_len]).replace('\\', "/");
    let is_directory = file_name.ends_with('/');

    let mut compressed_size = header.compressed_size as u64;
    let mut uncompressed_size = header.uncompressed_size as u64;
    let mut lfh_offset = header.lfh_offset as u64;

    let extra = &variable[name_len..name_len + extra_len];
    let mut cursor = Cursor::new(extra);
    let extra_end = extra.len() as u64;

    while cursor.position() + 4 <= extra_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()? as u64;
        let field_end = (cursor.position() + field_size).min(extra_end);

        if header_id == 0x0001 {
            // Fields are present only if the corresponding header field is 0xFFFFFFFF
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                lfh_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end);
    }

    Ok(CentralDirectoryEntry {
        file_name,
        compression_method: CompressionMethod::from_u16(header.compression_method),
        compressed_size,
        uncompressed_size,
        crc32: header.crc32,
        lfh_offset,
        last_mod_time: header.last_mod_time,
        last_mod_date: header.last_mod_date,
        is_directory,
    })
}
