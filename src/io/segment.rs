//! Physical segments of a split archive and their place in the virtual
//! address space.

use std::path::{Path, PathBuf};

use crate::error::{Result, ZipDirError};

/// Naming convention of a split set.
///
/// The convention is dictated by the tool that wrote the set and has to be
/// matched exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitNaming {
    /// `name.z01`, `name.z02`, ..., with `name.zip` as the last disk.
    Classic,
    /// `name.zip.001`, `name.zip.002`, ... with every part numbered.
    /// `width` is the digit count of the suffix.
    Numeric { width: usize },
}

impl SplitNaming {
    /// Detect `name.zip.<digits>` and return the naming plus the disk count
    /// encoded in the suffix.
    pub fn from_numeric_suffix(path: &Path) -> Option<(Self, &str)> {
        let name = path.file_name()?.to_str()?;
        let (stem, digits) = name.rsplit_once('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !stem.to_ascii_lowercase().ends_with(".zip") {
            return None;
        }
        Some((
            Self::Numeric {
                width: digits.len(),
            },
            digits,
        ))
    }

    /// Paths of all `disks` segments of the set `path` belongs to, first disk first.
    pub fn segment_paths(&self, path: &Path, disks: usize) -> Result<Vec<PathBuf>> {
        if disks == 0 {
            return Err(ZipDirError::Config(format!(
                "unexpected disk count 0 for '{}'",
                path.display()
            )));
        }
        let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
            ZipDirError::Config(format!("non UTF-8 file name '{}'", path.display()))
        })?;

        let mut paths = Vec::with_capacity(disks);
        match *self {
            Self::Classic => {
                // name.zip -> name.z
                let base = name.get(..name.len().saturating_sub(2)).unwrap_or_default();
                for i in 1..disks {
                    paths.push(path.with_file_name(format!("{base}{i:02}")));
                }
                paths.push(path.to_path_buf());
            }
            Self::Numeric { width } => {
                let base = name.get(..name.len().saturating_sub(width)).unwrap_or_default();
                for i in 1..=disks {
                    paths.push(path.with_file_name(format!("{base}{i:0width$}")));
                }
            }
        }
        Ok(paths)
    }
}

/// One physical file of the virtual address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub path: PathBuf,
    pub size: u64,
    /// Sum of the sizes of all preceding segments
    pub start_offset: u64,
}

/// Ordered, contiguous list of segments. Disk `i` of the archive is `segments[i]`.
#[derive(Debug, Clone)]
pub struct SegmentTable {
    segments: Vec<Segment>,
    total_size: u64,
}

impl SegmentTable {
    /// Stat every segment of the set and lay them out back to back.
    pub async fn build(path: &Path, naming: SplitNaming, disks: usize) -> Result<Self> {
        let paths = naming.segment_paths(path, disks)?;
        let mut sized = Vec::with_capacity(paths.len());
        for path in paths {
            let meta = tokio::fs::metadata(&path).await.map_err(|e| {
                ZipDirError::Io(std::io::Error::new(
                    e.kind(),
                    format!("segment '{}': {}", path.display(), e),
                ))
            })?;
            tracing::debug!(segment = %path.display(), size = meta.len(), "found segment");
            sized.push((path, meta.len()));
        }
        let table = Self::from_sizes(sized);
        tracing::debug!(
            segments = table.len(),
            total_size = table.total_size,
            "built segment table"
        );
        Ok(table)
    }

    /// Lay out already sized segments in order.
    pub fn from_sizes(sized: impl IntoIterator<Item = (PathBuf, u64)>) -> Self {
        let mut offset = 0u64;
        let segments: Vec<Segment> = sized
            .into_iter()
            .map(|(path, size)| {
                let segment = Segment {
                    path,
                    size,
                    start_offset: offset,
                };
                offset += size;
                segment
            })
            .collect();
        Self {
            segments,
            total_size: offset,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Size of the final segment, the one holding the end record.
    pub fn last_size(&self) -> u64 {
        self.segments.last().map_or(0, |s| s.size)
    }

    /// Virtual offset where 0-indexed `disk` begins; unknown disks map to 0.
    pub fn start_offset_of_disk(&self, disk: u16) -> u64 {
        self.segments
            .get(disk as usize)
            .map_or(0, |s| s.start_offset)
    }
}
