//! Directory-style iteration over an archive and the `open` entry point.

use futures::Stream;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, ZipDirError};
use crate::io::{HttpRangeReader, LocalFileReader, MultiDiskReader, ReadAt, SplitNaming};
use crate::options::OpenOptions;
use crate::zip::{CursorEntry, Entry, EntryCursor, ZipParser};

/// Open the archive at `path`.
///
/// Dispatches on the extension:
///
/// - `.zip`: opened as a single file. If the end record names a later disk,
///   the `.z01`, `.z02`, ... siblings are assembled with it into one split set.
/// - `.zip.<digits>`: the suffix is the total disk count and the set
///   `.zip.001` up to the given part is assembled. Open the highest part.
/// - `http://` and `https://` URLs ending in `.zip`: read via Range requests.
///
/// Anything else fails with [`ZipDirError::UnsupportedFormat`].
pub async fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Directory> {
    let path = path.as_ref();
    let shown = path.to_string_lossy().into_owned();
    let lower = shown.to_ascii_lowercase();

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return open_remote(&shown, options).await.map(|(dir, _)| dir);
    }

    if lower.ends_with(".zip") {
        let reader: Arc<dyn ReadAt> = Arc::new(LocalFileReader::new(path)?);
        return match ZipParser::new(reader.clone()).entries().await {
            Ok(cursor) => Ok(Directory::new(shown, reader, cursor, options, 1)),
            Err(err) => match err.disks() {
                Some(disks) => {
                    tracing::debug!(path = %shown, disks, "archive is split, assembling segments");
                    open_split(path, SplitNaming::Classic, disks, options).await
                }
                None => Err(err),
            },
        };
    }

    if let Some((naming, digits)) = SplitNaming::from_numeric_suffix(path) {
        let disks: usize = digits.parse().map_err(|_| {
            ZipDirError::Config(format!("cannot parse disk count from '{shown}'"))
        })?;
        return open_split(path, naming, disks, options).await;
    }

    Err(ZipDirError::UnsupportedFormat(shown))
}

/// Open a remote single-file archive, keeping a handle on its reader for
/// transfer statistics.
///
/// The URL must use `http` or `https` and end in `.zip`, compared
/// case-insensitively.
pub async fn open_remote(
    url: &str,
    options: OpenOptions,
) -> Result<(Directory, Arc<HttpRangeReader>)> {
    let lower = url.to_ascii_lowercase();
    let remote = lower.starts_with("http://") || lower.starts_with("https://");
    if !remote || !lower.ends_with(".zip") {
        return Err(ZipDirError::UnsupportedFormat(url.to_string()));
    }
    let reader = Arc::new(HttpRangeReader::new(url.to_string(), &options).await?);
    let dir = Directory::from_reader(url, reader.clone(), options).await?;
    Ok((dir, reader))
}

async fn open_split(
    path: &Path,
    naming: SplitNaming,
    disks: usize,
    options: OpenOptions,
) -> Result<Directory> {
    let reader = MultiDiskReader::open(path, naming, disks).await?;
    let segments = reader.segment_table().len();
    let reader: Arc<dyn ReadAt> = Arc::new(reader);
    let cursor = ZipParser::new(reader.clone()).entries().await?;
    Ok(Directory::new(
        path.to_string_lossy().into_owned(),
        reader,
        cursor,
        options,
        segments,
    ))
}

/// Forward-only sequence of the entries of an archive.
///
/// Entries come in central directory order. [`read`](Self::read) takes
/// `&mut self`, so a second request cannot be issued while one is pending.
pub struct Directory {
    path: String,
    reader: Arc<dyn ReadAt>,
    cursor: EntryCursor,
    options: Arc<OpenOptions>,
    segments: usize,
    finished: bool,
}

impl Directory {
    fn new(
        path: String,
        reader: Arc<dyn ReadAt>,
        cursor: EntryCursor,
        options: OpenOptions,
        segments: usize,
    ) -> Self {
        Self {
            path,
            reader,
            cursor,
            options: Arc::new(options),
            segments,
            finished: false,
        }
    }

    /// Open an archive through a caller supplied reader.
    ///
    /// The reader must present the archive as one single-disk address space.
    pub async fn from_reader(
        path: impl Into<String>,
        reader: Arc<dyn ReadAt>,
        options: OpenOptions,
    ) -> Result<Self> {
        let cursor = ZipParser::new(reader.clone()).entries().await?;
        Ok(Self::new(path.into(), reader, cursor, options, 1))
    }

    /// Path or URL the archive was opened from
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of physical files backing the archive
    pub fn segment_count(&self) -> usize {
        self.segments
    }

    pub fn is_split(&self) -> bool {
        self.segments > 1
    }

    /// Yield the next entry, or `None` once all entries were returned.
    pub async fn read(&mut self) -> Result<Option<Entry>> {
        if self.finished {
            return Ok(None);
        }
        match self.cursor.next_entry().await? {
            Some(CursorEntry {
                header_offset,
                entry,
            }) => Ok(Some(Entry::new(
                self.reader.clone(),
                entry,
                header_offset,
                self.options.clone(),
            ))),
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Consume the directory as a stream of entries.
    ///
    /// The stream ends after the last entry or after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Entry>> {
        futures::stream::unfold(Some(self), |dir| async move {
            let Some(mut dir) = dir else {
                return None;
            };
            match dir.read().await {
                Ok(Some(entry)) => Some((Ok(entry), Some(dir))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("path", &self.path)
            .field("segments", &self.segments)
            .field("remaining", &self.cursor.remaining())
            .finish()
    }
}
