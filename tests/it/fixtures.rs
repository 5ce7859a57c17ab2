//! Archive fixtures built on the fly.

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zipdir::{LocalFileReader, ReadAt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Stored,
    Deflate,
    /// Stored bytes labelled with another method id
    Other(u16),
}

pub struct Member {
    pub name: String,
    pub data: Vec<u8>,
    pub method: Method,
    /// Overrides the CRC written to the central directory
    pub crc_override: Option<u32>,
}

impl Member {
    pub fn new(name: &str, data: Vec<u8>, method: Method) -> Self {
        Self {
            name: name.to_string(),
            data,
            method,
            crc_override: None,
        }
    }
}

pub struct BuiltZip {
    pub bytes: Vec<u8>,
    pub lfh_offsets: Vec<u64>,
    pub record_offsets: Vec<u64>,
    pub cd_offset: u64,
}

pub fn crc(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Deterministic pseudo random bytes.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

pub fn build_zip(members: &[Member]) -> BuiltZip {
    let mut out = Vec::new();
    let mut lfh_offsets = Vec::new();
    let mut metas = Vec::new();

    for member in members {
        let (method, payload) = match member.method {
            Method::Stored => (0u16, member.data.clone()),
            Method::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&member.data).unwrap();
                (8, encoder.finish().unwrap())
            }
            Method::Other(id) => (id, member.data.clone()),
        };
        let crc = member.crc_override.unwrap_or_else(|| crc(&member.data));

        lfh_offsets.push(out.len() as u64);
        out.extend(b"PK\x03\x04");
        out.extend(20u16.to_le_bytes());
        out.extend(0u16.to_le_bytes());
        out.extend(method.to_le_bytes());
        out.extend(0x6000u16.to_le_bytes());
        out.extend(0x50cfu16.to_le_bytes());
        out.extend(crc.to_le_bytes());
        out.extend((payload.len() as u32).to_le_bytes());
        out.extend((member.data.len() as u32).to_le_bytes());
        out.extend((member.name.len() as u16).to_le_bytes());
        out.extend(0u16.to_le_bytes());
        out.extend(member.name.as_bytes());
        out.extend(&payload);

        metas.push((method, crc, payload.len() as u32, member.data.len() as u32));
    }

    let cd_offset = out.len() as u64;
    let mut record_offsets = Vec::new();
    for ((member, (method, crc, csize, raw_size)), lfh) in members.iter().zip(metas).zip(&lfh_offsets) {
        record_offsets.push(out.len() as u64);
        out.extend(b"PK\x01\x02");
        out.extend(20u16.to_le_bytes());
        out.extend(20u16.to_le_bytes());
        out.extend(0u16.to_le_bytes());
        out.extend(method.to_le_bytes());
        out.extend(0x6000u16.to_le_bytes());
        out.extend(0x50cfu16.to_le_bytes());
        out.extend(crc.to_le_bytes());
        out.extend(csize.to_le_bytes());
        out.extend(raw_size.to_le_bytes());
        out.extend((member.name.len() as u16).to_le_bytes());
        out.extend(0u16.to_le_bytes());
        out.extend(0u16.to_le_bytes());
        out.extend(0u16.to_le_bytes());
        out.extend(0u16.to_le_bytes());
        out.extend(0u32.to_le_bytes());
        out.extend((*lfh as u32).to_le_bytes());
        out.extend(member.name.as_bytes());
    }
    let cd_size = out.len() as u64 - cd_offset;

    out.extend(b"PK\x05\x06");
    out.extend(0u16.to_le_bytes());
    out.extend(0u16.to_le_bytes());
    out.extend((members.len() as u16).to_le_bytes());
    out.extend((members.len() as u16).to_le_bytes());
    out.extend((cd_size as u32).to_le_bytes());
    out.extend((cd_offset as u32).to_le_bytes());
    out.extend(0u16.to_le_bytes());

    BuiltZip {
        bytes: out,
        lfh_offsets,
        record_offsets,
        cd_offset,
    }
}

/// Split like `zip -s`: fixed size segments, the central directory kept
/// whole on the last one, offsets rewritten relative to their disk.
pub fn split_classic(zip: &BuiltZip, segment_size: u64) -> Vec<Vec<u8>> {
    let mut starts = vec![0u64];
    let mut next = segment_size;
    while next <= zip.cd_offset {
        starts.push(next);
        next += segment_size;
    }
    let disk_of = |offset: u64| starts.iter().rposition(|s| *s <= offset).unwrap();

    let mut bytes = zip.bytes.clone();
    for (record, lfh) in zip.record_offsets.iter().zip(&zip.lfh_offsets) {
        let disk = disk_of(*lfh);
        let rel = *lfh - starts[disk];
        let record = *record as usize;
        bytes[record + 34..record + 36].copy_from_slice(&(disk as u16).to_le_bytes());
        bytes[record + 42..record + 46].copy_from_slice(&(rel as u32).to_le_bytes());
    }

    let last_disk = starts.len() - 1;
    let eocd = bytes.len() - 22;
    bytes[eocd + 4..eocd + 6].copy_from_slice(&(last_disk as u16).to_le_bytes());
    bytes[eocd + 6..eocd + 8].copy_from_slice(&(last_disk as u16).to_le_bytes());
    let rel_cd = zip.cd_offset - starts[last_disk];
    bytes[eocd + 16..eocd + 20].copy_from_slice(&(rel_cd as u32).to_le_bytes());

    let mut segments = Vec::new();
    for (i, start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(bytes.len() as u64);
        segments.push(bytes[*start as usize..end as usize].to_vec());
    }
    segments
}

/// Chop into `parts` pieces, as archivers writing `.zip.001` sets do.
pub fn split_numeric(bytes: &[u8], parts: usize) -> Vec<Vec<u8>> {
    let size = bytes.len().div_ceil(parts);
    bytes.chunks(size).map(<[u8]>::to_vec).collect()
}

/// Write `base.z01`, `base.z02`, ..., `base.zip` and return the last path.
pub fn write_classic(dir: &Path, base: &str, segments: &[Vec<u8>]) -> PathBuf {
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        let name = if i == last {
            format!("{base}.zip")
        } else {
            format!("{base}.z{:02}", i + 1)
        };
        std::fs::write(dir.join(name), segment).unwrap();
    }
    dir.join(format!("{base}.zip"))
}

/// Write `base.zip.001` ... and return the highest-numbered path.
pub fn write_numeric(dir: &Path, base: &str, segments: &[Vec<u8>]) -> PathBuf {
    for (i, segment) in segments.iter().enumerate() {
        std::fs::write(dir.join(format!("{base}.zip.{:03}", i + 1)), segment).unwrap();
    }
    dir.join(format!("{base}.zip.{:03}", segments.len()))
}

/// Reader recording every `read_at` call.
pub struct CountingReader {
    inner: LocalFileReader,
    calls: Mutex<Vec<(u64, usize)>>,
}

impl CountingReader {
    pub fn new(path: &Path) -> Self {
        Self {
            inner: LocalFileReader::new(path).unwrap(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reads_at(&self, offset: u64, len: usize) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| **call == (offset, len))
            .count()
    }

    pub fn reads_starting_at(&self, offset: u64) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| *o == offset)
            .count()
    }
}

#[async_trait]
impl ReadAt for CountingReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> zipdir::Result<usize> {
        self.calls.lock().unwrap().push((offset, buf.len()));
        // let concurrent callers interleave
        tokio::task::yield_now().await;
        self.inner.read_at(offset, buf).await
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}
