use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use zipdir::{CompressionMethod, Directory, Entry, OpenOptions, ZipDirError};

use crate::fixtures::{CountingReader, Member, Method, build_zip, crc, random_bytes};

async fn first_entry(path: &Path, options: OpenOptions) -> Entry {
    let mut archive = zipdir::open(path, options).await.unwrap();
    archive.read().await.unwrap().expect("archive has an entry")
}

fn write_archive(dir: &Path, members: &[Member]) -> std::path::PathBuf {
    let path = dir.join("test.zip");
    std::fs::write(&path, build_zip(members).bytes).unwrap();
    path
}

#[tokio::test]
async fn reads_stored_entry() {
    let dir = tempfile::tempdir().unwrap();
    let data = random_bytes(100_000, 1);
    let path = write_archive(dir.path(), &[Member::new("randfile.bin", data.clone(), Method::Stored)]);

    let entry = first_entry(&path, OpenOptions::default()).await;
    assert_eq!(entry.compression_method(), CompressionMethod::Stored);
    let mut buf = vec![0u8; entry.size() as usize];
    let n = entry.read(&mut buf, 0).await.unwrap();
    assert_eq!(n, data.len());
    assert_eq!(crc(&buf), entry.crc32());
    assert!(buf == data, "stored content differs");

    // short read at the end, then end of data
    let mut tail = [0u8; 64];
    assert_eq!(entry.read(&mut tail, 99_990).await.unwrap(), 10);
    assert_eq!(&tail[..10], &data[99_990..]);
    let err = entry.read(&mut tail, 100_000).await.unwrap_err();
    assert!(err.is_end_of_data(), "unexpected error {err}");
}

#[tokio::test]
async fn reads_deflated_entry_at_random_positions() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = random_bytes(50_000, 2);
    data.extend(vec![0u8; 200_000]);
    let path = write_archive(dir.path(), &[Member::new("mixed.bin", data.clone(), Method::Deflate)]);

    let entry = first_entry(&path, OpenOptions::default().chunk_size(4096)).await;
    assert_eq!(entry.compression_method(), CompressionMethod::Deflate);
    assert!(entry.compressed_size() < entry.size());
    assert!(!entry.is_materialized());

    let mut buf = [0u8; 1000];
    assert_eq!(entry.read(&mut buf, 49_500).await.unwrap(), 1000);
    assert_eq!(&buf[..], &data[49_500..50_500]);
    assert!(entry.is_materialized());

    let whole = entry.read_to_end().await.unwrap();
    assert_eq!(whole.len(), data.len());
    assert_eq!(crc(&whole), entry.crc32());

    assert_eq!(entry.read(&mut buf, 249_900).await.unwrap(), 100);
    assert!(entry.read(&mut buf, 250_000).await.unwrap_err().is_end_of_data());
}

#[tokio::test]
async fn materializes_once_for_concurrent_readers() {
    let dir = tempfile::tempdir().unwrap();
    let data = random_bytes(30_000, 3);
    let zip = build_zip(&[Member::new("one.bin", data.clone(), Method::Deflate)]);
    let path = dir.path().join("count.zip");
    std::fs::write(&path, &zip.bytes).unwrap();

    let reader = Arc::new(CountingReader::new(&path));
    let mut archive = Directory::from_reader("count.zip", reader.clone(), OpenOptions::default())
        .await
        .unwrap();
    let entry = archive.read().await.unwrap().unwrap();

    let mut first = vec![0u8; data.len()];
    let mut second = vec![0u8; data.len()];
    let (a, b) = tokio::join!(entry.read(&mut first, 0), entry.read(&mut second, 0));
    assert_eq!(a.unwrap(), data.len());
    assert_eq!(b.unwrap(), data.len());
    assert!(first == data && second == data, "content differs");

    // once by the directory walk, once by the shared resolution
    assert_eq!(reader.reads_at(zip.record_offsets[0], 46), 2);
    assert_eq!(reader.reads_at(zip.lfh_offsets[0], 30), 1);
    let data_start = zip.lfh_offsets[0] + 30 + "one.bin".len() as u64;
    assert_eq!(reader.reads_starting_at(data_start), 1);

    // later reads are served from scratch storage
    let mut again = vec![0u8; data.len()];
    entry.read(&mut again, 0).await.unwrap();
    assert_eq!(reader.reads_starting_at(data_start), 1);
    assert!(again == data);
}

#[tokio::test]
async fn free_read_fills_destination_offset() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(dir.path(), &[Member::new("abc.txt", b"abcdef".to_vec(), Method::Stored)]);
    let entry = first_entry(&path, OpenOptions::default()).await;

    let mut buf = *b"..........";
    let n = zipdir::read(&entry, &mut buf, 2, 3, 1).await.unwrap();
    assert_eq!(n, 3);
    assert_eq!(&buf, b"..bcd.....");

    let err = zipdir::read(&entry, &mut buf, 8, 3, 0).await.unwrap_err();
    assert!(matches!(err, ZipDirError::Io(ref e) if e.kind() == std::io::ErrorKind::InvalidInput));
}

#[tokio::test]
async fn unsupported_method_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(dir.path(), &[Member::new("b.bz2", b"BZh9".to_vec(), Method::Other(12))]);
    let entry = first_entry(&path, OpenOptions::default()).await;

    let mut buf = [0u8; 4];
    let err = entry.read(&mut buf, 0).await.unwrap_err();
    assert!(matches!(err, ZipDirError::UnsupportedCompression(12)), "{err}");
}

#[tokio::test]
async fn corrupt_local_header_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut zip = build_zip(&[Member::new("x", b"payload".to_vec(), Method::Stored)]);
    zip.bytes[0] = b'Q';
    let path = dir.path().join("corrupt.zip");
    std::fs::write(&path, &zip.bytes).unwrap();

    let entry = first_entry(&path, OpenOptions::default()).await;
    let mut buf = [0u8; 4];
    let err = entry.read(&mut buf, 0).await.unwrap_err();
    assert!(matches!(err, ZipDirError::Format(_)));
    assert!(err.to_string().contains("invalid local file header signature"), "{err}");
}

#[tokio::test]
async fn crc_mismatch_fails_materialization_unless_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut member = Member::new("bad.txt", b"hello hello hello".to_vec(), Method::Deflate);
    member.crc_override = Some(0xdeadbeef);
    let path = write_archive(dir.path(), &[member]);

    let entry = first_entry(&path, OpenOptions::default()).await;
    let mut buf = [0u8; 5];
    let err = entry.read(&mut buf, 0).await.unwrap_err();
    assert!(err.to_string().contains("crc32 mismatch"), "{err}");
    assert!(!entry.is_materialized());

    let entry = first_entry(&path, OpenOptions::default().verify_crc(false)).await;
    assert_eq!(entry.read(&mut buf, 0).await.unwrap(), 5);
    assert_eq!(&buf, b"hello");
}

#[tokio::test]
async fn scratch_dir_must_exist_for_deflated_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &[
            Member::new("plain", b"plain".to_vec(), Method::Stored),
            Member::new("packed", b"packed".repeat(100), Method::Deflate),
        ],
    );
    let options = OpenOptions::default().scratch_dir(dir.path().join("missing"));
    let mut archive = zipdir::open(&path, options).await.unwrap();

    let plain = archive.read().await.unwrap().unwrap();
    assert_eq!(plain.read_to_end().await.unwrap(), b"plain");

    let packed = archive.read().await.unwrap().unwrap();
    let err = packed.read_to_end().await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error {err}");
}

#[tokio::test]
async fn empty_entry_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(dir.path(), &[Member::new("empty", Vec::new(), Method::Stored)]);
    let entry = first_entry(&path, OpenOptions::default()).await;

    assert_eq!(entry.read_to_end().await.unwrap(), Vec::<u8>::new());
    let mut buf = [0u8; 1];
    assert!(entry.read(&mut buf, 0).await.unwrap_err().is_end_of_data());
}
