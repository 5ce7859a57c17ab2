use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};
use zipdir::{OpenOptions, ZipDirError};

use crate::fixtures::{Member, Method, build_zip, crc, random_bytes, split_classic};

/// Answers `Range: bytes=start-end` requests from an in-memory archive.
struct RangeResponder {
    bytes: Vec<u8>,
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(range) = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
        else {
            return ResponseTemplate::new(200).set_body_bytes(self.bytes.clone());
        };
        let Some((start, end)) = range.split_once('-') else {
            return ResponseTemplate::new(416);
        };
        let start: usize = start.parse().unwrap();
        let end: usize = end.parse::<usize>().unwrap().min(self.bytes.len() - 1);
        ResponseTemplate::new(206).set_body_bytes(self.bytes[start..=end].to_vec())
    }
}

async fn serve(name: &str, bytes: Vec<u8>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{name}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("accept-ranges", "bytes")
                .set_body_bytes(bytes.clone()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{name}")))
        .respond_with(RangeResponder { bytes })
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn lists_and_reads_remote_archive() {
    let data = random_bytes(50_000, 3);
    let zip = build_zip(&[
        Member::new("docs/readme.txt", b"remote hello".to_vec(), Method::Stored),
        Member::new("data.bin", data.clone(), Method::Deflate),
    ]);
    let server = serve("archive.zip", zip.bytes.clone()).await;
    let url = format!("{}/archive.zip", server.uri());

    let mut archive = zipdir::open(&url, OpenOptions::default()).await.unwrap();
    assert_eq!(archive.path(), url);
    assert!(!archive.is_split());

    let readme = archive.read().await.unwrap().unwrap();
    assert_eq!(readme.name(), "docs/readme.txt");
    let mut buf = [0u8; 6];
    assert_eq!(readme.read(&mut buf, 0).await.unwrap(), 6);
    assert_eq!(&buf, b"remote");

    let blob = archive.read().await.unwrap().unwrap();
    let content = blob.read_to_end().await.unwrap();
    assert_eq!(crc(&content), blob.crc32());
    assert!(content == data);
    assert!(archive.read().await.unwrap().is_none());
}

#[tokio::test]
async fn counts_transferred_bytes() {
    let zip = build_zip(&[Member::new("a.txt", b"abc".to_vec(), Method::Stored)]);
    let total = zip.bytes.len() as u64;
    let server = serve("small.zip", zip.bytes).await;
    let url = format!("{}/small.zip", server.uri());

    let (mut dir, reader) = zipdir::open_remote(&url, OpenOptions::default())
        .await
        .unwrap();
    assert_eq!(reader.url(), url);
    assert_eq!(dir.path(), url);
    let entry = dir.read().await.unwrap().unwrap();
    assert_eq!(entry.read_to_end().await.unwrap(), b"abc");

    let transferred = reader.transferred_bytes();
    assert!(transferred > 0 && transferred <= 2 * total, "{transferred} of {total}");
}

#[tokio::test]
async fn missing_remote_archive_is_not_found() {
    let server = MockServer::start().await;
    let url = format!("{}/missing.zip", server.uri());

    let err = zipdir::open(&url, OpenOptions::default()).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error {err}");
}

#[tokio::test]
async fn remote_url_must_name_a_zip() {
    let err = zipdir::open("http://127.0.0.1:9/archive.tar", OpenOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ZipDirError::UnsupportedFormat(_)), "{err}");

    // the CLI opens URLs through open_remote, which applies the same rule
    for url in ["http://127.0.0.1:9/archive.tar", "ftp://127.0.0.1:9/archive.zip"] {
        let err = zipdir::open_remote(url, OpenOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ZipDirError::UnsupportedFormat(_)), "{url}: {err}");
    }
}

#[tokio::test]
async fn remote_split_archive_reports_disk_count() {
    let zip = build_zip(&[Member::new(
        "big.bin",
        random_bytes(40_000, 5),
        Method::Stored,
    )]);
    let segments = split_classic(&zip, 16_384);
    let last = segments.last().unwrap().clone();
    let server = serve("split.zip", last).await;

    let err = zipdir::open(format!("{}/split.zip", server.uri()), OpenOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ZipDirError::MultiDisk { .. }), "{err}");
    assert_eq!(err.disks(), Some(segments.len()));
}
