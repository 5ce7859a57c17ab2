use async_trait::async_trait;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap, RANGE};
use reqwest::{Client, StatusCode};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ReadAt;
use crate::error::{Result, ZipDirError};
use crate::options::OpenOptions;

/// Remote single-file archive read with HTTP Range requests.
///
/// Only archives held in one file can be served this way. A remote split
/// set surfaces as [`ZipDirError::MultiDisk`] when it is parsed.
#[derive(Debug)]
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

fn remote_error(msg: impl Into<String>) -> ZipDirError {
    ZipDirError::Io(std::io::Error::other(msg.into()))
}

/// Size announced by a HEAD response that allows byte ranges.
fn ranged_length(headers: &HeaderMap) -> Result<u64> {
    let ranges = headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none");
    if !ranges.contains("bytes") {
        return Err(remote_error("server does not accept byte ranges"));
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| remote_error("server did not announce a content length"))
}

impl HttpRangeReader {
    /// Probe `url` with a HEAD request for its size and Range support.
    pub async fn new(url: String, options: &OpenOptions) -> Result<Self> {
        let client = Client::builder().timeout(options.http_timeout).build()?;

        let resp = client.head(&url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => {
                return Err(ZipDirError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("'{url}' not found"),
                )));
            }
            status if !status.is_success() => {
                return Err(remote_error(format!("HEAD '{url}' answered {status}")));
            }
            _ => {}
        }
        let size = ranged_length(resp.headers())?;
        tracing::debug!(%url, size, "opened remote archive");

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: AtomicU64::new(0),
            max_retry: options.http_max_retry,
        })
    }

    /// Body bytes received so far
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET one byte range, retrying timeouts and refused connections.
    async fn fetch(&self, range: RangeInclusive<u64>) -> Result<bytes::Bytes> {
        let header = format!("bytes={}-{}", range.start(), range.end());
        let mut attempt = 0;
        loop {
            match self.client.get(&self.url).header(RANGE, &header).send().await {
                Ok(resp) if resp.status() == StatusCode::PARTIAL_CONTENT => {
                    let body = resp.bytes().await?;
                    if body.is_empty() {
                        return Err(remote_error(format!("empty body for {header}")));
                    }
                    return Ok(body);
                }
                Ok(resp) => {
                    return Err(remote_error(format!(
                        "GET {header} answered {}",
                        resp.status()
                    )));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    attempt += 1;
                    if attempt >= self.max_retry {
                        return Err(remote_error(format!("giving up after {attempt} attempts: {e}")));
                    }
                    tracing::warn!(attempt, max_retry = self.max_retry, error = %e, "range request failed, retrying");
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }
        let last = (offset + buf.len() as u64 - 1).min(self.size - 1);
        let wanted = (last - offset + 1) as usize;

        // Servers may answer with less than asked; keep going from where they stopped
        let mut filled = 0;
        while filled < wanted {
            let body = self.fetch(offset + filled as u64..=last).await?;
            let n = body.len().min(wanted - filled);
            buf[filled..filled + n].copy_from_slice(&body[..n]);
            filled += n;
            self.transferred_bytes.fetch_add(n as u64, Ordering::Relaxed);
        }
        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
