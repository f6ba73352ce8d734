//! HTTP downloads from the crawl data host, with retry on overload.
//!
//! The data host sheds load with 503s; downloads back off with a doubling
//! delay and give up after a configured attempt count. Files are streamed to
//! a `.tmp` sibling and renamed, so an interrupted download never leaves a
//! partial file under its final name.

use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Base URL of the Common Crawl data host.
pub const DATA_BASE_URL: &str = "https://data.commoncrawl.org";

/// First retry delay; doubles per attempt.
const INITIAL_BACKOFF: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error fetching {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },
    #[error("unexpected status {status} fetching {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("giving up on {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared downloader over one connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_attempts: u32,
}

impl Fetcher {
    /// `max_attempts` counts the first try plus retries.
    pub fn new(max_attempts: u32) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("linkdex/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|source| FetchError::Http {
                url: DATA_BASE_URL.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            max_attempts: max_attempts.max(1),
        })
    }

    /// Absolute URL for a path below the data host.
    pub fn data_url(path: &str) -> String {
        format!("{}/{}", DATA_BASE_URL, path.trim_start_matches('/'))
    }

    /// URL of an archive's WAT path listing.
    pub fn wat_paths_url(archive: &str) -> String {
        format!("{}/crawl-data/{}/wat.paths.gz", DATA_BASE_URL, archive)
    }

    /// Download `url` to `dest`, streaming the body to disk.
    ///
    /// Retries on 503 and transport errors with a doubling delay. A 200 with
    /// a broken body stream also counts as a retryable attempt. Any other
    /// status fails immediately.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let mut delay = INITIAL_BACKOFF;

        for attempt in 1..=self.max_attempts {
            match self.try_download(url, dest).await {
                Ok(()) => return Ok(()),
                // Non-503 statuses and filesystem errors abort immediately.
                Err(err) if !is_retryable(&err) => return Err(err),
                Err(err) => {
                    if attempt == self.max_attempts {
                        tracing::warn!("download failed, out of retries: {}", err);
                        break;
                    }
                    tracing::warn!(
                        "download attempt {}/{} failed ({}), retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
        })
    }

    async fn try_download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let tmp = crate::segment::tmp_sibling(dest);
        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|source| FetchError::Http {
                    url: url.to_string(),
                    source,
                })?;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<(), FetchError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tokio::fs::rename(&tmp, dest).await?;
                Ok(())
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(err)
            }
        }
    }
}

/// 503 and transport-level failures are worth another attempt.
fn is_retryable(err: &FetchError) -> bool {
    match err {
        FetchError::Status { status, .. } => {
            *status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        }
        FetchError::Http { .. } => true,
        _ => false,
    }
}
