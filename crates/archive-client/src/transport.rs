//! Archive transport: the trait the retry wrapper drives, and its
//! HTTP implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::descriptor::ResourceDescriptor;
use crate::error::FetchError;

/// Raw archive access: one transfer, no retries.
///
/// Implementations classify failures as transient or structural via
/// `FetchError`; the retry wrapper owns backoff and candidate fallback.
#[async_trait]
pub trait ArchiveAccess: Send + Sync {
    /// Fetch the resource and write it to `target` in full.
    async fn fetch(&self, descriptor: &ResourceDescriptor, target: &Path)
        -> Result<(), FetchError>;

    /// Resolve the remote path for the resource without downloading it.
    async fn locate(&self, descriptor: &ResourceDescriptor) -> Result<String, FetchError>;
}

/// HTTP archive access over reqwest, streamed to disk.
pub struct HttpArchive {
    client: Client,
}

impl HttpArchive {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::Transient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn classify_status(status: StatusCode, url: &str) -> FetchError {
        if status.is_client_error() {
            FetchError::InvalidDescriptor(format!("{} returned {}", url, status))
        } else {
            FetchError::Transient(format!("{} returned {}", url, status))
        }
    }
}

#[async_trait]
impl ArchiveAccess for HttpArchive {
    async fn fetch(
        &self,
        descriptor: &ResourceDescriptor,
        target: &Path,
    ) -> Result<(), FetchError> {
        let url = descriptor.url();
        debug!(url = %url, target = %target.display(), "Fetching archive resource");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Self::classify_status(response.status(), &url));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(target)
            .await
            .map_err(|e| FetchError::Transient(format!("Failed to open {}: {}", target.display(), e)))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| FetchError::Transient(format!("Stream from {} failed: {}", url, e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::Transient(format!("Write failed: {}", e)))?;
        }

        file.flush()
            .await
            .map_err(|e| FetchError::Transient(format!("Flush failed: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| FetchError::Transient(format!("Sync failed: {}", e)))?;

        Ok(())
    }

    async fn locate(&self, descriptor: &ResourceDescriptor) -> Result<String, FetchError> {
        let url = descriptor.url();

        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("HEAD {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Self::classify_status(response.status(), &url));
        }

        Ok(url)
    }
}

// Partial downloads left behind by a failed transfer are removed by the
// caller; fetch never renames into place itself.
pub(crate) async fn discard_partial(path: &Path) {
    let _ = fs::remove_file(path).await;
}
