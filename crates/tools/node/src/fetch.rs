//! HTTP access to the distribution mirror.

use async_trait::async_trait;
use noderig_core::{Error, Result};
use reqwest::Client;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Source of remote distribution files.
///
/// The provisioner only talks to the mirror through this trait so tests can
/// serve archives from memory and count downloads.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a small text resource such as the checksum manifest.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Stream a resource into `dest`, returning the number of bytes written.
    ///
    /// `dest` is created or truncated. On error it may hold a partial body.
    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with a noderig user agent.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("noderig/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::download_with_source(url, "request failed", e))?;

        if !response.status().is_success() {
            return Err(Error::download(
                url,
                format!("HTTP {}", response.status()),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!(%url, "Fetching text resource");
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| Error::download_with_source(url, "failed to read body", e))
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!(%url, dest = %dest.display(), "Streaming download");
        let mut response = self.get(url).await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::io(e, Some(dest.to_path_buf()), "create"))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::download_with_source(url, "transfer interrupted", e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io(e, Some(dest.to_path_buf()), "write_all"))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| Error::io(e, Some(dest.to_path_buf()), "flush"))?;

        debug!(%url, bytes = written, "Download complete");
        Ok(written)
    }
}
