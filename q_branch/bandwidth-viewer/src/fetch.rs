//! Text resource fetching.
//!
//! [`TextSource`] is the seam between the pipeline and the outside world.
//! [`Fetcher`] is the production implementation: HTTP(S) via `reqwest`,
//! everything else from the local filesystem.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;

use crate::error::{PipelineError, Result};
use crate::location::Location;

/// Default timeout for remote fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can produce the text behind a [`Location`].
pub trait TextSource: Send + Sync {
    /// Fetch the full resource as UTF-8 text. Any failure is reported as
    /// [`PipelineError::ResourceUnavailable`].
    fn fetch_text(&self, location: &Location) -> impl Future<Output = Result<String>> + Send;
}

/// Fetches URLs over HTTP and paths from disk.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    async fn fetch_url(&self, location: &Location, url: &reqwest::Url) -> Result<String> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PipelineError::unavailable(location, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::unavailable(location, format!("HTTP {status}")));
        }

        resp.text()
            .await
            .map_err(|e| PipelineError::unavailable(location, e))
    }
}

impl TextSource for Fetcher {
    async fn fetch_text(&self, location: &Location) -> Result<String> {
        tracing::debug!(%location, "Fetching resource");
        let text = match location {
            Location::Url(url) => self.fetch_url(location, url).await?,
            Location::Path(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| PipelineError::unavailable(location, e))?,
        };
        tracing::debug!(%location, bytes = text.len(), "Fetched resource");
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory source keyed by the location's display form.
    #[derive(Default)]
    pub(crate) struct MemorySource {
        pub(crate) files: HashMap<String, String>,
    }

    impl MemorySource {
        pub(crate) fn with(mut self, location: &str, text: &str) -> Self {
            self.files.insert(location.to_string(), text.to_string());
            self
        }
    }

    impl TextSource for MemorySource {
        async fn fetch_text(&self, location: &Location) -> Result<String> {
            self.files
                .get(&location.to_string())
                .cloned()
                .ok_or_else(|| PipelineError::unavailable(location, "not found"))
        }
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("day.csv");
        std::fs::write(&path, "2024-01-01 000000,10,\n").unwrap();

        let fetcher = Fetcher::new().unwrap();
        let text = fetcher.fetch_text(&Location::Path(path)).await.unwrap();
        assert_eq!(text, "2024-01-01 000000,10,\n");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new().unwrap();
        let err = fetcher
            .fetch_text(&Location::Path(dir.path().join("missing.csv")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ResourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_url_is_unavailable() {
        let fetcher = Fetcher::new().unwrap();
        // Port 9 (discard) on localhost is essentially never listening.
        let location = Location::parse("http://127.0.0.1:9/logs/manifest.json").unwrap();
        let err = fetcher.fetch_text(&location).await.unwrap_err();
        assert!(matches!(err, PipelineError::ResourceUnavailable { .. }));
    }
}
