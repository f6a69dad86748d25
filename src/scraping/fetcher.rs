//! Page retrieval
//!
//! The pipeline only ever sees the `PageFetcher` trait, so transport
//! concerns (headers, retries, proxying) stay outside the core. A
//! reqwest-backed `FetchEngine` ships as the default implementation;
//! tests substitute canned-markup fakes.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::ScrapingConfig;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("Content too large: {0} bytes")]
    ContentTooLarge(usize),
    #[error("Failed to parse URL: {0}")]
    InvalidUrl(String),
}

/// Async page retrieval seam between the pipeline and the network
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the raw markup at `url`
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP fetch engine backed by reqwest
pub struct FetchEngine {
    client: reqwest::Client,
    max_content_size: usize,
}

impl FetchEngine {
    /// Create a new fetch engine
    pub fn new(config: &ScrapingConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            max_content_size: config.max_content_size,
        })
    }
}

#[async_trait]
impl PageFetcher for FetchEngine {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_content_size {
                return Err(FetchError::ContentTooLarge(len as usize));
            }
        }

        let body = response.text().await?;
        if body.len() > self.max_content_size {
            return Err(FetchError::ContentTooLarge(body.len()));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_builds_from_default_config() {
        assert!(FetchEngine::new(&ScrapingConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_any_request() {
        let engine = FetchEngine::new(&ScrapingConfig::default()).unwrap();
        let err = engine.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
