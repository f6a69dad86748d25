//! Scraping and fetch configuration

use serde::{Deserialize, Serialize};

use super::DEFAULT_USER_AGENT;

/// Web scraping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Maximum concurrent fetches
    pub max_concurrent_fetches: usize,
    /// Minimum delay before each request (milliseconds)
    pub request_delay_ms: u64,
    /// Default request timeout (seconds)
    pub request_timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
    /// Maximum response body size (bytes)
    pub max_content_size: usize,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Maximum result pages to walk per search query
    pub max_search_pages: u32,
    /// Cap on gallery images kept per product
    pub max_images: usize,
    /// Cap on bullet points kept per product
    pub max_bullet_points: usize,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 5,
            request_delay_ms: 1000,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_content_size: 10 * 1024 * 1024, // 10 MB
            max_redirects: 5,
            max_search_pages: 5,
            max_images: 10,
            max_bullet_points: 10,
        }
    }
}
