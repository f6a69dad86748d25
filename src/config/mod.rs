//! Configuration for the product pipeline

mod logging;
mod pipeline;
mod scraping;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use pipeline::{DedupConfig, MonitorConfig, QualityWeights};
pub use scraping::ScrapingConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for all HTTP requests
pub const DEFAULT_USER_AGENT: &str = "ProductCatalogBot/1.0 (+https://github.com/prodex)";

/// Tolerance when checking that weight tables sum to 1.0
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Main configuration for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scraping configuration
    #[serde(default)]
    pub scraping: ScrapingConfig,
    /// Deduplication configuration
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Quality score weights
    #[serde(default)]
    pub quality: QualityWeights,
    /// Price monitor configuration
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scraping: ScrapingConfig::default(),
            dedup: DedupConfig::default(),
            quality: QualityWeights::default(),
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass rather than playing whack-a-mole.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Scraping validation
        if self.scraping.max_concurrent_fetches == 0 {
            errors.push("max_concurrent_fetches must be positive".to_string());
        }
        if self.scraping.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be positive".to_string());
        }
        if self.scraping.max_content_size == 0 {
            errors.push("max_content_size must be positive".to_string());
        }
        if self.scraping.max_search_pages == 0 {
            errors.push("max_search_pages must be positive".to_string());
        }

        // Dedup validation
        if !(0.0..=1.0).contains(&self.dedup.similarity_threshold) {
            errors.push("similarity_threshold must be between 0.0 and 1.0".to_string());
        }
        let dedup_weights = [
            ("title_weight", self.dedup.title_weight),
            ("brand_weight", self.dedup.brand_weight),
            ("price_weight", self.dedup.price_weight),
            ("spec_weight", self.dedup.spec_weight),
        ];
        for (name, weight) in dedup_weights {
            if !(0.0..=1.0).contains(&weight) {
                errors.push(format!("{} must be between 0.0 and 1.0", name));
            }
        }
        if (self.dedup.weight_sum() - 1.0).abs() > WEIGHT_SUM_EPSILON {
            errors.push(format!(
                "dedup weights must sum to 1.0, got {:.4}",
                self.dedup.weight_sum()
            ));
        }

        // Quality weight validation
        let quality_weights = [
            ("quality.title", self.quality.title),
            ("quality.brand", self.quality.brand),
            ("quality.description", self.quality.description),
            ("quality.category", self.quality.category),
            ("quality.price", self.quality.price),
            ("quality.availability", self.quality.availability),
            ("quality.primary_image", self.quality.primary_image),
            ("quality.additional_images", self.quality.additional_images),
            ("quality.specifications", self.quality.specifications),
            ("quality.features", self.quality.features),
            ("quality.rating", self.quality.rating),
            ("quality.review_count", self.quality.review_count),
        ];
        for (name, weight) in quality_weights {
            if !(0.0..=1.0).contains(&weight) {
                errors.push(format!("{} must be between 0.0 and 1.0", name));
            }
        }
        if (self.quality.sum() - 1.0).abs() > WEIGHT_SUM_EPSILON {
            errors.push(format!(
                "quality weights must sum to 1.0, got {:.4}",
                self.quality.sum()
            ));
        }

        // Monitor validation
        if self.monitor.staleness_secs == 0 {
            errors.push("staleness_secs must be positive".to_string());
        }
        if self.monitor.max_per_cycle == 0 {
            errors.push("max_per_cycle must be positive".to_string());
        }
        if self.monitor.cycle_interval_secs == 0 {
            errors.push("cycle_interval_secs must be positive".to_string());
        }
        if self.monitor.error_backoff_secs == 0 {
            errors.push("error_backoff_secs must be positive".to_string());
        }
        if self.monitor.min_change_percent < 0.0 {
            errors.push("min_change_percent must not be negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
