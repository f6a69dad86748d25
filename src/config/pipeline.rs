//! Deduplication, quality scoring, and price monitor configuration

use serde::{Deserialize, Serialize};

/// Near-duplicate detection configuration.
///
/// Component weights must sum to 1.0; `Config::validate` enforces this
/// together with the threshold range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Minimum weighted similarity for two records to be grouped
    pub similarity_threshold: f64,
    /// Weight of title similarity
    pub title_weight: f64,
    /// Weight of brand similarity
    pub brand_weight: f64,
    /// Weight of price proximity
    pub price_weight: f64,
    /// Weight of specification overlap
    pub spec_weight: f64,
}

impl DedupConfig {
    pub fn weight_sum(&self) -> f64 {
        self.title_weight + self.brand_weight + self.price_weight + self.spec_weight
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            title_weight: 0.4,
            brand_weight: 0.3,
            price_weight: 0.2,
            spec_weight: 0.1,
        }
    }
}

/// Per-field weights for the completeness score.
///
/// Weights must sum to 1.0 so the resulting score stays in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub title: f64,
    pub brand: f64,
    /// Granted when either a description or bullet points are present
    pub description: f64,
    pub category: f64,
    pub price: f64,
    /// Granted when availability resolved to something other than unknown
    pub availability: f64,
    pub primary_image: f64,
    pub additional_images: f64,
    pub specifications: f64,
    pub features: f64,
    pub rating: f64,
    pub review_count: f64,
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.title
            + self.brand
            + self.description
            + self.category
            + self.price
            + self.availability
            + self.primary_image
            + self.additional_images
            + self.specifications
            + self.features
            + self.rating
            + self.review_count
    }
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            title: 0.15,
            brand: 0.10,
            description: 0.10,
            category: 0.05,
            price: 0.15,
            availability: 0.10,
            primary_image: 0.10,
            additional_images: 0.05,
            specifications: 0.08,
            features: 0.07,
            rating: 0.03,
            review_count: 0.02,
        }
    }
}

/// Price monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Records older than this are due for a rescrape (seconds)
    pub staleness_secs: u64,
    /// Maximum records rescraped per cycle
    pub max_per_cycle: usize,
    /// Delay between monitor cycles (seconds)
    pub cycle_interval_secs: u64,
    /// Shorter delay after a failed cycle (seconds)
    pub error_backoff_secs: u64,
    /// Minimum absolute price move (percent) worth an event
    pub min_change_percent: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            staleness_secs: 3600,
            max_per_cycle: 10,
            cycle_interval_secs: 300,
            error_backoff_secs: 60,
            min_change_percent: 1.0,
        }
    }
}
