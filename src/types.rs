//! Core types for the product pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a product (`{retailer}:{external_id}`)
pub type ProductId = String;

/// Stable 16-character hex fingerprint of a URL.
///
/// Used as the `external_id` fallback when a retailer-native id cannot be
/// parsed out of the product URL, so repeated scrapes of the same page
/// always land on the same record.
pub fn url_fingerprint(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

// ============================================================================
// Availability
// ============================================================================

/// Stock availability of a product listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    PreOrder,
    LimitedStock,
    #[default]
    Unknown,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::InStock => "in_stock",
            Availability::OutOfStock => "out_of_stock",
            Availability::PreOrder => "pre_order",
            Availability::LimitedStock => "limited_stock",
            Availability::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Structured sub-records
// ============================================================================

/// Physical dimensions pulled out of a specification table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    /// Unit of measure; retailer pages rarely state one explicitly
    #[serde(default = "Dimensions::default_unit")]
    pub unit: String,
}

impl Dimensions {
    fn default_unit() -> String {
        "inches".to_string()
    }

    /// True when no axis carries a value
    pub fn is_empty(&self) -> bool {
        self.length.is_none() && self.width.is_none() && self.height.is_none() && self.weight.is_none()
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            length: None,
            width: None,
            height: None,
            weight: None,
            unit: Self::default_unit(),
        }
    }
}

/// A purchasable variant of a listing (size, color, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub variation_type: String,
    pub variation_value: String,
    pub price: Option<f64>,
    pub availability: Option<Availability>,
}

// ============================================================================
// Product record
// ============================================================================

/// Canonical product record produced by the normalization stage.
///
/// Every downstream component (quality scoring, deduplication, curation,
/// price monitoring) operates on this shape. Fields that a retailer page
/// did not yield stay `None`/empty rather than holding sentinel strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    // Identity
    pub source_url: String,
    pub retailer: String,
    pub external_id: String,

    // Descriptive
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub bullet_points: Vec<String>,
    pub features: Vec<String>,

    // Commerce
    pub current_price: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub availability: Availability,
    pub stock_quantity: Option<u32>,

    // Media
    pub primary_image_url: Option<String>,
    pub additional_images: Vec<String>,

    // Structured data
    pub specifications: BTreeMap<String, String>,
    pub dimensions: Option<Dimensions>,
    pub variations: Vec<Variation>,

    // Social proof
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    pub best_seller_rank: Option<u32>,

    // Provenance
    pub data_quality_score: f64,
    pub is_curated: bool,
    pub curation_score: Option<f64>,
    pub curation_reason: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub duplicate_count: u32,
}

impl ProductRecord {
    pub fn new(
        source_url: impl Into<String>,
        retailer: impl Into<String>,
        external_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            retailer: retailer.into(),
            external_id: external_id.into(),
            title: title.into(),
            brand: None,
            category: None,
            description: None,
            bullet_points: Vec::new(),
            features: Vec::new(),
            current_price: None,
            original_price: None,
            discount_percentage: None,
            availability: Availability::Unknown,
            stock_quantity: None,
            primary_image_url: None,
            additional_images: Vec::new(),
            specifications: BTreeMap::new(),
            dimensions: None,
            variations: Vec::new(),
            rating: None,
            review_count: None,
            best_seller_rank: None,
            data_quality_score: 0.0,
            is_curated: false,
            curation_score: None,
            curation_reason: None,
            last_updated: Utc::now(),
            duplicate_count: 0,
        }
    }

    /// Store key: `{retailer}:{external_id}`
    pub fn id(&self) -> ProductId {
        format!("{}:{}", self.retailer, self.external_id)
    }
}

// ============================================================================
// Pipeline outcomes
// ============================================================================

/// A group of records judged to describe the same underlying product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Members in discovery order; always 2 or more
    pub members: Vec<ProductRecord>,
    /// Id of the member chosen as the merge base (highest quality score,
    /// earliest occurrence on ties)
    pub canonical_id: ProductId,
}

impl DuplicateGroup {
    /// Ids of the members that get merged away
    pub fn absorbed_ids(&self) -> Vec<ProductId> {
        self.members
            .iter()
            .map(|m| m.id())
            .filter(|id| *id != self.canonical_id)
            .collect()
    }
}

/// Emitted when a monitored product's price materially moves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeEvent {
    pub product_id: ProductId,
    pub old_price: f64,
    pub new_price: f64,
    /// Signed percentage relative to the old price; negative means a drop
    pub change_percentage: f64,
    pub detected_at: DateTime<Utc>,
}

/// Which stage a batch item failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    Extraction,
}

/// A single failed URL within a batch, with the stage that rejected it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub url: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of one extraction batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub job_id: Uuid,
    pub products: Vec<ProductRecord>,
    pub failures: Vec<BatchFailure>,
}

impl BatchResult {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            products: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn success_count(&self) -> usize {
        self.products.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_fingerprint_stable() {
        let a = url_fingerprint("https://www.amazon.com/dp/B08N5WRWNW");
        let b = url_fingerprint("https://www.amazon.com/dp/B08N5WRWNW");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_url_fingerprint_distinct_urls() {
        let a = url_fingerprint("https://example.com/item/1");
        let b = url_fingerprint("https://example.com/item/2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_availability_default_unknown() {
        assert_eq!(Availability::default(), Availability::Unknown);
    }

    #[test]
    fn test_availability_serde_snake_case() {
        let json = serde_json::to_string(&Availability::LimitedStock).unwrap();
        assert_eq!(json, "\"limited_stock\"");
        let back: Availability = serde_json::from_str("\"out_of_stock\"").unwrap();
        assert_eq!(back, Availability::OutOfStock);
    }

    #[test]
    fn test_product_record_id() {
        let record = ProductRecord::new("https://example.com/p", "amazon", "B000TEST01", "Widget");
        assert_eq!(record.id(), "amazon:B000TEST01");
    }

    #[test]
    fn test_product_record_new_defaults() {
        let record = ProductRecord::new("https://example.com/p", "amazon", "x", "Widget");
        assert!(record.brand.is_none());
        assert!(record.current_price.is_none());
        assert_eq!(record.availability, Availability::Unknown);
        assert!(record.specifications.is_empty());
        assert_eq!(record.data_quality_score, 0.0);
        assert!(!record.is_curated);
        assert_eq!(record.duplicate_count, 0);
    }

    #[test]
    fn test_dimensions_default_unit() {
        let dims = Dimensions::default();
        assert_eq!(dims.unit, "inches");
        assert!(dims.is_empty());
    }

    #[test]
    fn test_duplicate_group_absorbed_ids() {
        let a = ProductRecord::new("u1", "amazon", "a", "First");
        let b = ProductRecord::new("u2", "amazon", "b", "Second");
        let group = DuplicateGroup {
            canonical_id: a.id(),
            members: vec![a, b],
        };
        assert_eq!(group.absorbed_ids(), vec!["amazon:b".to_string()]);
    }

    #[test]
    fn test_batch_result_counts() {
        let mut result = BatchResult::new(Uuid::new_v4());
        result
            .products
            .push(ProductRecord::new("u", "amazon", "a", "Widget"));
        result.failures.push(BatchFailure {
            url: "https://example.com/bad".to_string(),
            kind: FailureKind::Fetch,
            reason: "status 404".to_string(),
        });
        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failure_count(), 1);
    }
}
