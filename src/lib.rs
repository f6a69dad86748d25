//! Prodex: product catalog extraction, deduplication, and curation
//!
//! Collects product listings from multiple retailers and reconciles them
//! into a clean catalog:
//! - Per-retailer field extraction with selector fallback chains
//! - Total, pure field normalization into canonical typed records
//! - Weighted completeness scoring
//! - Similarity-based near-duplicate merging
//! - Rule-driven curation of the published subset
//! - Background price monitoring over stale catalog records
//!
//! The environment is reached through two seams only: `PageFetcher`
//! (async page retrieval) and `CatalogStore` (opaque key-addressed
//! persistence). `Pipeline` wires the stages together for callers.

pub mod config;
pub mod monitor;
pub mod pipeline;
pub mod scraping;
pub mod store;
pub mod types;
pub mod util;

pub use config::Config;
pub use types::*;

use anyhow::Result;
use std::sync::Arc;

use crate::monitor::PriceMonitor;
use crate::pipeline::{CurationEngine, CurationRule, DedupOutcome, Deduplicator, QualityScorer};
use crate::scraping::batch::{BatchError, BatchRunner};
use crate::scraping::extract::ExtractLimits;
use crate::scraping::fetcher::PageFetcher;
use crate::store::CatalogStore;

/// The assembled product pipeline.
///
/// Construction validates the configuration (weight sums, threshold
/// ranges) and fails fast; a constructed pipeline never raises
/// configuration errors at batch time.
pub struct Pipeline {
    config: Config,
    batch: BatchRunner,
    dedup: Deduplicator,
    scorer: QualityScorer,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn CatalogStore>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn CatalogStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            batch: BatchRunner::new(fetcher.clone(), &config.scraping),
            dedup: Deduplicator::new(config.dedup.clone()),
            scorer: QualityScorer::new(config.quality.clone()),
            fetcher,
            store,
            config,
        })
    }

    /// Fetch, extract, normalize, and score a batch of product URLs,
    /// persisting every successful record to the catalog
    pub async fn run_extraction_batch(
        &self,
        urls: &[String],
        retailer: &str,
    ) -> Result<BatchResult, BatchError> {
        let mut result = self.batch.run(urls, retailer).await?;
        self.scorer.annotate(&mut result.products);
        for record in &result.products {
            self.store.upsert(record.clone()).await?;
        }
        Ok(result)
    }

    /// Walk a retailer's search results for a category or search URL,
    /// extracting and persisting every product found. `max_pages` is
    /// clamped to the configured page ceiling.
    pub async fn run_search_scrape(
        &self,
        retailer: &str,
        category_or_url: &str,
        max_pages: u32,
    ) -> Result<BatchResult, BatchError> {
        let max_pages = max_pages.min(self.config.scraping.max_search_pages);
        let mut result = self
            .batch
            .run_search(retailer, category_or_url, max_pages)
            .await?;
        self.scorer.annotate(&mut result.products);
        for record in &result.products {
            self.store.upsert(record.clone()).await?;
        }
        Ok(result)
    }

    /// Group near-duplicate records and collapse each group into one
    /// canonical record
    pub fn run_deduplication(&self, records: Vec<ProductRecord>) -> DedupOutcome {
        self.dedup.dedup(records)
    }

    /// Annotate records with curation outcomes and return the curated
    /// subset
    pub fn run_curation(
        &self,
        records: &mut [ProductRecord],
        rules: Vec<CurationRule>,
    ) -> Vec<ProductRecord> {
        CurationEngine::new(rules).apply(records)
    }

    /// Completeness score for one record, in [0, 1]
    pub fn score_quality(&self, record: &ProductRecord) -> f64 {
        self.scorer.score(record)
    }

    /// Compare two observations of a product for a material price move
    pub fn detect_price_change(
        &self,
        old: &ProductRecord,
        new: &ProductRecord,
    ) -> Option<PriceChangeEvent> {
        monitor::detect_price_change(old, new, self.config.monitor.min_change_percent)
    }

    /// Build the background price monitor over this pipeline's fetcher
    /// and store
    pub fn price_monitor(&self) -> PriceMonitor {
        PriceMonitor::new(
            self.fetcher.clone(),
            self.store.clone(),
            QualityScorer::new(self.config.quality.clone()),
            ExtractLimits::from(&self.config.scraping),
            self.config.monitor.clone(),
        )
    }

    pub fn store(&self) -> Arc<dyn CatalogStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
