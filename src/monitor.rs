//! Price-change monitoring
//!
//! A long-lived background loop that rescrapes stale catalog records and
//! emits `PriceChangeEvent`s when a price has materially moved. Each cycle
//! queries the store for records past the staleness window, refreshes at
//! most `max_per_cycle` of them, and overwrites refreshed records
//! wholesale. Cycle failures back off and never stop the loop.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::pipeline::normalize::normalize_record;
use crate::pipeline::QualityScorer;
use crate::scraping::extract::{extractor_for, ExtractLimits};
use crate::scraping::fetcher::PageFetcher;
use crate::store::{CatalogStore, StoreError};
use crate::types::{PriceChangeEvent, ProductRecord};

/// Stale-record rescrape loop
pub struct PriceMonitor {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn CatalogStore>,
    scorer: QualityScorer,
    limits: ExtractLimits,
    config: MonitorConfig,
    events: broadcast::Sender<PriceChangeEvent>,
}

impl PriceMonitor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn CatalogStore>,
        scorer: QualityScorer,
        limits: ExtractLimits,
        config: MonitorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            fetcher,
            store,
            scorer,
            limits,
            config,
            events,
        }
    }

    /// Subscribe to price-change events
    pub fn subscribe(&self) -> broadcast::Receiver<PriceChangeEvent> {
        self.events.subscribe()
    }

    /// Run the monitor until the shutdown channel fires.
    ///
    /// A successful cycle sleeps the full interval; a failed cycle is
    /// logged and retried after the shorter backoff.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            staleness_secs = self.config.staleness_secs,
            cycle_interval_secs = self.config.cycle_interval_secs,
            "price monitor started"
        );

        loop {
            let delay = match self.run_cycle().await {
                Ok(checked) => {
                    debug!(checked, "monitor cycle complete");
                    Duration::from_secs(self.config.cycle_interval_secs)
                }
                Err(e) => {
                    warn!(error = %e, "monitor cycle failed");
                    Duration::from_secs(self.config.error_backoff_secs)
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    info!("price monitor stopping");
                    return;
                }
            }
        }
    }

    /// One staleness scan + bounded rescrape pass.
    ///
    /// Returns how many records were rescraped. Per-record fetch and
    /// extraction failures are logged and skipped, never cycle-fatal.
    pub async fn run_cycle(&self) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.staleness_secs as i64);
        let mut stale = self
            .store
            .query(&|record: &ProductRecord| record.last_updated < cutoff)
            .await?;

        // Oldest first, so nothing starves behind fresher stale records
        stale.sort_by_key(|r| r.last_updated);
        stale.truncate(self.config.max_per_cycle);

        if stale.is_empty() {
            return Ok(0);
        }
        debug!(count = stale.len(), "rescraping stale records");

        let mut checked = 0;
        for old in stale {
            match self.refresh(&old).await {
                Ok(Some(event)) => {
                    info!(
                        product = %event.product_id,
                        old_price = event.old_price,
                        new_price = event.new_price,
                        change = event.change_percentage,
                        "price change detected"
                    );
                    // Nobody listening is fine
                    let _ = self.events.send(event);
                    checked += 1;
                }
                Ok(None) => checked += 1,
                Err(reason) => {
                    warn!(url = %old.source_url, reason = %reason, "rescrape failed");
                }
            }
        }
        Ok(checked)
    }

    /// Re-extract one record, store the fresh copy wholesale, and report
    /// a material price move if there was one
    async fn refresh(&self, old: &ProductRecord) -> Result<Option<PriceChangeEvent>, String> {
        let extractor = extractor_for(&old.retailer, self.limits)
            .ok_or_else(|| format!("unsupported retailer: {}", old.retailer))?;

        let markup = self
            .fetcher
            .fetch(&old.source_url)
            .await
            .map_err(|e| e.to_string())?;
        let raw = extractor
            .extract(&markup, &old.source_url)
            .map_err(|e| e.to_string())?;

        let mut fresh = normalize_record(&raw, Utc::now());
        fresh.data_quality_score = self.scorer.score(&fresh);

        let event = detect_price_change(old, &fresh, self.config.min_change_percent);
        self.store
            .upsert(fresh)
            .await
            .map_err(|e| e.to_string())?;
        Ok(event)
    }
}

/// Compare prices between two observations of the same product.
///
/// Returns an event only when both prices are known and the move is at
/// least `min_change_percent` of the old price, in either direction.
pub fn detect_price_change(
    old: &ProductRecord,
    new: &ProductRecord,
    min_change_percent: f64,
) -> Option<PriceChangeEvent> {
    let old_price = old.current_price?;
    let new_price = new.current_price?;
    if old_price <= 0.0 {
        return None;
    }

    let change = ((new_price - old_price) / old_price) * 100.0;
    if change.abs() < min_change_percent {
        return None;
    }

    Some(PriceChangeEvent {
        product_id: old.id(),
        old_price,
        new_price,
        change_percentage: (change * 100.0).round() / 100.0,
        detected_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityWeights;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    use crate::scraping::fetcher::FetchError;

    fn record(external_id: &str, price: Option<f64>) -> ProductRecord {
        let mut r = ProductRecord::new(
            format!("https://www.amazon.com/dp/{external_id}"),
            "amazon",
            external_id,
            "Widget",
        );
        r.current_price = price;
        r
    }

    // ========================================================================
    // detect_price_change
    // ========================================================================

    #[test]
    fn test_material_drop_yields_event() {
        let old = record("B000000001", Some(100.0));
        let new = record("B000000001", Some(80.0));
        let event = detect_price_change(&old, &new, 1.0).unwrap();
        assert_eq!(event.product_id, "amazon:B000000001");
        assert_eq!(event.old_price, 100.0);
        assert_eq!(event.new_price, 80.0);
        assert_eq!(event.change_percentage, -20.0);
    }

    #[test]
    fn test_increase_is_positive_percentage() {
        let old = record("a", Some(50.0));
        let new = record("a", Some(60.0));
        let event = detect_price_change(&old, &new, 1.0).unwrap();
        assert_eq!(event.change_percentage, 20.0);
    }

    #[test]
    fn test_below_threshold_move_is_ignored() {
        let old = record("a", Some(100.0));
        let new = record("a", Some(100.5));
        assert!(detect_price_change(&old, &new, 1.0).is_none());
    }

    #[test]
    fn test_missing_prices_yield_nothing() {
        assert!(detect_price_change(&record("a", None), &record("a", Some(5.0)), 1.0).is_none());
        assert!(detect_price_change(&record("a", Some(5.0)), &record("a", None), 1.0).is_none());
        assert!(detect_price_change(&record("a", Some(0.0)), &record("a", Some(5.0)), 1.0).is_none());
    }

    #[test]
    fn test_change_percentage_rounds_to_two_decimals() {
        let old = record("a", Some(30.0));
        let new = record("a", Some(29.0));
        let event = detect_price_change(&old, &new, 1.0).unwrap();
        assert_eq!(event.change_percentage, -3.33);
    }

    // ========================================================================
    // run_cycle
    // ========================================================================

    struct StubFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or(FetchError::Status(404))
        }
    }

    fn monitor(pages: HashMap<String, String>, store: Arc<MemoryStore>) -> PriceMonitor {
        monitor_with_limits(pages, store, ExtractLimits::default())
    }

    fn monitor_with_limits(
        pages: HashMap<String, String>,
        store: Arc<MemoryStore>,
        limits: ExtractLimits,
    ) -> PriceMonitor {
        PriceMonitor::new(
            Arc::new(StubFetcher { pages }),
            store,
            QualityScorer::new(QualityWeights::default()),
            limits,
            MonitorConfig::default(),
        )
    }

    fn product_page(price: &str) -> String {
        format!(
            r#"<span id="productTitle">Widget</span>
               <div class="a-price"><span class="a-offscreen">{price}</span></div>"#
        )
    }

    #[tokio::test]
    async fn test_cycle_refreshes_stale_record_and_emits_event() {
        let store = Arc::new(MemoryStore::new());
        let mut old = record("B000000001", Some(100.0));
        old.last_updated = Utc::now() - chrono::Duration::hours(2);
        store.upsert(old).await.unwrap();

        let mut pages = HashMap::new();
        pages.insert(
            "https://www.amazon.com/dp/B000000001".to_string(),
            product_page("$80.00"),
        );

        let monitor = monitor(pages, store.clone());
        let mut events = monitor.subscribe();
        let checked = monitor.run_cycle().await.unwrap();
        assert_eq!(checked, 1);

        let event = events.try_recv().unwrap();
        assert_eq!(event.old_price, 100.0);
        assert_eq!(event.new_price, 80.0);

        // record was overwritten wholesale and is no longer stale
        let stored = store.get("amazon:B000000001").await.unwrap().unwrap();
        assert_eq!(stored.current_price, Some(80.0));
        assert!(stored.last_updated > Utc::now() - chrono::Duration::minutes(1));
        assert!(stored.data_quality_score > 0.0);
    }

    #[tokio::test]
    async fn test_cycle_skips_fresh_records() {
        let store = Arc::new(MemoryStore::new());
        store.upsert(record("B000000001", Some(10.0))).await.unwrap();

        let monitor = monitor(HashMap::new(), store);
        assert_eq!(monitor.run_cycle().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_rescrape_leaves_record_untouched() {
        let store = Arc::new(MemoryStore::new());
        let mut old = record("B000000001", Some(100.0));
        old.last_updated = Utc::now() - chrono::Duration::hours(2);
        store.upsert(old.clone()).await.unwrap();

        // no pages: the fetch 404s
        let monitor = monitor(HashMap::new(), store.clone());
        let checked = monitor.run_cycle().await.unwrap();
        assert_eq!(checked, 0);

        let stored = store.get("amazon:B000000001").await.unwrap().unwrap();
        assert_eq!(stored.last_updated, old.last_updated);
    }

    #[tokio::test]
    async fn test_cycle_caps_rescrapes_per_pass() {
        let store = Arc::new(MemoryStore::new());
        let mut pages = HashMap::new();
        for i in 0..15 {
            let id = format!("B0000000{:02}", i);
            let mut r = record(&id, Some(10.0));
            r.last_updated = Utc::now() - chrono::Duration::hours(2);
            pages.insert(r.source_url.clone(), product_page("$10.00"));
            store.upsert(r).await.unwrap();
        }

        let monitor = monitor(pages, store);
        // default cap is 10
        assert_eq!(monitor.run_cycle().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_rescrape_honors_configured_harvest_caps() {
        let store = Arc::new(MemoryStore::new());
        let mut old = record("B000000001", Some(10.0));
        old.last_updated = Utc::now() - chrono::Duration::hours(2);
        store.upsert(old).await.unwrap();

        let mut pages = HashMap::new();
        pages.insert(
            "https://www.amazon.com/dp/B000000001".to_string(),
            r#"<span id="productTitle">Widget</span>
               <div class="a-price"><span class="a-offscreen">$10.00</span></div>
               <div id="feature-bullets">
                   <span class="a-list-item">First bullet point text</span>
                   <span class="a-list-item">Second bullet point text</span>
                   <span class="a-list-item">Third bullet point text</span>
               </div>"#
                .to_string(),
        );

        let limits = ExtractLimits {
            max_images: 10,
            max_bullet_points: 1,
        };
        let monitor = monitor_with_limits(pages, store.clone(), limits);
        assert_eq!(monitor.run_cycle().await.unwrap(), 1);

        let stored = store.get("amazon:B000000001").await.unwrap().unwrap();
        assert_eq!(stored.bullet_points, vec!["First bullet point text"]);
    }
}
