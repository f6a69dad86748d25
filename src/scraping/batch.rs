//! Bounded-concurrency extraction batches
//!
//! Fetches product pages through a semaphore gate so at most
//! `max_concurrent_fetches` requests are in flight, with a minimum
//! inter-request delay held inside the permit. Extraction and
//! normalization run after the permit is released. A failed page is
//! recorded and never aborts its siblings.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ScrapingConfig;
use crate::pipeline::normalize::normalize_record;
use crate::scraping::extract::{extractor_for, ExtractLimits, RetailerExtractor};
use crate::scraping::fetcher::PageFetcher;
use crate::types::{BatchFailure, BatchResult, FailureKind};
use crate::util::truncate_str;

/// Errors that fail a whole batch, as opposed to per-page failures
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("unsupported retailer: {0}")]
    UnsupportedRetailer(String),
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

/// Gated batch runner over a `PageFetcher`
pub struct BatchRunner {
    fetcher: Arc<dyn PageFetcher>,
    gate: Arc<Semaphore>,
    min_delay: Duration,
    limits: ExtractLimits,
}

impl BatchRunner {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &ScrapingConfig) -> Self {
        Self {
            fetcher,
            gate: Arc::new(Semaphore::new(config.max_concurrent_fetches)),
            min_delay: Duration::from_millis(config.request_delay_ms),
            limits: ExtractLimits::from(config),
        }
    }

    /// Fetch, extract, and normalize a batch of product URLs.
    ///
    /// Products complete in no particular order; per-URL failures are
    /// partitioned into the result's failure list by stage.
    pub async fn run(&self, urls: &[String], retailer: &str) -> Result<BatchResult, BatchError> {
        let extractor: Arc<dyn RetailerExtractor> = self.extractor(retailer)?.into();
        let job_id = Uuid::new_v4();
        info!(%job_id, retailer, urls = urls.len(), "starting extraction batch");

        // One timestamp per batch so repeat runs over fixed markup
        // produce identical records.
        let now = Utc::now();

        let tasks = urls.iter().map(|url| {
            let fetcher = self.fetcher.clone();
            let extractor = extractor.clone();
            let gate = self.gate.clone();
            let min_delay = self.min_delay;
            let url = url.clone();
            tokio::spawn(async move {
                let fetched = {
                    // The gate is never closed, so acquire cannot fail;
                    // the permit covers the delay and the fetch only.
                    let _permit = gate.acquire_owned().await.ok();
                    tokio::time::sleep(min_delay).await;
                    fetcher.fetch(&url).await
                };
                match fetched {
                    Ok(markup) => extractor.extract(&markup, &url).map_err(|e| BatchFailure {
                        url,
                        kind: FailureKind::Extraction,
                        reason: e.to_string(),
                    }),
                    Err(e) => Err(BatchFailure {
                        url,
                        kind: FailureKind::Fetch,
                        reason: e.to_string(),
                    }),
                }
            })
        });

        let mut result = BatchResult::new(job_id);
        for (url, joined) in urls.iter().zip(join_all(tasks).await) {
            match joined {
                Ok(Ok(raw)) => {
                    let record = normalize_record(&raw, now);
                    debug!(
                        id = %record.id(),
                        title = %truncate_str(&record.title, 50),
                        "extracted product"
                    );
                    result.products.push(record);
                }
                Ok(Err(failure)) => {
                    warn!(url = %failure.url, kind = ?failure.kind, reason = %failure.reason, "page failed");
                    result.failures.push(failure);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "extraction task aborted");
                    result.failures.push(BatchFailure {
                        url: url.clone(),
                        kind: FailureKind::Extraction,
                        reason: format!("task aborted: {e}"),
                    });
                }
            }
        }

        info!(
            %job_id,
            products = result.success_count(),
            failures = result.failure_count(),
            "extraction batch complete"
        );
        Ok(result)
    }

    /// Walk a retailer's search results and extract every product found.
    ///
    /// Pages are fetched sequentially in page order; the products on each
    /// page go through the gated batch path. A failed search page is
    /// recorded and skipped; a doubled inter-request delay separates pages.
    pub async fn run_search(
        &self,
        retailer: &str,
        category_or_url: &str,
        max_pages: u32,
    ) -> Result<BatchResult, BatchError> {
        let extractor = self.extractor(retailer)?;
        let base = extractor
            .category_url(category_or_url)
            .unwrap_or_else(|| category_or_url.to_string());

        let mut result = BatchResult::new(Uuid::new_v4());
        info!(job_id = %result.job_id, retailer, base = %base, max_pages, "starting search scrape");

        for page in 1..=max_pages {
            let page_url = extractor.page_url(&base, page);
            let markup = match self.fetcher.fetch(&page_url).await {
                Ok(markup) => markup,
                Err(e) => {
                    warn!(page, url = %page_url, error = %e, "search page failed");
                    result.failures.push(BatchFailure {
                        url: page_url,
                        kind: FailureKind::Fetch,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let product_urls = extractor.product_urls(&markup);
            info!(page, products = product_urls.len(), "search page scanned");

            let page_result = self.run(&product_urls, retailer).await?;
            result.products.extend(page_result.products);
            result.failures.extend(page_result.failures);

            if page < max_pages {
                tokio::time::sleep(self.min_delay * 2).await;
            }
        }

        info!(
            job_id = %result.job_id,
            products = result.success_count(),
            failures = result.failure_count(),
            "search scrape complete"
        );
        Ok(result)
    }

    fn extractor(&self, retailer: &str) -> Result<Box<dyn RetailerExtractor>, BatchError> {
        extractor_for(retailer, self.limits)
            .ok_or_else(|| BatchError::UnsupportedRetailer(retailer.to_string()))
    }
}
