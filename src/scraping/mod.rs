//! Product scraping subsystem
//!
//! Turns retailer URLs into raw product fields:
//! - `fetcher`: the async page-retrieval seam and its reqwest default
//! - `extract`: per-retailer selector-chain field extraction
//! - `batch`: semaphore-gated batch and search-results runners
//!
//! Everything downstream of the fetch is pure and synchronous; the only
//! suspension points are the page fetches themselves.

pub mod batch;
pub mod extract;
pub mod fetcher;

pub use batch::{BatchError, BatchRunner};
pub use extract::{extractor_for, ExtractError, ExtractLimits, RawRecord, RetailerExtractor};
pub use fetcher::{FetchEngine, FetchError, PageFetcher};
