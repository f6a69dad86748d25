//! Catalog persistence seam
//!
//! The pipeline treats the catalog as opaque key-addressed storage with
//! last-writer-wins semantics; it never assumes a backend or query
//! language. `MemoryStore` is the in-process default used by the CLI and
//! tests.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::types::{ProductId, ProductRecord};

/// Backend-opaque storage failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Record predicate used by `CatalogStore::query`
pub type RecordPredicate<'a> = &'a (dyn Fn(&ProductRecord) -> bool + Sync);

/// Opaque catalog storage
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or overwrite a record under its `{retailer}:{external_id}` key
    async fn upsert(&self, record: ProductRecord) -> Result<(), StoreError>;

    /// Fetch one record by id
    async fn get(&self, id: &str) -> Result<Option<ProductRecord>, StoreError>;

    /// All records matching the predicate, in unspecified order
    async fn query(&self, predicate: RecordPredicate<'_>) -> Result<Vec<ProductRecord>, StoreError>;

    /// Remove a record; removing an absent id is not an error
    async fn remove(&self, id: &str) -> Result<(), StoreError>;

    /// Number of stored records
    async fn len(&self) -> Result<usize, StoreError>;
}

/// In-memory catalog on a concurrent map, last writer wins
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<ProductId, ProductRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn upsert(&self, record: ProductRecord) -> Result<(), StoreError> {
        self.records.insert(record.id(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ProductRecord>, StoreError> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    async fn query(&self, predicate: RecordPredicate<'_>) -> Result<Vec<ProductRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.records.remove(id);
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }
}
