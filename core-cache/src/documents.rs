//! Parsed-document lookup keyed by content hash.
//!
//! Repeat uploads of an identical file hit the short-lived cache or the
//! backend document table instead of re-parsing.

use bridge_traits::{DocumentRecord, DocumentStore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{CacheOptions, EphemeralCache};
use crate::error::Result;

const NAMESPACE: &str = "documents";

/// SHA-256 hex digest of raw file bytes, the canonical document key.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Cache-fronted access to the parsed-document table.
pub struct DocumentLookup {
    cache: Arc<EphemeralCache>,
    store: Arc<dyn DocumentStore>,
    ttl: Duration,
}

impl DocumentLookup {
    pub fn new(cache: Arc<EphemeralCache>, store: Arc<dyn DocumentStore>, ttl: Duration) -> Self {
        Self { cache, store, ttl }
    }

    fn options(&self) -> CacheOptions {
        CacheOptions::ttl(self.ttl).with_namespace(NAMESPACE)
    }

    /// Looks up a parsed document by content hash, cache first, backend on a
    /// miss. A backend hit is re-cached for subsequent lookups.
    pub async fn find(&self, hash: &str) -> Result<Option<DocumentRecord>> {
        let options = self.options();
        if let Some(record) = self.cache.get::<DocumentRecord>(hash, &options).await? {
            debug!(hash, "document cache hit");
            return Ok(Some(record));
        }

        let Some(record) = self.store.fetch_by_hash(hash).await? else {
            return Ok(None);
        };
        self.cache.set(hash, &record, &options).await?;
        Ok(Some(record))
    }

    /// Persists a freshly parsed document and caches it under its hash.
    pub async fn save(&self, record: &DocumentRecord) -> Result<()> {
        self.store.upsert(record).await?;
        self.cache.set(&record.hash, record, &self.options()).await
    }
}
