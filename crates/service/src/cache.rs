//! Shared result cache for catalog reads.
//!
//! Backed by a moka future cache with two-tier expiry: a short sliding
//! window (`time_to_idle`, refreshed on access) capped by a longer absolute
//! bound (`time_to_live`). Get/set/remove are atomic per key and safe under
//! concurrent use.
//!
//! Aggregate entries ("all books", optionally search-scoped) are keyed by a
//! namespace version. Invalidation bumps the version instead of enumerating
//! live search-term keys, so every aggregate variant becomes unreachable at
//! once; orphaned entries age out through the expiry policy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use configs::CacheConfig;

use crate::domain::Book;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Single book by id.
    Book(Uuid),
    /// Full listing for one (version, lowercased search term) shape.
    AllBooks { version: u64, search: Option<String> },
}

#[derive(Debug, Clone)]
pub enum CacheValue {
    Book(Book),
    Books(Arc<Vec<Book>>),
}

pub struct ResultCache {
    entries: Cache<CacheKey, CacheValue>,
    aggregate_version: AtomicU64,
}

impl ResultCache {
    pub fn new(cfg: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(cfg.max_entries)
            .time_to_idle(Duration::from_secs(cfg.sliding_secs))
            .time_to_live(Duration::from_secs(cfg.absolute_secs))
            .build();
        Self { entries, aggregate_version: AtomicU64::new(0) }
    }

    pub async fn try_get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.entries.get(key).await
    }

    pub async fn set(&self, key: CacheKey, value: CacheValue) {
        self.entries.insert(key, value).await;
    }

    pub async fn remove(&self, key: &CacheKey) {
        self.entries.invalidate(key).await;
    }

    /// Current aggregate namespace; read into every aggregate key.
    pub fn aggregate_version(&self) -> u64 {
        self.aggregate_version.load(Ordering::Acquire)
    }

    /// Build the aggregate key for the current namespace.
    pub fn aggregate_key(&self, search: Option<&str>) -> CacheKey {
        CacheKey::AllBooks {
            version: self.aggregate_version(),
            search: search.map(|s| s.to_lowercase()),
        }
    }

    /// Drop every aggregate variant, search-scoped ones included, by moving
    /// to a fresh namespace.
    pub fn invalidate_aggregates(&self) {
        self.aggregate_version.fetch_add(1, Ordering::AcqRel);
    }

    pub async fn invalidate_book(&self, id: Uuid) {
        self.remove(&CacheKey::Book(id)).await;
    }
}
