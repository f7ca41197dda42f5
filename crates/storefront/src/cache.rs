//! Query result cache.
//!
//! Read paths look up a [`QueryKey`] first and fall back to the backend on a
//! miss. Write paths invalidate exactly the keys whose results they change;
//! entries also expire after the configured TTL.
//!
//! A read that misses takes a [`Generation`] before going to the backend and
//! hands it back to [`QueryCache::insert`]. Every invalidation advances the
//! generation, so a result read before a concurrent write is never stored
//! over that write's invalidation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, warn};

use gundam_store_core::{CartLine, Product, UserId};

/// Cache key: one per distinct backend query.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum QueryKey {
    /// Storefront catalog.
    Products,
    /// Admin product table.
    AdminProducts,
    /// Joined cart view of a user.
    Cart(UserId),
    /// Admin capability of a user.
    IsAdmin(UserId),
    /// Profile username of a user.
    Profile(UserId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Arc<Vec<Product>>),
    Cart(Arc<Vec<CartLine>>),
    Flag(bool),
    Username(Option<String>),
}

/// Invalidation counter observed when a backend read started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Shared query cache. Cheap to clone.
#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<QueryKey, CacheValue>,
    generation: Arc<AtomicU64>,
}

impl QueryCache {
    /// Create a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Take before reading from the backend; pass to [`QueryCache::insert`].
    #[must_use]
    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::SeqCst))
    }

    pub async fn get(&self, key: &QueryKey) -> Option<CacheValue> {
        let value = self.inner.get(key).await;
        if value.is_some() {
            debug!(?key, "Cache hit");
        }
        value
    }

    /// Store a result read at `read_at`.
    ///
    /// Returns `false` and stores nothing when any invalidation ran after
    /// `read_at`, since the result may predate that write.
    pub async fn insert(&self, key: QueryKey, value: CacheValue, read_at: Generation) -> bool {
        if self.generation() != read_at {
            debug!(?key, "Skipping cache fill after invalidation");
            return false;
        }

        self.inner.insert(key.clone(), value).await;

        // An invalidation may have landed between the check and the insert
        if self.generation() != read_at {
            self.inner.invalidate(&key).await;
            debug!(?key, "Dropped cache fill raced by invalidation");
            return false;
        }
        true
    }

    /// Cached product list under `key`, if any.
    pub async fn products(&self, key: &QueryKey) -> Option<Arc<Vec<Product>>> {
        match self.get(key).await {
            Some(CacheValue::Products(products)) => Some(products),
            _ => None,
        }
    }

    /// Cached cart view of `user`, if any.
    pub async fn cart(&self, user: UserId) -> Option<Arc<Vec<CartLine>>> {
        match self.get(&QueryKey::Cart(user)).await {
            Some(CacheValue::Cart(lines)) => Some(lines),
            _ => None,
        }
    }

    /// Drop a single key.
    pub async fn invalidate(&self, key: &QueryKey) {
        self.advance();
        self.inner.invalidate(key).await;
    }

    /// Drop both product listings.
    pub async fn invalidate_products(&self) {
        self.invalidate(&QueryKey::Products).await;
        self.invalidate(&QueryKey::AdminProducts).await;
    }

    /// Drop both product listings and every cart view.
    ///
    /// Cart views embed product rows, so any product write makes them stale.
    pub async fn invalidate_catalog(&self) {
        self.invalidate_products().await;
        self.advance();
        if let Err(e) = self
            .inner
            .invalidate_entries_if(|key, _| matches!(key, QueryKey::Cart(_)))
        {
            warn!(error = %e, "Failed to invalidate cart views");
        }
    }

    /// Drop every key belonging to `user`.
    pub async fn invalidate_user(&self, user: UserId) {
        self.invalidate(&QueryKey::Cart(user)).await;
        self.invalidate(&QueryKey::IsAdmin(user)).await;
        self.invalidate(&QueryKey::Profile(user)).await;
    }

    fn advance(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
