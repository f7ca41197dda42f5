//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::{AccessToken, Backend, BackendError, DynDataService};
use crate::cache::QueryCache;
use crate::config::StoreConfig;
use crate::services::CartLocks;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend, the query cache and the add-to-cart locks.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StoreConfig,
    backend: Backend,
    cache: QueryCache,
    cart_locks: CartLocks,
}

impl AppState {
    /// Create application state for `config`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Config` if the backend client cannot be built.
    pub fn new(config: StoreConfig) -> Result<Self, BackendError> {
        let backend = Backend::from_config(&config.backend)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Create application state around an existing backend.
    #[must_use]
    pub fn with_backend(config: StoreConfig, backend: Backend) -> Self {
        let cache = QueryCache::new(config.cache_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                cache,
                cart_locks: CartLocks::new(),
            }),
        }
    }

    /// Get a reference to the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Get a reference to the backend.
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// Get a reference to the query cache.
    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    /// Get a reference to the add-to-cart locks.
    #[must_use]
    pub fn cart_locks(&self) -> &CartLocks {
        &self.inner.cart_locks
    }

    /// Open a backend session for the holder of `token`.
    #[must_use]
    pub fn data(&self, token: Option<AccessToken>) -> DynDataService {
        self.inner.backend.session(token)
    }
}
