//! Test doubles for the data service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{BackendError, DataService, Identity, Query, Row, Table};

/// Wraps a data service and holds the first select on one table until released.
pub struct GatedSelect<D> {
    inner: D,
    table: Table,
    armed: AtomicBool,
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

impl<D: DataService> GatedSelect<D> {
    pub fn new(inner: D, table: Table) -> Self {
        Self {
            inner,
            table,
            armed: AtomicBool::new(true),
            reached: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    /// Resolves once the gated select has read its rows.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the gated select return.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl<D: DataService> DataService for GatedSelect<D> {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, BackendError> {
        let rows = self.inner.select(query).await;
        if query.table == self.table && self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        rows
    }

    async fn insert(&self, table: Table, row: Row) -> Result<(), BackendError> {
        self.inner.insert(table, row).await
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<(), BackendError> {
        self.inner.update(query, patch).await
    }

    async fn delete(&self, query: &Query) -> Result<(), BackendError> {
        self.inner.delete(query).await
    }

    async fn current_identity(&self) -> Result<Option<Identity>, BackendError> {
        self.inner.current_identity().await
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.inner.sign_out().await
    }
}
