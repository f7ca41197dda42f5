//! Catalog reads.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use gundam_store_core::{Grade, Product, filter_by_grade};

use crate::backend::{BackendError, DataService, Query, Table, select_as};
use crate::cache::{CacheValue, QueryCache, QueryKey};
use crate::models::CurrentUser;

/// Errors from catalog reads.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Please sign in to browse the catalog")]
    NotAuthenticated,

    #[error("Failed to load products: {0}")]
    ReadFailed(#[from] BackendError),
}

/// Reads the product catalog for a signed-in user.
pub struct CatalogReader<'a> {
    data: &'a dyn DataService,
    cache: &'a QueryCache,
}

impl<'a> CatalogReader<'a> {
    #[must_use]
    pub const fn new(data: &'a dyn DataService, cache: &'a QueryCache) -> Self {
        Self { data, cache }
    }

    /// Every product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotAuthenticated` without a user and
    /// `CatalogError::ReadFailed` if the select fails.
    #[instrument(skip(self, user), fields(user_id = ?user.map(|u| u.id)))]
    pub async fn list_products(
        &self,
        user: Option<&CurrentUser>,
    ) -> Result<Arc<Vec<Product>>, CatalogError> {
        if user.is_none() {
            return Err(CatalogError::NotAuthenticated);
        }
        Ok(load_products(self.data, self.cache, QueryKey::Products).await?)
    }

    /// Products of `grade` (all products when `None`), newest first.
    ///
    /// # Errors
    ///
    /// Same as [`CatalogReader::list_products`].
    pub async fn list_by_grade(
        &self,
        user: Option<&CurrentUser>,
        grade: Option<Grade>,
    ) -> Result<Vec<Product>, CatalogError> {
        let products = self.list_products(user).await?;
        Ok(filter_by_grade(products.as_ref().clone(), grade))
    }
}

/// Load the product table ordered by `created_at` descending, through `key`.
pub(crate) async fn load_products(
    data: &dyn DataService,
    cache: &QueryCache,
    key: QueryKey,
) -> Result<Arc<Vec<Product>>, BackendError> {
    if let Some(products) = cache.products(&key).await {
        return Ok(products);
    }

    let read_at = cache.generation();
    let products: Vec<Product> = select_as(
        data,
        &Query::table(Table::Products).order_desc("created_at"),
    )
    .await?;
    let products = Arc::new(products);

    cache
        .insert(key, CacheValue::Products(Arc::clone(&products)), read_at)
        .await;
    Ok(products)
}
