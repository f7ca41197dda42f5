//! Product administration.
//!
//! Every operation requires the admin capability resolved on
//! [`CurrentUser`]. Every write invalidates the catalog caches.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument};
use validator::{Validate, ValidationError, ValidationErrors};

use gundam_store_core::{Grade, Price, Product, ProductId};

use crate::backend::{BackendError, DataService, Query, Row, Table, select_as, to_row};
use crate::cache::{QueryCache, QueryKey};
use crate::models::CurrentUser;

use super::catalog::load_products;

/// Errors from admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Please sign in")]
    NotAuthenticated,

    #[error("Admin access required")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("Product {0} not found")]
    NotFound(ProductId),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Product create/edit form as submitted by the admin panel.
///
/// The price arrives as text and is parsed as a decimal.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductForm {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(custom(function = "validate_price"))]
    pub price: String,

    #[serde(default)]
    pub grade: Grade,

    #[validate(url(message = "Link must be a valid URL"))]
    #[serde(default)]
    pub link: Option<String>,
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProductFields {
    name: String,
    price: Price,
    grade: Grade,
    link: Option<String>,
}

impl ProductForm {
    /// Trim every field and treat an empty link as absent.
    #[must_use]
    pub fn normalized(self) -> Self {
        let link = self
            .link
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty());
        Self {
            name: self.name.trim().to_string(),
            price: self.price.trim().to_string(),
            grade: self.grade,
            link,
        }
    }

    fn into_fields(self) -> Result<ProductFields, AdminError> {
        let form = self.normalized();
        form.validate()
            .map_err(|errors| AdminError::Validation(format_validation_errors(&errors)))?;

        let price = form
            .price
            .parse::<Price>()
            .map_err(|e| AdminError::Validation(format!("price: {e}")))?;

        Ok(ProductFields {
            name: form.name,
            price,
            grade: form.grade,
            link: form.link,
        })
    }

    /// Validate the form and build a new product from it.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Validation` describing every invalid field.
    pub fn into_product(self) -> Result<Product, AdminError> {
        let fields = self.into_fields()?;
        Ok(Product {
            id: ProductId::generate(),
            name: fields.name,
            price: fields.price,
            grade: fields.grade,
            link: fields.link,
            created_at: Utc::now(),
        })
    }
}

/// Product CRUD for admins.
pub struct AdminManager<'a> {
    data: &'a dyn DataService,
    cache: &'a QueryCache,
}

impl<'a> AdminManager<'a> {
    #[must_use]
    pub const fn new(data: &'a dyn DataService, cache: &'a QueryCache) -> Self {
        Self { data, cache }
    }

    /// Every product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotAuthenticated`/`Forbidden` for non-admins and
    /// `AdminError::Backend` if the select fails.
    #[instrument(skip(self, user))]
    pub async fn list_products(
        &self,
        user: Option<&CurrentUser>,
    ) -> Result<Arc<Vec<Product>>, AdminError> {
        authorize(user)?;
        Ok(load_products(self.data, self.cache, QueryKey::AdminProducts).await?)
    }

    /// Create a product from `form`.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Validation` for an invalid form, plus the
    /// authorization and backend errors of [`AdminManager::list_products`].
    #[instrument(skip(self, user, form), fields(name = %form.name))]
    pub async fn create_product(
        &self,
        user: Option<&CurrentUser>,
        form: ProductForm,
    ) -> Result<Product, AdminError> {
        authorize(user)?;
        let product = form.into_product()?;

        self.data
            .insert(Table::Products, to_row(&product)?)
            .await?;

        self.cache.invalidate_catalog().await;
        info!(product_id = %product.id, "Product added");
        Ok(product)
    }

    /// Replace the editable fields of product `id`.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotFound` for an unknown id, plus the errors of
    /// [`AdminManager::create_product`].
    #[instrument(skip(self, user, form))]
    pub async fn update_product(
        &self,
        user: Option<&CurrentUser>,
        id: ProductId,
        form: ProductForm,
    ) -> Result<Product, AdminError> {
        authorize(user)?;
        let fields = form.into_fields()?;

        let existing: Vec<Product> =
            select_as(self.data, &Query::table(Table::Products).eq("id", id)).await?;
        let existing = existing.into_iter().next().ok_or(AdminError::NotFound(id))?;

        let product = Product {
            name: fields.name,
            price: fields.price,
            grade: fields.grade,
            link: fields.link,
            ..existing
        };

        let mut patch: Row = to_row(&product)?;
        patch.retain(|column, _| matches!(column.as_str(), "name" | "price" | "grade" | "link"));
        // Send an explicit null so a cleared link is removed
        patch.entry("link").or_insert(Value::Null);

        self.data
            .update(&Query::table(Table::Products).eq("id", id), patch)
            .await?;

        self.cache.invalidate_catalog().await;
        info!("Product updated");
        Ok(product)
    }

    /// Delete product `id`. Deleting a missing product succeeds.
    ///
    /// # Errors
    ///
    /// Returns the authorization and backend errors of
    /// [`AdminManager::list_products`].
    #[instrument(skip(self, user))]
    pub async fn delete_product(
        &self,
        user: Option<&CurrentUser>,
        id: ProductId,
    ) -> Result<(), AdminError> {
        authorize(user)?;

        self.data
            .delete(&Query::table(Table::Products).eq("id", id))
            .await?;

        self.cache.invalidate_catalog().await;
        info!("Product deleted");
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn authorize(user: Option<&CurrentUser>) -> Result<&CurrentUser, AdminError> {
    let user = user.ok_or(AdminError::NotAuthenticated)?;
    if user.is_admin {
        Ok(user)
    } else {
        Err(AdminError::Forbidden)
    }
}

fn validate_price(price: &str) -> Result<(), ValidationError> {
    if price.is_empty() {
        return Err(ValidationError::new("required").with_message("Price is required".into()));
    }
    match price.parse::<Price>() {
        Ok(_) => Ok(()),
        Err(e) => Err(ValidationError::new("price").with_message(e.to_string().into())),
    }
}

/// One `field: message` per error, sorted by field.
fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |error| {
                let message = error
                    .message
                    .as_ref()
                    .map_or_else(|| format!("invalid {field}"), ToString::to_string);
                format!("{field}: {message}")
            })
        })
        .collect();
    messages.sort();

    if messages.is_empty() {
        "Validation failed".to_string()
    } else {
        messages.join("; ")
    }
}
