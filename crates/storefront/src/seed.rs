//! YAML seed data for the in-memory backend and the CLI.
//!
//! ```yaml
//! products:
//!   - name: RX-78-2 Gundam
//!     price: "24.99"
//!     grade: HG
//!     link: https://example.com/rx-78-2
//! users:
//!   - email: amuro@efsf.test
//!     password: white-base
//!     username: amuro
//!     admin: true
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use gundam_store_core::{AppRole, Product};

use crate::backend::{BackendError, DataService, MemoryBackend, Table, to_row};
use crate::services::{AdminError, ProductForm};

/// Errors from loading or applying seed data.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid product {name:?}: {source}")]
    Product {
        name: String,
        #[source]
        source: AdminError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Parsed seed file.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub products: Vec<ProductForm>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// A user account to create.
#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub admin: bool,
}

/// What a seed run created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: usize,
    pub users: usize,
}

impl SeedFile {
    /// Read and parse a seed file.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Read` or `SeedError::Parse`.
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse seed YAML.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Parse` for malformed YAML.
    pub fn parse(contents: &str) -> Result<Self, SeedError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Validate every product form up front so a bad entry seeds nothing.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Product` for the first invalid entry.
    pub fn products(&self) -> Result<Vec<Product>, SeedError> {
        self.products
            .iter()
            .map(|form| {
                form.clone()
                    .into_product()
                    .map_err(|source| SeedError::Product {
                        name: form.name.clone(),
                        source,
                    })
            })
            .collect()
    }
}

/// Insert `products` through a data service.
///
/// # Errors
///
/// Returns the first backend error; earlier inserts are kept.
pub async fn insert_products(
    data: &dyn DataService,
    products: &[Product],
) -> Result<usize, SeedError> {
    for product in products {
        data.insert(Table::Products, to_row(product)?).await?;
    }
    Ok(products.len())
}

/// Load users and products into the in-memory backend.
///
/// # Errors
///
/// Returns `SeedError::Product` for an invalid product entry.
pub async fn apply_to_memory(
    backend: &MemoryBackend,
    seed: &SeedFile,
) -> Result<SeedSummary, SeedError> {
    let products = seed.products()?;

    for user in &seed.users {
        let id = backend.create_user(&user.email, &user.password).await;
        if let Some(username) = &user.username {
            backend.set_username(id, username).await;
        }
        if user.admin {
            backend.grant_role(id, AppRole::Admin).await;
        }
    }

    let data = backend.session(None);
    let summary = SeedSummary {
        products: insert_products(&data, &products).await?,
        users: seed.users.len(),
    };

    info!(
        products = summary.products,
        users = summary.users,
        "Seed data loaded"
    );
    Ok(summary)
}
