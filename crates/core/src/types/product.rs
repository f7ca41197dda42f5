//! Catalog products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Grade, Price, ProductId};

/// A model kit listed for sale.
///
/// Each product is a unique physical kit: checkout removes it from the
/// catalog rather than decrementing stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub grade: Grade,
    /// Optional external reference link.
    #[serde(default)]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Keep only products of `grade`, preserving order. `None` keeps everything.
#[must_use]
pub fn filter_by_grade(products: Vec<Product>, grade: Option<Grade>) -> Vec<Product> {
    match grade {
        Some(grade) => products.into_iter().filter(|p| p.grade == grade).collect(),
        None => products,
    }
}
