//! Cart entries and totals.

use serde::{Deserialize, Serialize};

use super::{CartEntryId, Price, Product, ProductId, UserId};

/// A row of the `cart` table.
///
/// At most one entry exists per (user, product) pair; repeat adds increment
/// `quantity` instead of creating a new row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub id: CartEntryId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A cart entry joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub entry_id: CartEntryId,
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    /// `price * quantity` for this line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// Sum of every line's `price * quantity`. Zero for an empty cart.
#[must_use]
pub fn compute_total(lines: &[CartLine]) -> Price {
    lines.iter().map(CartLine::line_total).sum()
}
