//! Cart and checkout route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use gundam_store_core::{CartEntryId, CartLine, Price, ProductId};

use super::ProductView;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::Caller;
use crate::services::{CartManager, CartView};
use crate::state::AppState;

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
}

/// Cart line as returned by the API.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub entry_id: CartEntryId,
    pub product: ProductView,
    pub quantity: u32,
    pub line_total: Price,
    pub display_line_total: String,
}

impl From<CartLine> for CartLineView {
    fn from(line: CartLine) -> Self {
        let line_total = line.line_total();
        Self {
            entry_id: line.entry_id,
            product: line.product.into(),
            quantity: line.quantity,
            line_total,
            display_line_total: line_total.display(),
        }
    }
}

/// Cart as returned by the API.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub total: Price,
    pub display_total: String,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            lines: view.lines.into_iter().map(CartLineView::from).collect(),
            item_count: view.item_count,
            display_total: view.total.display(),
            total: view.total,
        }
    }
}

/// Display the cart.
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, caller: Caller) -> Result<Json<CartResponse>> {
    let view = CartManager::new(caller.data(), state.cache(), state.cart_locks())
        .list_cart(caller.user())
        .await?;

    Ok(Json(view.into()))
}

/// Add one unit of a product to the cart.
#[instrument(skip(state, caller))]
pub async fn add(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<Value>> {
    let entry = CartManager::new(caller.data(), state.cache(), state.cart_locks())
        .add_to_cart(caller.user(), request.product_id)
        .await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", &request.product_id.to_string())]),
    );

    Ok(Json(json!({ "message": "Added to cart!", "entry": entry })))
}

/// Remove a cart entry.
#[instrument(skip(state, caller))]
pub async fn remove(
    State(state): State<AppState>,
    caller: Caller,
    Path(entry_id): Path<CartEntryId>,
) -> Result<Json<Value>> {
    CartManager::new(caller.data(), state.cache(), state.cart_locks())
        .remove_from_cart(caller.user(), entry_id)
        .await?;

    Ok(Json(json!({ "message": "Removed from cart" })))
}

/// Purchase everything in the cart.
#[instrument(skip_all)]
pub async fn checkout(State(state): State<AppState>, caller: Caller) -> Result<Json<Value>> {
    let receipt = CartManager::new(caller.data(), state.cache(), state.cart_locks())
        .checkout(caller.user())
        .await?;

    add_breadcrumb("cart", "Checkout completed", None);

    Ok(Json(json!({
        "message": "Order placed! Products have been purchased.",
        "receipt": receipt,
    })))
}

/// Finish checkouts that failed part-way.
#[instrument(skip_all)]
pub async fn resume_checkout(State(state): State<AppState>, caller: Caller) -> Result<Json<Value>> {
    let completed = CartManager::new(caller.data(), state.cache(), state.cart_locks())
        .resume_pending_checkout(caller.user())
        .await?;

    Ok(Json(json!({ "completed": completed })))
}
