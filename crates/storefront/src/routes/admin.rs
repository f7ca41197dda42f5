//! Admin product route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::{Value, json};
use tracing::instrument;

use gundam_store_core::ProductId;

use super::ProductView;
use crate::error::Result;
use crate::middleware::Caller;
use crate::services::{AdminManager, ProductForm};
use crate::state::AppState;

/// Product table for the admin panel.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<ProductView>>> {
    let products = AdminManager::new(caller.data(), state.cache())
        .list_products(caller.user())
        .await?;

    Ok(Json(
        products.iter().cloned().map(ProductView::from).collect(),
    ))
}

/// Create a product.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Json(form): Json<ProductForm>,
) -> Result<Json<Value>> {
    let product = AdminManager::new(caller.data(), state.cache())
        .create_product(caller.user(), form)
        .await?;

    Ok(Json(json!({
        "message": "Product added!",
        "product": ProductView::from(product),
    })))
}

/// Update a product.
#[instrument(skip(state, caller, form))]
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ProductId>,
    Json(form): Json<ProductForm>,
) -> Result<Json<Value>> {
    let product = AdminManager::new(caller.data(), state.cache())
        .update_product(caller.user(), id, form)
        .await?;

    Ok(Json(json!({
        "message": "Product updated!",
        "product": ProductView::from(product),
    })))
}

/// Delete a product.
#[instrument(skip(state, caller))]
pub async fn destroy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ProductId>,
) -> Result<Json<Value>> {
    AdminManager::new(caller.data(), state.cache())
        .delete_product(caller.user(), id)
        .await?;

    Ok(Json(json!({ "message": "Product deleted!" })))
}
