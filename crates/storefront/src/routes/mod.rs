//! HTTP route handlers for the store.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness
//! GET    /health/ready              - Backend reachability
//!
//! # Auth
//! POST   /auth/login                - Password sign-in
//! POST   /auth/logout               - Sign out
//!
//! # Storefront API
//! GET    /api/me                    - Current user
//! GET    /api/products?grade=MG     - Catalog, optional grade filter
//! GET    /api/grades                - Grade codes and badge labels
//! GET    /api/cart                  - Cart view and total
//! POST   /api/cart                  - Add to cart
//! DELETE /api/cart/{entry_id}       - Remove from cart
//! POST   /api/checkout              - Purchase the cart
//! POST   /api/checkout/resume       - Finish interrupted checkouts
//!
//! # Admin API (requires admin role)
//! GET    /api/admin/products        - Product table
//! POST   /api/admin/products        - Create product
//! PUT    /api/admin/products/{id}   - Update product
//! DELETE /api/admin/products/{id}   - Delete product
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod health;
pub mod products;

use axum::{
    Router,
    http::Uri,
    routing::{delete, get, post, put},
};
use serde::Serialize;

use gundam_store_core::Product;

use crate::error::AppError;
use crate::state::AppState;

/// Product as returned by the API, with display fields.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub display_price: String,
    pub grade_label: String,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            display_price: product.price.display(),
            grade_label: product.grade.badge_label(),
            product,
        }
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the admin API routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(admin::index).post(admin::create))
        .route("/products/{id}", put(admin::update).delete(admin::destroy))
}

/// Create the storefront API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(auth::me))
        .route("/products", get(products::index))
        .route("/grades", get(products::grades))
        .route("/cart", get(cart::show).post(cart::add))
        .route("/cart/{entry_id}", delete(cart::remove))
        .route("/checkout", post(cart::checkout))
        .route("/checkout/resume", post(cart::resume_checkout))
        .nest("/admin", admin_routes())
}

/// Create all routes for the store.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .nest("/api", api_routes())
        .fallback(not_found)
}

/// JSON 404 for unknown paths.
async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
