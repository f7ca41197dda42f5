//! Business logic services for the store.
//!
//! # Services
//!
//! - `session` - Resolve the signed-in user, admin capability and profile
//! - `catalog` - Product listing and grade filtering
//! - `cart` - Merge-on-add cart, totals and checkout
//! - `admin` - Product CRUD for admins
//!
//! Services are built per request around a session-scoped
//! [`DataService`](crate::backend::DataService) and the shared query cache.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod locks;
pub mod session;

pub use admin::{AdminError, AdminManager, ProductForm};
pub use cart::{CartError, CartLocks, CartManager, CartView, CheckoutError, CheckoutReceipt};
pub use catalog::{CatalogError, CatalogReader};
pub use locks::KeyedLocks;
pub use session::{SessionError, SessionResolver};
