//! Core types for Gundam Store.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod grade;
pub mod id;
pub mod price;
pub mod product;
pub mod role;

pub use cart::{CartEntry, CartLine, compute_total};
pub use grade::{Grade, GradeParseError};
pub use id::*;
pub use price::{Price, PriceError};
pub use product::{Product, filter_by_grade};
pub use role::AppRole;
