//! Gundam Store Core - Shared domain types.
//!
//! This crate provides the types used across all Gundam Store components:
//! - `storefront` - Catalog, cart, checkout and admin API
//! - `cli` - Command-line tools for seeding and inspecting the catalog
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no backend
//! access, no HTTP clients. Cart totals and grade filtering live here so they
//! can be tested without a running data service.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, grades, products, cart lines and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
