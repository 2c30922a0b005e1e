//! Storefront
//!
//! Pricing, cart and checkout core for a multi-role storefront: a pure price calculator, a cart
//! aggregate that keeps its totals in step with its lines, and order materialization that
//! freezes a cart into an immutable snapshot.

pub mod analytics;
pub mod cart;
pub mod catalog;
pub mod coupons;
pub mod discounts;
pub mod fixtures;
pub mod ids;
pub mod orders;
pub mod prelude;
pub mod pricing;
pub mod products;
pub mod receipt;
pub mod service;
pub mod store;
