//! Storefront prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{Cart, CartChange, CartError, CartLine, CartState, CustomerUuid, StockExceeded},
    catalog::{Catalog, ProductFilter, SortOrder},
    coupons::Coupon,
    discounts::{Percent, PercentError},
    fixtures::{Fixture, FixtureError},
    orders::{CheckoutError, Order, OrderError, OrderSnapshot, OrderStatus, OrderUuid, materialize},
    pricing::{Amount, LineInput, PriceBreakdown, PricingError, TaxPolicy, calculate},
    products::{NewProduct, Product, ProductError, ProductUuid},
    receipt::ReceiptError,
    service::{CartUpdate, CartsService, CheckoutService, ShopError, Storefront},
    store::{CartRecord, InMemoryStore, LineWrite, Store, StoreError},
};
