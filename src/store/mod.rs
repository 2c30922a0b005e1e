//! Store
//!
//! The persistence collaborator the service talks to. Every call is a single request. The
//! multi-step writes, [`Store::save_cart`] and [`Store::create_order`], must be atomic.

use async_trait::async_trait;
use mockall::automock;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    cart::{Cart, CartChange, CartLine, CustomerUuid},
    coupons::Coupon,
    orders::{Order, OrderError, OrderSnapshot, OrderStatus, OrderUuid},
    pricing::Amount,
    products::{Product, ProductUuid},
};

mod memory;

pub use memory::InMemoryStore;

/// Errors reported by a [`Store`].
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// No such record.
    #[error("record not found")]
    NotFound,

    /// The cart changed since it was read.
    #[error("cart revision conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Revision the writer read
        expected: u64,

        /// Revision currently stored
        actual: u64,
    },

    /// The order can't move to the requested status.
    #[error(transparent)]
    InvalidTransition(#[from] OrderError),

    /// The backend couldn't be reached or refused the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Stored cart header: totals, coupon and revision.
///
/// Totals are informational; they are recomputed from the lines whenever the cart is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CartRecord {
    /// Applied coupon code
    pub coupon_code: Option<String>,

    /// Units across every line
    pub item_count: u64,

    /// Sum of discounted line totals
    pub total_cost: Amount,

    /// Amount payable
    pub final_amount: Amount,

    /// Incremented on every successful save
    pub revision: u64,
}

impl CartRecord {
    /// Header of a cart that has never been saved.
    pub fn empty(currency: &'static Currency) -> Self {
        Self {
            coupon_code: None,
            item_count: 0,
            total_cost: Money::from_minor(0, currency),
            final_amount: Money::from_minor(0, currency),
            revision: 0,
        }
    }

    /// Header describing `cart`, to be saved over `revision`.
    pub fn of(cart: &Cart, revision: u64) -> Self {
        Self {
            coupon_code: cart.coupon().map(|coupon| coupon.code().to_string()),
            item_count: cart.total_item_count(),
            total_cost: cart.total_cost(),
            final_amount: cart.final_amount(),
            revision,
        }
    }
}

/// A line change written together with its cart header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineWrite {
    /// Create or replace the line for `product`.
    Upsert {
        /// Product on the line
        product: ProductUuid,

        /// New quantity, at least one
        quantity: u32,
    },

    /// Delete the line for a product. Deleting a missing line succeeds.
    Delete(ProductUuid),
}

impl LineWrite {
    /// The write that persists `change`; a zero quantity deletes the line.
    pub fn of(change: &CartChange) -> Self {
        match change.quantity {
            0 => Self::Delete(change.product),
            quantity => Self::Upsert {
                product: change.product,
                quantity,
            },
        }
    }
}

/// Persistence for products, carts, coupons and orders.
#[automock]
#[async_trait]
pub trait Store: Send + Sync {
    /// Retrieve a single product.
    async fn fetch_product(&self, product: ProductUuid) -> Result<Product, StoreError>;

    /// Retrieve a customer's cart lines, in the order they were first added.
    async fn fetch_cart_lines(&self, customer: CustomerUuid) -> Result<Vec<CartLine>, StoreError>;

    /// Create or replace the line for (`customer`, `product`).
    async fn upsert_cart_line(
        &self,
        customer: CustomerUuid,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<(), StoreError>;

    /// Delete the line for (`customer`, `product`). Deleting a missing line succeeds.
    async fn delete_cart_line(
        &self,
        customer: CustomerUuid,
        product: ProductUuid,
    ) -> Result<(), StoreError>;

    /// Look up a coupon by normalised code.
    async fn fetch_coupon(&self, code: &str) -> Result<Coupon, StoreError>;

    /// Retrieve a customer's cart header. Customers without one get an empty header at
    /// revision 0.
    async fn fetch_cart(&self, customer: CustomerUuid) -> Result<CartRecord, StoreError>;

    /// Save a cart header, and optionally one line, if the stored revision is still
    /// `expected_revision`.
    ///
    /// The revision check, the line write and the header write happen atomically: on any error
    /// nothing is written. Returns the new revision.
    async fn save_cart(
        &self,
        customer: CustomerUuid,
        record: CartRecord,
        line: Option<LineWrite>,
        expected_revision: u64,
    ) -> Result<u64, StoreError>;

    /// Atomically create a pending order from `snapshot` and empty the customer's cart: lines
    /// deleted, totals zeroed, coupon detached. Nothing changes if the cart revision is no
    /// longer `expected_revision`.
    async fn create_order(
        &self,
        snapshot: OrderSnapshot,
        expected_revision: u64,
    ) -> Result<Order, StoreError>;

    /// Delete every line and reset the header of a customer's cart.
    async fn clear_cart(&self, customer: CustomerUuid) -> Result<(), StoreError>;

    /// A customer's orders, newest first.
    async fn orders_for_customer(&self, customer: CustomerUuid) -> Result<Vec<Order>, StoreError>;

    /// Change an order's status.
    async fn update_order_status(
        &self,
        order: OrderUuid,
        status: OrderStatus,
    ) -> Result<Order, StoreError>;
}
