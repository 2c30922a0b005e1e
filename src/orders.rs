//! Orders
//!
//! Checkout turns a populated [`Cart`] into an [`OrderSnapshot`] with every price frozen, and the
//! store turns that snapshot into an [`Order`]. After creation only the status can change.

use std::fmt;

use jiff::Timestamp;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    cart::{Cart, CustomerUuid},
    discounts::Percent,
    ids::TypedUuid,
    pricing::{Amount, LineInput, PricingError, price_lines},
    products::ProductUuid,
};

/// Order UUID
pub type OrderUuid = TypedUuid<Order>;

/// Errors raised at checkout.
#[derive(Debug, Error, PartialEq)]
pub enum CheckoutError {
    /// Nothing to order; no order was created.
    #[error("cannot check out an empty cart")]
    EmptyCart,

    /// The snapshot couldn't be priced.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Errors raised when updating an order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// Completed and failed orders are final.
    #[error("order cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: OrderStatus,

        /// Requested status
        to: OrderStatus,
    },
}

/// Fulfilment status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderStatus {
    /// Awaiting fulfilment
    #[default]
    Pending,

    /// Fulfilled
    Completed,

    /// Abandoned or rejected
    Failed,
}

impl OrderStatus {
    /// Whether no further transitions are allowed.
    pub fn is_final(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        })
    }
}

/// A product line frozen at checkout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderLine {
    /// Product ordered
    pub product: ProductUuid,

    /// Units ordered
    pub quantity: u32,

    /// Discounted unit price at the time of the order
    pub unit_price: Amount,

    /// `unit_price × quantity`
    pub line_total: Amount,
}

/// Everything needed to create an order, captured from a cart at checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    /// Customer checking out
    pub customer: CustomerUuid,

    /// Lines in cart order
    pub lines: Vec<OrderLine>,

    /// Pre-coupon, pre-tax cost
    pub order_cost: Amount,

    /// Coupon percentage at the time of purchase
    pub discount_percentage: Percent,

    /// Code of the coupon that was applied
    pub coupon_code: Option<String>,

    /// Tax charged
    pub tax: Amount,

    /// `order_cost − order_cost × discount_percentage / 100 + tax`
    pub final_amount: Amount,
}

impl OrderSnapshot {
    /// Units across every line.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

/// Snapshot `cart` for checkout without modifying it.
///
/// Unit prices are frozen at their current discounted value and the totals are repriced from
/// the frozen lines.
///
/// # Errors
///
/// - [`CheckoutError::EmptyCart`] when the cart has no lines.
/// - [`CheckoutError::Pricing`] if the frozen lines can't be priced.
pub fn materialize(cart: &Cart) -> Result<OrderSnapshot, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let frozen: SmallVec<[LineInput; 8]> = cart
        .priced_lines()
        .map(|(line, product)| {
            Ok::<_, PricingError>(LineInput {
                unit_price: product.discounted_price()?,
                discount: None,
                quantity: line.quantity,
                tax: product.gst().map(Percent::points),
            })
        })
        .collect::<Result<_, _>>()?;

    let coupon = cart.coupon();

    let breakdown = price_lines(
        cart.currency(),
        &frozen,
        coupon.map(|coupon| coupon.percentage().points()),
        cart.tax_policy(),
    )?;

    let lines = cart
        .lines()
        .zip(&breakdown.lines)
        .map(|(line, priced)| OrderLine {
            product: line.product,
            quantity: line.quantity,
            unit_price: priced.discounted_unit_price,
            line_total: priced.line_total,
        })
        .collect();

    Ok(OrderSnapshot {
        customer: cart.customer(),
        lines,
        order_cost: breakdown.subtotal,
        discount_percentage: breakdown.coupon,
        coupon_code: coupon.map(|coupon| coupon.code().to_string()),
        tax: breakdown.tax,
        final_amount: breakdown.final_amount,
    })
}

impl Cart {
    /// Snapshot the cart and clear it.
    ///
    /// # Errors
    ///
    /// Fails as [`materialize`] does, leaving the cart untouched.
    pub fn checkout(&mut self) -> Result<OrderSnapshot, CheckoutError> {
        let snapshot = materialize(self)?;

        self.clear();

        Ok(snapshot)
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    uuid: OrderUuid,
    customer: CustomerUuid,
    lines: Vec<OrderLine>,
    order_cost: Amount,
    discount_percentage: Percent,
    coupon_code: Option<String>,
    tax: Amount,
    final_amount: Amount,
    status: OrderStatus,
    created_at: Timestamp,
}

impl Order {
    /// A pending order from a checkout snapshot.
    pub fn from_snapshot(uuid: OrderUuid, snapshot: OrderSnapshot, created_at: Timestamp) -> Self {
        Self {
            uuid,
            customer: snapshot.customer,
            lines: snapshot.lines,
            order_cost: snapshot.order_cost,
            discount_percentage: snapshot.discount_percentage,
            coupon_code: snapshot.coupon_code,
            tax: snapshot.tax,
            final_amount: snapshot.final_amount,
            status: OrderStatus::Pending,
            created_at,
        }
    }

    /// Move the order to `status`. Setting the current status again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] when the order is already completed or failed.
    pub fn set_status(&mut self, status: OrderStatus) -> Result<(), OrderError> {
        if self.status == status {
            return Ok(());
        }

        if self.status.is_final() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }

        self.status = status;

        Ok(())
    }

    /// Identifier
    pub fn uuid(&self) -> OrderUuid {
        self.uuid
    }

    /// Purchasing customer
    pub fn customer(&self) -> CustomerUuid {
        self.customer
    }

    /// Frozen lines
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Pre-coupon, pre-tax cost
    pub fn order_cost(&self) -> Amount {
        self.order_cost
    }

    /// Coupon percentage at purchase
    pub fn discount_percentage(&self) -> Percent {
        self.discount_percentage
    }

    /// Applied coupon code
    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    /// Tax charged
    pub fn tax(&self) -> Amount {
        self.tax
    }

    /// Amount paid
    pub fn final_amount(&self) -> Amount {
        self.final_amount
    }

    /// Fulfilment status
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Creation time
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Units across every line.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::{Money, iso::INR};
    use testresult::TestResult;

    use crate::{
        coupons::Coupon,
        pricing::TaxPolicy,
        products::{NewProduct, Product, tests::new_product},
    };

    use super::*;

    fn rupees(minor: i64) -> Amount {
        Money::from_minor(minor, INR)
    }

    fn populated_cart() -> TestResult<(Cart, Product)> {
        let product = Product::try_from(NewProduct {
            discount: Some(Decimal::from(10)),
            ..new_product(100_00, 10)
        })?;

        let mut cart = Cart::new(CustomerUuid::new(), INR, TaxPolicy::default());

        cart.add_item(&product, 2)?;
        cart.apply_coupon(Coupon::new("SAVE20", Percent::from_points(20)?), Timestamp::now())?;

        Ok((cart, product))
    }

    #[test]
    fn materialize_freezes_prices_and_totals() -> TestResult {
        let (cart, product) = populated_cart()?;

        let snapshot = materialize(&cart)?;

        assert_eq!(
            snapshot.lines,
            [OrderLine {
                product: product.uuid(),
                quantity: 2,
                unit_price: rupees(90_00),
                line_total: rupees(180_00),
            }]
        );
        assert_eq!(snapshot.order_cost, rupees(180_00));
        assert_eq!(snapshot.discount_percentage, Percent::from_points(20)?);
        assert_eq!(snapshot.coupon_code.as_deref(), Some("SAVE20"));
        assert_eq!(snapshot.tax, rupees(25_92));
        assert_eq!(snapshot.final_amount, rupees(169_92));
        assert_eq!(snapshot.final_amount, cart.final_amount());

        Ok(())
    }

    #[test]
    fn materialize_rejects_empty_cart() {
        let cart = Cart::new(CustomerUuid::new(), INR, TaxPolicy::default());

        assert_eq!(materialize(&cart), Err(CheckoutError::EmptyCart));
    }

    #[test]
    fn checkout_clears_lines_totals_and_coupon() -> TestResult {
        let (mut cart, _) = populated_cart()?;

        let snapshot = cart.checkout()?;

        assert_eq!(snapshot.item_count(), 2);
        assert!(cart.is_empty());
        assert!(cart.coupon().is_none());
        assert_eq!(cart.total_cost(), rupees(0));
        assert_eq!(cart.final_amount(), rupees(0));

        Ok(())
    }

    #[test]
    fn failed_checkout_leaves_cart_alone() {
        let mut cart = Cart::new(CustomerUuid::new(), INR, TaxPolicy::default());
        let before = cart.clone();

        assert_eq!(cart.checkout(), Err(CheckoutError::EmptyCart));
        assert_eq!(cart, before);
    }

    #[test]
    fn later_price_changes_do_not_touch_orders() -> TestResult {
        let (mut cart, product) = populated_cart()?;

        let order = Order::from_snapshot(OrderUuid::new(), cart.checkout()?, Timestamp::now());

        let repriced = product.with_price(rupees(500_00))?;
        cart.add_item(&repriced, 2)?;

        assert_eq!(order.final_amount(), rupees(169_92));
        assert_eq!(order.lines().first().map(|l| l.unit_price), Some(rupees(90_00)));

        Ok(())
    }

    #[test]
    fn new_orders_are_pending() -> TestResult {
        let (mut cart, _) = populated_cart()?;
        let order = Order::from_snapshot(OrderUuid::new(), cart.checkout()?, Timestamp::now());

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.item_count(), 2);

        Ok(())
    }

    #[test]
    fn final_statuses_cannot_change() -> TestResult {
        let (mut cart, _) = populated_cart()?;
        let mut order = Order::from_snapshot(OrderUuid::new(), cart.checkout()?, Timestamp::now());

        order.set_status(OrderStatus::Completed)?;
        order.set_status(OrderStatus::Completed)?;

        assert_eq!(
            order.set_status(OrderStatus::Pending),
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Completed,
                to: OrderStatus::Pending,
            })
        );
        assert_eq!(order.status(), OrderStatus::Completed);

        Ok(())
    }

    #[test]
    fn pending_orders_can_fail() -> TestResult {
        let (mut cart, _) = populated_cart()?;
        let mut order = Order::from_snapshot(OrderUuid::new(), cart.checkout()?, Timestamp::now());

        order.set_status(OrderStatus::Failed)?;

        assert_eq!(order.status(), OrderStatus::Failed);
        assert!(order.set_status(OrderStatus::Completed).is_err());

        Ok(())
    }
}
