//! Cart
//!
//! One customer's pending purchase lines. Every mutation reprices the whole cart before it is
//! committed, so the totals always match the lines and a failed mutation leaves the cart as it
//! was.

use std::fmt;

use jiff::Timestamp;
use rusty_money::iso::Currency;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    coupons::Coupon,
    discounts::Percent,
    ids::TypedUuid,
    pricing::{
        Amount, InvalidPricingInput, LineInput, PriceBreakdown, PricingError, TaxPolicy,
        price_lines,
    },
    products::{Product, ProductUuid},
};

/// Customer marker for [`CustomerUuid`].
#[derive(Debug)]
pub struct Customer;

/// Customer UUID
pub type CustomerUuid = TypedUuid<Customer>;

/// Errors related to cart mutations.
#[derive(Debug, Error, PartialEq)]
pub enum CartError {
    /// The coupon is unknown or expired; the cart is unchanged.
    #[error("coupon {0} is invalid or expired")]
    InvalidCoupon(String),

    /// The product doesn't exist in the catalog.
    #[error("product {0} not found")]
    ProductNotFound(ProductUuid),

    /// The product has no line in this cart.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductUuid),

    /// Repricing failed; the cart is unchanged.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// One product and quantity in a customer's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    /// Owning customer
    pub customer: CustomerUuid,

    /// Product in the line
    pub product: ProductUuid,

    /// Units, at least one
    pub quantity: u32,
}

/// A requested quantity was more than the stock on hand and was clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockExceeded {
    /// Product that ran short
    pub product: ProductUuid,

    /// Quantity the customer asked for
    pub requested: u32,

    /// Quantity the line was clamped to
    pub available: u32,
}

impl fmt::Display for StockExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "only {} units available, {} requested",
            self.available, self.requested
        )
    }
}

/// Result of a line mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartChange {
    /// Product touched
    pub product: ProductUuid,

    /// Resulting line quantity; zero when the line no longer exists.
    pub quantity: u32,

    /// Set when the quantity was clamped to stock.
    pub stock_exceeded: Option<StockExceeded>,
}

/// Whether a cart has any lines. Coupon presence is tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartState {
    /// No lines
    Empty,

    /// At least one line
    Populated,
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    line: CartLine,
    product: Product,
}

/// A customer's cart and its derived totals.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    customer: CustomerUuid,
    currency: &'static Currency,
    tax_policy: TaxPolicy,
    entries: Vec<Entry>,
    coupon: Option<Coupon>,
    breakdown: PriceBreakdown,
}

impl Cart {
    /// Empty cart for `customer`.
    pub fn new(customer: CustomerUuid, currency: &'static Currency, tax_policy: TaxPolicy) -> Self {
        Self {
            customer,
            currency,
            tax_policy,
            entries: Vec::new(),
            coupon: None,
            breakdown: PriceBreakdown::empty(currency),
        }
    }

    /// Rebuild a cart from stored quantities and current products.
    ///
    /// Zero quantities are skipped and repeated products are merged. Stored quantities are
    /// kept as they are; stock is only enforced when a line is mutated.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError::Pricing`] if the lines can't be priced.
    pub fn restore(
        customer: CustomerUuid,
        currency: &'static Currency,
        tax_policy: TaxPolicy,
        lines: impl IntoIterator<Item = (Product, u32)>,
        coupon: Option<Coupon>,
    ) -> Result<Self, CartError> {
        let mut cart = Self::new(customer, currency, tax_policy);
        let mut entries: Vec<Entry> = Vec::new();

        for (product, quantity) in lines {
            if quantity == 0 {
                continue;
            }

            if let Some(entry) = entries
                .iter_mut()
                .find(|entry| entry.line.product == product.uuid())
            {
                entry.line.quantity = entry.line.quantity.saturating_add(quantity);
                continue;
            }

            entries.push(Entry {
                line: CartLine {
                    customer,
                    product: product.uuid(),
                    quantity,
                },
                product,
            });
        }

        cart.commit(entries, coupon)?;

        Ok(cart)
    }

    /// Add `quantity` units of `product`, merging with any existing line and clamping to stock.
    ///
    /// If no stock is available the line is dropped and the change reports a quantity of zero.
    ///
    /// # Errors
    ///
    /// - [`CartError::Pricing`] with [`InvalidPricingInput::ZeroQuantity`] for a zero quantity.
    /// - [`CartError::Pricing`] if the product can't be priced in the cart's currency.
    pub fn add_item(&mut self, product: &Product, quantity: u32) -> Result<CartChange, CartError> {
        if quantity == 0 {
            return Err(PricingError::from(InvalidPricingInput::ZeroQuantity).into());
        }

        let current = self
            .entry(product.uuid())
            .map_or(0, |entry| entry.line.quantity);

        let requested = current.saturating_add(quantity);

        self.set_line(product.clone(), requested)
    }

    /// Set a line's quantity. Anything below one removes the line.
    ///
    /// # Errors
    ///
    /// - [`CartError::NotInCart`] when setting a positive quantity on a missing line.
    /// - [`CartError::Pricing`] if the cart can't be repriced.
    pub fn update_quantity(
        &mut self,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<CartChange, CartError> {
        if quantity == 0 {
            self.remove_item(product)?;

            return Ok(CartChange {
                product,
                quantity: 0,
                stock_exceeded: None,
            });
        }

        let current = self
            .entry(product)
            .map(|entry| entry.product.clone())
            .ok_or(CartError::NotInCart(product))?;

        self.set_line(current, quantity)
    }

    /// Remove a line. Removing a product that isn't in the cart is a no-op.
    ///
    /// Returns whether a line was removed.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError::Pricing`] if the remaining lines can't be repriced.
    pub fn remove_item(&mut self, product: ProductUuid) -> Result<bool, CartError> {
        if self.entry(product).is_none() {
            return Ok(false);
        }

        let entries = self
            .entries
            .iter()
            .filter(|entry| entry.line.product != product)
            .cloned()
            .collect();

        self.commit(entries, self.coupon.clone())?;

        debug!(%product, "removed cart line");

        Ok(true)
    }

    /// Apply `coupon` if it is still valid at `now`, replacing any coupon already applied.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidCoupon`] for an expired coupon; the cart is unchanged.
    pub fn apply_coupon(&mut self, coupon: Coupon, now: Timestamp) -> Result<(), CartError> {
        if !coupon.is_valid_at(now) {
            return Err(CartError::InvalidCoupon(coupon.code().to_string()));
        }

        let code = coupon.code().to_string();
        let percentage = coupon.percentage();

        self.commit(self.entries.clone(), Some(coupon))?;

        info!(customer = %self.customer, %code, %percentage, "applied coupon");

        Ok(())
    }

    /// Detach the applied coupon, returning it.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError::Pricing`] if the cart can't be repriced.
    pub fn remove_coupon(&mut self) -> Result<Option<Coupon>, CartError> {
        let Some(coupon) = self.coupon.clone() else {
            return Ok(None);
        };

        self.commit(self.entries.clone(), None)?;

        info!(customer = %self.customer, code = coupon.code(), "removed coupon");

        Ok(Some(coupon))
    }

    /// Drop every line and the coupon.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.coupon = None;
        self.breakdown = PriceBreakdown::empty(self.currency);
    }

    /// Owning customer
    pub fn customer(&self) -> CustomerUuid {
        self.customer
    }

    /// Cart currency
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Tax policy used for totals
    pub fn tax_policy(&self) -> TaxPolicy {
        self.tax_policy
    }

    /// Lines in the order they were first added.
    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.entries.iter().map(|entry| &entry.line)
    }

    /// Lines paired with the product each was priced from.
    pub fn priced_lines(&self) -> impl Iterator<Item = (&CartLine, &Product)> {
        self.entries.iter().map(|entry| (&entry.line, &entry.product))
    }

    /// Quantity of `product` in the cart, zero if absent.
    pub fn quantity_of(&self, product: ProductUuid) -> u32 {
        self.entry(product).map_or(0, |entry| entry.line.quantity)
    }

    /// Applied coupon
    pub fn coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    /// Current price breakdown.
    pub fn breakdown(&self) -> &PriceBreakdown {
        &self.breakdown
    }

    /// Units across all lines.
    pub fn total_item_count(&self) -> u64 {
        self.breakdown.item_count()
    }

    /// Sum of discounted line totals, before coupon and tax.
    pub fn total_cost(&self) -> Amount {
        self.breakdown.subtotal
    }

    /// Amount payable after coupon and tax.
    pub fn final_amount(&self) -> Amount {
        self.breakdown.final_amount
    }

    /// Empty or populated
    pub fn state(&self) -> CartState {
        if self.entries.is_empty() {
            CartState::Empty
        } else {
            CartState::Populated
        }
    }

    /// Whether there are no lines.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, product: ProductUuid) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.line.product == product)
    }

    fn set_line(&mut self, product: Product, requested: u32) -> Result<CartChange, CartError> {
        let uuid = product.uuid();
        let available = product.stock();
        let quantity = requested.min(available);

        let stock_exceeded = (requested > available).then_some(StockExceeded {
            product: uuid,
            requested,
            available,
        });

        let mut entries = self.entries.clone();
        let position = entries.iter().position(|entry| entry.line.product == uuid);

        match (position, quantity) {
            (Some(idx), 0) => {
                entries.remove(idx);
            }
            (Some(idx), _) => {
                if let Some(entry) = entries.get_mut(idx) {
                    entry.line.quantity = quantity;
                    entry.product = product;
                }
            }
            (None, 0) => {}
            (None, _) => entries.push(Entry {
                line: CartLine {
                    customer: self.customer,
                    product: uuid,
                    quantity,
                },
                product,
            }),
        }

        self.commit(entries, self.coupon.clone())?;

        if let Some(exceeded) = stock_exceeded {
            warn!(
                customer = %self.customer,
                product = %uuid,
                requested = exceeded.requested,
                available = exceeded.available,
                "quantity clamped to available stock"
            );
        }

        Ok(CartChange {
            product: uuid,
            quantity,
            stock_exceeded,
        })
    }

    fn commit(&mut self, entries: Vec<Entry>, coupon: Option<Coupon>) -> Result<(), CartError> {
        let inputs: SmallVec<[LineInput; 8]> = entries
            .iter()
            .map(|entry| entry.product.line_input(entry.line.quantity))
            .collect();

        let breakdown = price_lines(
            self.currency,
            &inputs,
            coupon.as_ref().map(|coupon| coupon.percentage().points()),
            self.tax_policy,
        )?;

        debug!(
            customer = %self.customer,
            items = breakdown.item_count(),
            total_cost = %breakdown.subtotal,
            final_amount = %breakdown.final_amount,
            "recomputed cart totals"
        );

        self.entries = entries;
        self.coupon = coupon;
        self.breakdown = breakdown;

        Ok(())
    }
}

/// Coupon percentage applied to a cart, zero when none is.
pub fn coupon_percentage(cart: &Cart) -> Percent {
    cart.coupon().map_or(Percent::ZERO, Coupon::percentage)
}
