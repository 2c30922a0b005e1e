//! Pricing
//!
//! Turns unit prices, discounts, a coupon and tax into a [`PriceBreakdown`]. Every amount is
//! rounded to a whole minor unit (2 decimal places for the supported currencies) as soon as
//! it is computed, so totals don't depend on accumulation order.

use std::fmt;

use rust_decimal::Decimal;
use rusty_money::{Money, MoneyError, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::discounts::{Percent, percent_of_minor, percent_off_minor};

/// Monetary amount in a fixed ISO currency.
pub type Amount = Money<'static, Currency>;

/// Which percentage input was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentKind {
    /// Product discount
    Discount,

    /// Coupon
    Coupon,

    /// Tax / GST
    Tax,
}

impl fmt::Display for PercentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PercentKind::Discount => "discount",
            PercentKind::Coupon => "coupon",
            PercentKind::Tax => "tax",
        })
    }
}

/// Numeric input the calculator refuses to price.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidPricingInput {
    /// Unit prices can't be negative.
    #[error("unit price must not be negative, got {0} minor units")]
    NegativePrice(i64),

    /// Quantities start at one.
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    /// A percentage fell outside 0–100.
    #[error("{0} percentage must be between 0 and 100, got {1}")]
    PercentageOutOfRange(PercentKind, Decimal),
}

/// Errors that can occur while pricing.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// Rejected input; nothing was computed.
    #[error(transparent)]
    InvalidInput(#[from] InvalidPricingInput),

    /// An intermediate amount didn't fit in minor units.
    #[error("amount overflowed while pricing")]
    Overflow,

    /// Lines priced in different currencies.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// How tax is charged on the post-coupon amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxPolicy {
    /// One rate for the whole order.
    Flat(Percent),

    /// Each line is taxed at its own product's GST rate on its share of the post-coupon base.
    PerProduct,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self::Flat(Percent::saturating_points(18))
    }
}

/// One line to be priced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineInput {
    /// Undiscounted unit price.
    pub unit_price: Amount,

    /// Product discount in percent points; `None` means no discount.
    pub discount: Option<Decimal>,

    /// Units purchased.
    pub quantity: u32,

    /// The product's own GST rate, used by [`TaxPolicy::PerProduct`].
    pub tax: Option<Decimal>,
}

/// A priced line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePrice {
    /// Unit price after the product discount.
    pub discounted_unit_price: Amount,

    /// Units purchased.
    pub quantity: u32,

    /// `discounted_unit_price × quantity`
    pub line_total: Amount,
}

/// Every stage of an order's price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBreakdown {
    /// Priced lines, in input order.
    pub lines: SmallVec<[LinePrice; 8]>,

    /// Sum of the line totals.
    pub subtotal: Amount,

    /// Coupon percentage that was applied.
    pub coupon: Percent,

    /// `subtotal × coupon`
    pub coupon_discount: Amount,

    /// `subtotal − coupon_discount`
    pub taxable_base: Amount,

    /// Tax charged on the taxable base.
    pub tax: Amount,

    /// `taxable_base + tax`
    pub final_amount: Amount,
}

impl PriceBreakdown {
    /// Breakdown with no lines.
    pub fn empty(currency: &'static Currency) -> Self {
        let zero = Money::from_minor(0, currency);

        Self {
            lines: SmallVec::new(),
            subtotal: zero,
            coupon: Percent::ZERO,
            coupon_discount: zero,
            taxable_base: zero,
            tax: zero,
            final_amount: zero,
        }
    }

    /// Total units across every line.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

/// Price a single product line with an optional coupon and a flat tax rate.
///
/// # Errors
///
/// Returns [`PricingError::InvalidInput`] for a negative price, a zero quantity or a
/// percentage outside 0–100.
pub fn calculate(
    unit_price: Amount,
    discount: Option<Decimal>,
    quantity: u32,
    coupon: Option<Decimal>,
    tax: Option<Decimal>,
) -> Result<PriceBreakdown, PricingError> {
    let tax = percent(tax, PercentKind::Tax)?;

    price_lines(
        unit_price.currency(),
        &[LineInput {
            unit_price,
            discount,
            quantity,
            tax: None,
        }],
        coupon,
        TaxPolicy::Flat(tax),
    )
}

/// Price a set of lines in `currency`.
///
/// An empty slice prices to zero everywhere.
///
/// # Errors
///
/// - [`PricingError::InvalidInput`]: any line or the coupon is invalid; nothing is computed.
/// - [`PricingError::Money`]: a line is priced in a different currency.
/// - [`PricingError::Overflow`]: an amount exceeds the minor-unit range.
pub fn price_lines(
    currency: &'static Currency,
    lines: &[LineInput],
    coupon: Option<Decimal>,
    tax_policy: TaxPolicy,
) -> Result<PriceBreakdown, PricingError> {
    let coupon = percent(coupon, PercentKind::Coupon)?;

    // Validate everything up front so a bad line never yields a partial breakdown.
    let validated = lines
        .iter()
        .map(validate_line)
        .collect::<Result<SmallVec<[ValidLine; 8]>, PricingError>>()?;

    let mut priced: SmallVec<[LinePrice; 8]> = SmallVec::with_capacity(validated.len());
    let mut subtotal = Money::from_minor(0, currency);

    for line in &validated {
        let price = price_line(line)?;

        subtotal = subtotal.add(price.line_total)?;
        priced.push(price);
    }

    let coupon_minor = share_of(coupon, subtotal.to_minor_units())?;
    let coupon_discount = Money::from_minor(coupon_minor, currency);
    let taxable_base = subtotal.sub(coupon_discount)?;

    let tax_minor = match tax_policy {
        TaxPolicy::Flat(rate) => share_of(rate, taxable_base.to_minor_units())?,
        TaxPolicy::PerProduct => validated
            .iter()
            .zip(&priced)
            .try_fold(0_i64, |acc, (line, price)| {
                let base = remainder_of(coupon, price.line_total.to_minor_units())?;
                let line_tax = share_of(line.tax, base)?;

                acc.checked_add(line_tax).ok_or(PricingError::Overflow)
            })?,
    };

    let tax = Money::from_minor(tax_minor, currency);
    let final_amount = taxable_base.add(tax)?;

    Ok(PriceBreakdown {
        lines: priced,
        subtotal,
        coupon,
        coupon_discount,
        taxable_base,
        tax,
        final_amount,
    })
}

/// Unit price after `discount`, rounded to a minor unit.
///
/// # Errors
///
/// Returns [`PricingError::InvalidInput`] for a negative price or out-of-range discount.
pub fn discounted_unit_price(
    unit_price: Amount,
    discount: Option<Decimal>,
) -> Result<Amount, PricingError> {
    let minor = non_negative(unit_price)?;
    let discount = percent(discount, PercentKind::Discount)?;

    Ok(Money::from_minor(
        remainder_of(discount, minor)?,
        unit_price.currency(),
    ))
}

#[derive(Debug, Clone, Copy)]
struct ValidLine {
    unit_price: Amount,
    discount: Percent,
    quantity: u32,
    tax: Percent,
}

fn validate_line(line: &LineInput) -> Result<ValidLine, PricingError> {
    non_negative(line.unit_price)?;

    if line.quantity == 0 {
        return Err(InvalidPricingInput::ZeroQuantity.into());
    }

    Ok(ValidLine {
        unit_price: line.unit_price,
        discount: percent(line.discount, PercentKind::Discount)?,
        quantity: line.quantity,
        tax: percent(line.tax, PercentKind::Tax)?,
    })
}

fn price_line(line: &ValidLine) -> Result<LinePrice, PricingError> {
    let currency = line.unit_price.currency();
    let unit_minor = remainder_of(line.discount, line.unit_price.to_minor_units())?;

    let total_minor = unit_minor
        .checked_mul(i64::from(line.quantity))
        .ok_or(PricingError::Overflow)?;

    Ok(LinePrice {
        discounted_unit_price: Money::from_minor(unit_minor, currency),
        quantity: line.quantity,
        line_total: Money::from_minor(total_minor, currency),
    })
}

fn share_of(percent: Percent, minor: i64) -> Result<i64, PricingError> {
    percent_of_minor(percent, minor).map_err(|_err| PricingError::Overflow)
}

fn remainder_of(percent: Percent, minor: i64) -> Result<i64, PricingError> {
    percent_off_minor(percent, minor).map_err(|_err| PricingError::Overflow)
}

fn non_negative(amount: Amount) -> Result<i64, PricingError> {
    let minor = amount.to_minor_units();

    if minor < 0 {
        return Err(InvalidPricingInput::NegativePrice(minor).into());
    }

    Ok(minor)
}

fn percent(value: Option<Decimal>, kind: PercentKind) -> Result<Percent, PricingError> {
    let Some(points) = value else {
        return Ok(Percent::ZERO);
    };

    Percent::new(points)
        .map_err(|_err| InvalidPricingInput::PercentageOutOfRange(kind, points).into())
}
