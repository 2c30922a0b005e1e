//! Product Fixtures

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, INR, USD},
};
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    products::{CategoryDetails, NewProduct, ProductUuid},
};

/// Product Fixture
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product name
    pub name: String,

    /// Description
    #[serde(default)]
    pub details: String,

    /// Product price (e.g., "1499.00 INR")
    pub price: String,

    /// Product discount (e.g., "10%" or "0.10")
    pub discount: Option<String>,

    /// Category tag
    pub category: String,

    /// GST (e.g., "18%")
    pub gst: Option<String>,

    /// Average rating, 0–5
    pub rating: Option<Decimal>,

    /// Units available
    #[serde(default)]
    pub stock: u32,

    /// Category-specific attributes
    pub attributes: Option<CategoryDetails>,
}

impl TryFrom<ProductFixture> for NewProduct {
    type Error = FixtureError;

    fn try_from(fixture: ProductFixture) -> Result<Self, Self::Error> {
        let (minor_units, currency) = parse_price(&fixture.price)?;

        Ok(NewProduct {
            uuid: ProductUuid::new(),
            name: fixture.name,
            details: fixture.details,
            price: Money::from_minor(minor_units, currency),
            discount: fixture.discount.as_deref().map(parse_percentage).transpose()?,
            category: fixture.category,
            gst: fixture.gst.as_deref().map(parse_percentage).transpose()?,
            rating: fixture.rating,
            stock: fixture.stock,
            attributes: fixture.attributes,
        })
    }
}

/// Parse price string (e.g., "1499.00 INR") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount isn't a decimal, or if the currency code is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    let [amount, currency_code] = parts.as_slice() else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    let currency = parse_currency(currency_code)?;

    let minor_units = amount
        .checked_mul(Decimal::from(10_i64.pow(currency.exponent)))
        .and_then(|value| {
            value
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, currency))
}

/// Look up a supported ISO currency code.
///
/// # Errors
///
/// Returns [`FixtureError::UnknownCurrency`] for anything but INR, GBP, USD or EUR.
pub fn parse_currency(code: &str) -> Result<&'static Currency, FixtureError> {
    match code.trim().to_ascii_uppercase().as_str() {
        "INR" => Ok(INR),
        "GBP" => Ok(GBP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        _ => Err(FixtureError::UnknownCurrency(code.to_string())),
    }
}

/// Parse percentage string (e.g., "15%" or "0.15") into percent points.
///
/// Accepts two formats:
/// - Percentage format: "15%" for 15%
/// - Fraction format: "0.15" for 15%
///
/// Range checks happen when the product is validated.
///
/// # Errors
///
/// Returns an error if the string cannot be parsed.
pub fn parse_percentage(s: &str) -> Result<Decimal, FixtureError> {
    let trimmed = s.trim();

    if let Some(percent_str) = trimmed.strip_suffix('%') {
        return percent_str
            .trim()
            .parse::<Decimal>()
            .map_err(|_err| FixtureError::InvalidPercentage(s.to_string()));
    }

    trimmed
        .parse::<Decimal>()
        .ok()
        .and_then(|fraction| fraction.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| FixtureError::InvalidPercentage(s.to_string()))
}
