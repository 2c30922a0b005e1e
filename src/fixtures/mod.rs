//! Fixtures
//!
//! YAML catalog and coupon definitions for demos and tests.

use std::{collections::BTreeMap, fs, path::Path};

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    catalog::Catalog,
    coupons::Coupon,
    discounts::{Percent, PercentError},
    products::{NewProduct, Product, ProductError, ProductUuid},
    store::InMemoryStore,
};

pub mod products;

pub use products::{parse_currency, parse_percentage, parse_price};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Product failed validation
    #[error("Invalid product {handle}: {source}")]
    InvalidProduct {
        /// Fixture handle
        handle: String,

        /// Validation failure
        source: ProductError,
    },

    /// Coupon percentage outside 0–100
    #[error("Invalid coupon {code}: {source}")]
    InvalidCoupon {
        /// Coupon code
        code: String,

        /// Validation failure
        source: PercentError,
    },

    /// Product not found
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Currency mismatch between products
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// No products loaded yet
    #[error("No products loaded; currency unknown")]
    NoCurrency,
}

#[derive(Debug, Deserialize)]
struct CatalogFixture {
    #[serde(default)]
    products: BTreeMap<String, products::ProductFixture>,

    #[serde(default)]
    coupons: BTreeMap<String, CouponFixture>,
}

#[derive(Debug, Deserialize)]
struct CouponFixture {
    percentage: String,
    expires_at: Option<Timestamp>,
}

/// A loaded catalog fixture: products by handle plus coupons.
#[derive(Debug, Clone, Default)]
pub struct Fixture {
    catalog: Catalog,
    handles: FxHashMap<String, ProductUuid>,
    coupons: Vec<Coupon>,
    currency: Option<&'static Currency>,
}

impl Fixture {
    /// Load a fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or its contents are invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Parse fixture YAML.
    ///
    /// Products are kept in handle order. Every product must share one currency.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML, a price, a percentage or a product is invalid, or if the
    /// products mix currencies.
    pub fn from_yaml(contents: &str) -> Result<Self, FixtureError> {
        let fixture: CatalogFixture = serde_norway::from_str(contents)?;
        let mut loaded = Fixture::default();

        for (handle, product_fixture) in fixture.products {
            let new_product = NewProduct::try_from(product_fixture)?;
            let currency = new_product.price.currency();

            match loaded.currency {
                Some(existing) if existing != currency => {
                    return Err(FixtureError::CurrencyMismatch(
                        existing.iso_alpha_code.to_string(),
                        currency.iso_alpha_code.to_string(),
                    ));
                }
                Some(_) => {}
                None => loaded.currency = Some(currency),
            }

            let product = Product::try_from(new_product).map_err(|source| {
                FixtureError::InvalidProduct {
                    handle: handle.clone(),
                    source,
                }
            })?;

            loaded.handles.insert(handle, product.uuid());
            loaded.catalog.insert(product);
        }

        for (code, coupon_fixture) in fixture.coupons {
            let points = parse_percentage(&coupon_fixture.percentage)?;
            let percentage = Percent::new(points).map_err(|source| FixtureError::InvalidCoupon {
                code: code.clone(),
                source,
            })?;

            let coupon = Coupon::new(&code, percentage);

            loaded.coupons.push(match coupon_fixture.expires_at {
                Some(expires_at) => coupon.expiring_at(expires_at),
                None => coupon,
            });
        }

        Ok(loaded)
    }

    /// Loaded products.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Look up a product by fixture handle.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::ProductNotFound`] for an unknown handle.
    pub fn product(&self, handle: &str) -> Result<&Product, FixtureError> {
        self.handles
            .get(handle)
            .and_then(|&uuid| self.catalog.get(uuid))
            .ok_or_else(|| FixtureError::ProductNotFound(handle.to_string()))
    }

    /// Loaded coupons.
    pub fn coupons(&self) -> &[Coupon] {
        &self.coupons
    }

    /// Currency shared by every product.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NoCurrency`] when the fixture has no products.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        self.currency.ok_or(FixtureError::NoCurrency)
    }

    /// An in-memory store seeded with the fixture's products and coupons.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NoCurrency`] when the fixture has no products.
    pub fn store(&self) -> Result<InMemoryStore, FixtureError> {
        Ok(InMemoryStore::new(
            self.currency()?,
            self.catalog.iter().cloned(),
            self.coupons.iter().cloned(),
        ))
    }
}
