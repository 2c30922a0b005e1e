//! Storefront CLI configuration

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use rusty_money::iso::Currency;

use storefront::{
    discounts::{Percent, PercentError},
    fixtures::{FixtureError, parse_currency},
    pricing::TaxPolicy,
};

pub(crate) mod command;
pub(crate) mod logging;

pub(crate) use command::{CartArgs, Command, ItemArg, OrderArg, ProductsArgs, ReportArgs};
pub(crate) use logging::{LogFormat, LoggingConfig};

/// How tax is charged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TaxMode {
    /// One rate for the whole order (`--tax-rate`)
    Flat,

    /// Each product's own GST rate
    PerProduct,
}

/// Storefront CLI configuration
#[derive(Debug, Parser)]
#[command(name = "storefront", about = "Storefront pricing and checkout", long_about = None)]
pub struct StorefrontConfig {
    /// Catalog fixture to load
    #[arg(
        short,
        long,
        env = "STOREFRONT_FIXTURE",
        default_value = "fixtures/catalog.yaml",
        global = true
    )]
    pub fixture: PathBuf,

    /// Currency every price must be in
    #[arg(long, env = "STOREFRONT_CURRENCY", default_value = "INR", global = true)]
    pub currency: String,

    /// Tax policy (flat, per-product)
    #[arg(
        long,
        env = "STOREFRONT_TAX_POLICY",
        value_enum,
        default_value_t = TaxMode::Flat,
        global = true
    )]
    pub tax_policy: TaxMode,

    /// Flat tax rate in percent points
    #[arg(long, env = "STOREFRONT_TAX_RATE", default_value = "18", global = true)]
    pub tax_rate: Decimal,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// What to run.
    #[command(subcommand)]
    pub command: Command,
}

impl StorefrontConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Configured currency.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::UnknownCurrency`] for an unsupported code.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        parse_currency(&self.currency)
    }

    /// Tax policy built from `--tax-policy` and `--tax-rate`.
    ///
    /// # Errors
    ///
    /// Returns a [`PercentError`] if a flat rate is outside 0–100.
    pub fn tax_policy(&self) -> Result<TaxPolicy, PercentError> {
        match self.tax_policy {
            TaxMode::Flat => Ok(TaxPolicy::Flat(Percent::new(self.tax_rate)?)),
            TaxMode::PerProduct => Ok(TaxPolicy::PerProduct),
        }
    }
}
