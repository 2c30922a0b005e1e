//! Storefront CLI
//!
//! Prices carts, places orders and lists products from a YAML catalog fixture.

use std::{
    io::{self, Write},
    process::ExitCode,
};

use clap::error::ErrorKind;
use jiff::Timestamp;
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;
use tracing::{error, info};

use storefront::{
    analytics,
    cart::{Cart, CartError, CustomerUuid},
    catalog::ProductFilter,
    coupons::normalize_code,
    discounts::PercentError,
    fixtures::{Fixture, FixtureError},
    orders::OrderStatus,
    pricing::TaxPolicy,
    receipt::{self, ReceiptError},
    service::{CartsService, CheckoutService, ShopError, Storefront},
    store::InMemoryStore,
};

use crate::config::{
    CartArgs, Command, ItemArg, OrderArg, ProductsArgs, ReportArgs, StorefrontConfig,
};

mod config;
mod observability;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error("invalid tax rate: {0}")]
    TaxRate(#[from] PercentError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Shop(#[from] ShopError),

    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    #[error("failed to total sales: {0}")]
    Money(#[from] MoneyError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Storefront CLI entry point
#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration from .env and CLI arguments
    let config = match StorefrontConfig::load() {
        Ok(config) => config,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            #[expect(
                clippy::print_stderr,
                reason = "logging not initialized yet, must use eprintln for config errors"
            )]
            {
                eprintln!("Configuration error: {err}");
            }

            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = observability::init(&config.logging) {
        #[expect(
            clippy::print_stderr,
            reason = "logging failed to initialize, eprintln is all that's left"
        )]
        {
            eprintln!("{err}");
        }

        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "storefront command failed");

            #[expect(clippy::print_stderr, reason = "user-facing error summary")]
            {
                eprintln!("Error: {err}");
            }

            ExitCode::FAILURE
        }
    }
}

async fn run(config: StorefrontConfig) -> Result<(), CliError> {
    let fixture = Fixture::from_path(&config.fixture)?;
    let currency = config.currency()?;
    let tax_policy = config.tax_policy()?;

    if fixture.currency()? != currency {
        return Err(FixtureError::CurrencyMismatch(
            currency.iso_alpha_code.to_string(),
            fixture.currency()?.iso_alpha_code.to_string(),
        )
        .into());
    }

    info!(
        fixture = %config.fixture.display(),
        products = fixture.catalog().len(),
        coupons = fixture.coupons().len(),
        "catalog loaded"
    );

    match config.command {
        Command::Quote(cart) => quote(&fixture, currency, tax_policy, &cart),
        Command::Checkout { cart, complete } => {
            checkout(&fixture, currency, tax_policy, cart, complete).await
        }
        Command::Products(args) => products(&fixture, currency, &args),
        Command::Report(args) => report(&fixture, currency, tax_policy, &args).await,
    }
}

fn quote(
    fixture: &Fixture,
    currency: &'static Currency,
    tax_policy: TaxPolicy,
    args: &CartArgs,
) -> Result<(), CliError> {
    let mut cart = Cart::new(CustomerUuid::new(), currency, tax_policy);

    for item in &args.items {
        cart.add_item(fixture.product(&item.handle)?, item.quantity)?;
    }

    if let Some(code) = &args.coupon {
        let normalized = normalize_code(code);

        let coupon = fixture
            .coupons()
            .iter()
            .find(|coupon| coupon.code() == normalized)
            .cloned()
            .ok_or_else(|| CartError::InvalidCoupon(code.clone()))?;

        cart.apply_coupon(coupon, Timestamp::now())?;
    }

    receipt::write_breakdown(io::stdout().lock(), &cart)?;

    Ok(())
}

async fn checkout(
    fixture: &Fixture,
    currency: &'static Currency,
    tax_policy: TaxPolicy,
    args: CartArgs,
    complete: bool,
) -> Result<(), CliError> {
    let shop = Storefront::new(fixture.store()?, currency, tax_policy);
    let customer = CustomerUuid::new();

    fill_cart(&shop, fixture, customer, &args.items, args.coupon).await?;

    let mut order = shop.checkout(customer).await?;

    if complete {
        order = shop.set_order_status(order.uuid(), OrderStatus::Completed).await?;
    }

    receipt::write_order(io::stdout().lock(), &order, fixture.catalog())?;

    Ok(())
}

async fn fill_cart(
    shop: &Storefront<InMemoryStore>,
    fixture: &Fixture,
    customer: CustomerUuid,
    items: &[ItemArg],
    coupon: Option<String>,
) -> Result<(), CliError> {
    for item in items {
        let product = fixture.product(&item.handle)?;

        shop.add_item(customer, product.uuid(), item.quantity).await?;
    }

    if let Some(code) = coupon {
        shop.apply_coupon(customer, code).await?;
    }

    Ok(())
}

fn products(
    fixture: &Fixture,
    currency: &'static Currency,
    args: &ProductsArgs,
) -> Result<(), CliError> {
    let filter = ProductFilter {
        category: args.category.clone(),
        search: args.search.clone(),
        min_price: args.min_price.map(|price| Money::from_decimal(price, currency)),
        max_price: args.max_price.map(|price| Money::from_decimal(price, currency)),
        min_rating: args.min_rating,
    };

    let listed = fixture.catalog().search(&filter, args.sort);

    receipt::write_products(io::stdout().lock(), "Products", &listed)?;

    Ok(())
}

async fn report(
    fixture: &Fixture,
    currency: &'static Currency,
    tax_policy: TaxPolicy,
    args: &ReportArgs,
) -> Result<(), CliError> {
    let shop = Storefront::new(fixture.store()?, currency, tax_policy);
    let mut carts = Vec::with_capacity(args.orders.len());
    let mut orders = Vec::with_capacity(args.orders.len());

    for OrderArg { items, coupon } in &args.orders {
        let customer = CustomerUuid::new();

        fill_cart(&shop, fixture, customer, items, coupon.clone()).await?;

        carts.push(shop.get_cart(customer).await?);
        orders.push(shop.checkout(customer).await?);
    }

    let catalog = fixture.catalog();
    let mut out = io::stdout().lock();
    let limit = args.limit;

    receipt::write_products(&mut out, "Top rated", &catalog.top_rated(limit))?;
    receipt::write_products(
        &mut out,
        "Most expensive",
        &analytics::most_expensive(catalog, limit),
    )?;
    receipt::write_products(&mut out, "Out of stock", &analytics::out_of_stock(catalog))?;
    receipt::write_products(
        &mut out,
        &format!("Electronics made before {}", args.made_before),
        &analytics::electronics_made_before(catalog, args.made_before),
    )?;
    receipt::write_category_ratings(&mut out, &analytics::category_ratings(catalog))?;

    if !orders.is_empty() {
        receipt::write_cart_summaries(&mut out, &analytics::cart_summaries(&carts))?;
        receipt::write_category_sales(&mut out, &analytics::sales_by_category(&orders, catalog)?)?;
        receipt::write_high_value_customers(
            &mut out,
            &analytics::customers_above_average(&orders),
        )?;
    }

    out.flush()?;

    Ok(())
}
