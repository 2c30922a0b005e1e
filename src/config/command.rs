//! Subcommands

use std::str::FromStr;

use clap::{Args, Subcommand};
use jiff::civil::Date;
use rust_decimal::Decimal;

use storefront::catalog::SortOrder;

/// What to do with the loaded catalog.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Price a cart without placing an order
    Quote(CartArgs),

    /// Fill a cart, apply a coupon and place an order
    Checkout {
        /// Cart contents and coupon.
        #[command(flatten)]
        cart: CartArgs,

        /// Mark the new order as completed
        #[arg(long)]
        complete: bool,
    },

    /// List products matching a filter
    Products(ProductsArgs),

    /// Catalog and sales analytics
    Report(ReportArgs),
}

/// Analytics options.
#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Products per ranking
    #[arg(long, default_value_t = 5)]
    pub limit: usize,

    /// List electronics manufactured before this date
    #[arg(long, default_value = "2024-01-01")]
    pub made_before: Date,

    /// Place an order for the sales reports, as `handle[:quantity],...[@coupon]`; repeatable
    #[arg(long = "order")]
    pub orders: Vec<OrderArg>,
}

/// Cart contents given on the command line.
#[derive(Debug, Args)]
pub struct CartArgs {
    /// Items as `handle` or `handle:quantity`
    #[arg(required = true)]
    pub items: Vec<ItemArg>,

    /// Coupon code to apply
    #[arg(short, long)]
    pub coupon: Option<String>,
}

/// Product listing filters.
#[derive(Debug, Args)]
pub struct ProductsArgs {
    /// Only this category
    #[arg(long)]
    pub category: Option<String>,

    /// Substring of the name or description
    #[arg(short, long)]
    pub search: Option<String>,

    /// Lowest discounted price, in major units
    #[arg(long)]
    pub min_price: Option<Decimal>,

    /// Highest discounted price, in major units
    #[arg(long)]
    pub max_price: Option<Decimal>,

    /// Lowest rating
    #[arg(long)]
    pub min_rating: Option<Decimal>,

    /// Listing order
    #[arg(long, value_enum, default_value_t = SortOrder::Featured)]
    pub sort: SortOrder,
}

/// One `handle[:quantity]` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemArg {
    /// Fixture handle
    pub handle: String,

    /// Units to add, 1 when omitted
    pub quantity: u32,
}

impl FromStr for ItemArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (handle, quantity) = match s.split_once(':') {
            Some((handle, quantity)) => {
                let quantity = quantity
                    .trim()
                    .parse::<u32>()
                    .map_err(|err| format!("invalid quantity in {s:?}: {err}"))?;

                (handle, quantity)
            }
            None => (s, 1),
        };

        let handle = handle.trim();

        if handle.is_empty() {
            return Err(format!("missing product handle in {s:?}"));
        }

        Ok(Self {
            handle: handle.to_string(),
            quantity,
        })
    }
}

/// One `--order` argument: comma-separated items and an optional `@coupon`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderArg {
    /// Items to add
    pub items: Vec<ItemArg>,

    /// Coupon code to apply
    pub coupon: Option<String>,
}

impl FromStr for OrderArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (items, coupon) = match s.split_once('@') {
            Some((items, coupon)) => (items, Some(coupon.trim().to_string())),
            None => (s, None),
        };

        let items = items
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<ItemArg>, _>>()?;

        Ok(Self { items, coupon })
    }
}
