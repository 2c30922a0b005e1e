//! Receipt
//!
//! Terminal rendering of cart breakdowns and placed orders: a table of lines followed by a
//! right-aligned summary of subtotal, coupon, tax and total. Product listings and the analytics
//! reports reuse the same table style.

use std::io;

use rusty_money::MoneyError;
use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    analytics::{CartSummary, CategoryRating, CategorySales, HighValueCustomer},
    cart::Cart,
    catalog::Catalog,
    discounts::Percent,
    orders::Order,
    pricing::Amount,
    products::{Product, ProductUuid},
};

/// Errors that can occur when rendering a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// An order line refers to a product the catalog doesn't have.
    #[error("missing product {0}")]
    MissingProduct(ProductUuid),

    /// Wrapper for money errors.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// IO error
    #[error("IO error")]
    IO,
}

/// Render a cart's lines and totals.
///
/// # Errors
///
/// Returns [`ReceiptError::IO`] if `out` can't be written.
pub fn write_breakdown(mut out: impl io::Write, cart: &Cart) -> Result<(), ReceiptError> {
    let breakdown = cart.breakdown();
    let mut builder = Builder::default();

    builder.push_record(["", "Item", "Qty", "Unit Price", "Discounted", "Line Total"]);

    for (idx, ((_, product), priced)) in cart.priced_lines().zip(&breakdown.lines).enumerate() {
        let discount = product
            .discount()
            .filter(|discount| !discount.is_zero())
            .map(|discount| format!("{} (-{discount})", priced.discounted_unit_price))
            .unwrap_or_default();

        builder.push_record([
            format!("#{:<3}", idx + 1),
            product.name().to_string(),
            priced.quantity.to_string(),
            product.price().to_string(),
            discount,
            priced.line_total.to_string(),
        ]);
    }

    write_table(&mut out, builder, 2..6)?;

    let coupon_label = cart.coupon().map(|coupon| coupon.code().to_string());

    write_summary(
        &mut out,
        &Summary {
            subtotal: breakdown.subtotal,
            coupon_label,
            coupon: breakdown.coupon,
            coupon_discount: breakdown.coupon_discount,
            tax: breakdown.tax,
            total: breakdown.final_amount,
        },
    )
}

/// Render a placed order, naming products from `catalog`.
///
/// # Errors
///
/// - [`ReceiptError::MissingProduct`] if a line's product isn't in `catalog`.
/// - [`ReceiptError::IO`] if `out` can't be written.
pub fn write_order(
    mut out: impl io::Write,
    order: &Order,
    catalog: &Catalog,
) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();

    builder.push_record(["", "Item", "Qty", "Unit Price", "Line Total"]);

    for (idx, line) in order.lines().iter().enumerate() {
        let product = catalog
            .get(line.product)
            .ok_or(ReceiptError::MissingProduct(line.product))?;

        builder.push_record([
            format!("#{:<3}", idx + 1),
            product.name().to_string(),
            line.quantity.to_string(),
            line.unit_price.to_string(),
            line.line_total.to_string(),
        ]);
    }

    writeln!(
        out,
        "\nOrder {} ({}, placed {})",
        order.uuid(),
        order.status(),
        order.created_at()
    )
    .map_err(|_err| ReceiptError::IO)?;

    write_table(&mut out, builder, 2..5)?;

    write_summary(
        &mut out,
        &Summary {
            subtotal: order.order_cost(),
            coupon_label: order.coupon_code().map(str::to_string),
            coupon: order.discount_percentage(),
            coupon_discount: coupon_amount(order)?,
            tax: order.tax(),
            total: order.final_amount(),
        },
    )
}

/// Render a titled product listing with discounted prices, rating and stock.
///
/// # Errors
///
/// Returns [`ReceiptError::IO`] if `out` can't be written.
pub fn write_products(
    mut out: impl io::Write,
    title: &str,
    products: &[&Product],
) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();

    builder.push_record(["", "Item", "Category", "Price", "Rating", "Stock"]);

    for (idx, product) in products.iter().enumerate() {
        let price = product.discounted_price().unwrap_or(product.price());

        builder.push_record([
            format!("#{:<3}", idx + 1),
            product.name().to_string(),
            product.category().to_string(),
            price.to_string(),
            product.rating().map(|rating| rating.to_string()).unwrap_or_default(),
            product.stock().to_string(),
        ]);
    }

    write_titled_table(&mut out, title, products.is_empty(), builder, 3..6)
}

/// Render average ratings per category.
///
/// # Errors
///
/// Returns [`ReceiptError::IO`] if `out` can't be written.
pub fn write_category_ratings(
    mut out: impl io::Write,
    ratings: &[CategoryRating],
) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();

    builder.push_record(["Category", "Average", "Rated"]);

    for rating in ratings {
        builder.push_record([
            rating.category.clone(),
            rating.average.to_string(),
            rating.rated.to_string(),
        ]);
    }

    write_titled_table(&mut out, "Category ratings", ratings.is_empty(), builder, 1..3)
}

/// Render units sold and revenue per category.
///
/// # Errors
///
/// Returns [`ReceiptError::IO`] if `out` can't be written.
pub fn write_category_sales(
    mut out: impl io::Write,
    sales: &[CategorySales],
) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();

    builder.push_record(["Category", "Units", "Revenue"]);

    for entry in sales {
        builder.push_record([
            entry.category.clone(),
            entry.quantity.to_string(),
            entry.revenue.to_string(),
        ]);
    }

    write_titled_table(&mut out, "Sales by category", sales.is_empty(), builder, 1..3)
}

/// Render customers whose orders beat the average order cost.
///
/// # Errors
///
/// Returns [`ReceiptError::IO`] if `out` can't be written.
pub fn write_high_value_customers(
    mut out: impl io::Write,
    customers: &[HighValueCustomer],
) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();

    builder.push_record(["Customer", "Orders", "Largest Order"]);

    for customer in customers {
        builder.push_record([
            customer.customer.to_string(),
            customer.orders.to_string(),
            customer.order_cost.to_string(),
        ]);
    }

    write_titled_table(
        &mut out,
        "Above-average customers",
        customers.is_empty(),
        builder,
        1..3,
    )
}

/// Render item count, total and coupon percentage per cart.
///
/// # Errors
///
/// Returns [`ReceiptError::IO`] if `out` can't be written.
pub fn write_cart_summaries(
    mut out: impl io::Write,
    summaries: &[CartSummary],
) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();

    builder.push_record(["Customer", "Items", "Total", "Coupon"]);

    for summary in summaries {
        builder.push_record([
            summary.customer.to_string(),
            summary.item_count.to_string(),
            summary.total_cost.to_string(),
            summary.coupon.to_string(),
        ]);
    }

    write_titled_table(&mut out, "Carts", summaries.is_empty(), builder, 1..4)
}

/// Coupon amount taken off an order: `order_cost + tax − final_amount`.
fn coupon_amount(order: &Order) -> Result<Amount, MoneyError> {
    order.order_cost().add(order.tax())?.sub(order.final_amount())
}

struct Summary {
    subtotal: Amount,
    coupon_label: Option<String>,
    coupon: Percent,
    coupon_discount: Amount,
    tax: Amount,
    total: Amount,
}

fn write_titled_table(
    out: &mut impl io::Write,
    title: &str,
    empty: bool,
    builder: Builder,
    numeric_columns: std::ops::Range<usize>,
) -> Result<(), ReceiptError> {
    writeln!(out, "\n\x1b[1m{title}\x1b[0m").map_err(|_err| ReceiptError::IO)?;

    if empty {
        return writeln!(out, "  (none)").map_err(|_err| ReceiptError::IO);
    }

    write_table(out, builder, numeric_columns)
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    numeric_columns: std::ops::Range<usize>,
) -> Result<(), ReceiptError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(numeric_columns), Alignment::right());
    table.modify(Columns::first(), color_dark_grey());

    let table_str = dim_borders(&table.to_string());

    writeln!(out, "\n{table_str}").map_err(|_err| ReceiptError::IO)
}

fn write_summary(out: &mut impl io::Write, summary: &Summary) -> Result<(), ReceiptError> {
    let mut rows: SmallVec<[(String, String); 4]> = SmallVec::new();

    rows.push((" Subtotal:".to_string(), format!("{}  ", summary.subtotal)));

    if !summary.coupon.is_zero() {
        let label = summary.coupon_label.as_deref().unwrap_or("Coupon");

        rows.push((
            format!(" {label} ({}):", summary.coupon),
            format!("-{}  ", summary.coupon_discount),
        ));
    }

    rows.push((" Tax:".to_string(), format!("{}  ", summary.tax)));
    rows.push((
        " \x1b[1mTotal:\x1b[0m".to_string(),
        format!("\x1b[1m{}  \x1b[0m", summary.total),
    ));

    let label_width = rows
        .iter()
        .map(|(label, _)| visible_width(label))
        .max()
        .unwrap_or_default();

    let value_width = rows
        .iter()
        .map(|(_, value)| visible_width(value))
        .max()
        .unwrap_or_default();

    for (label, value) in &rows {
        write_summary_line(out, label, value, label_width, value_width)?;
    }

    writeln!(out).map_err(|_err| ReceiptError::IO)
}

const DARK_GREY: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";

fn is_border(ch: char) -> bool {
    matches!(ch, '\u{2500}'..='\u{257F}')
}

/// Dims every run of box-drawing characters.
fn dim_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() * 2);
    let mut rest = table;

    while let Some((text, tail)) = rest.find(is_border).and_then(|at| rest.split_at_checked(at)) {
        let end = tail.find(|ch| !is_border(ch)).unwrap_or(tail.len());
        let Some((border, after)) = tail.split_at_checked(end) else {
            break;
        };

        out.extend([text, DARK_GREY, border, RESET]);
        rest = after;
    }

    out.push_str(rest);
    out
}

/// Printed width of `text`: escape sequences run up to and including their final letter.
fn visible_width(text: &str) -> usize {
    let mut pieces = text.split('\x1b');
    let plain = pieces.next().map_or(0, |lead| lead.chars().count());

    plain
        + pieces
            .map(|piece| {
                piece
                    .chars()
                    .skip_while(|ch| !ch.is_ascii_alphabetic())
                    .skip(1)
                    .count()
            })
            .sum::<usize>()
}

fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    value: &str,
    label_col_width: usize,
    value_col_width: usize,
) -> Result<(), ReceiptError> {
    let label_pad = label_col_width.saturating_sub(visible_width(label));
    let value_pad = value_col_width.saturating_sub(visible_width(value));

    writeln!(
        out,
        "{:>label_pad$}{label}  {:>value_pad$}{value}",
        "", ""
    )
    .map_err(|_err| ReceiptError::IO)
}

fn color_dark_grey() -> Color {
    Color::new(DARK_GREY, RESET)
}
