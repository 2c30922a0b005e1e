//! Analytics
//!
//! Dashboard aggregations computed over in-memory catalog, cart and order slices.

use std::{cmp::Reverse, collections::BTreeMap};

use jiff::civil::Date;
use rust_decimal::{Decimal, RoundingStrategy};
use rustc_hash::FxHashMap;
use rusty_money::MoneyError;

use crate::{
    cart::{Cart, CustomerUuid, coupon_percentage},
    catalog::Catalog,
    discounts::Percent,
    orders::{Order, OrderStatus},
    pricing::Amount,
    products::{CategoryDetails, Product, ProductUuid},
};

/// Category reported for order lines whose product is no longer in the catalog.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Units and revenue sold for one product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductSales {
    /// Product sold
    pub product: ProductUuid,

    /// Units across all orders
    pub quantity: u64,

    /// Sum of line totals
    pub revenue: Amount,
}

/// Units and revenue sold in one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySales {
    /// Category tag
    pub category: String,

    /// Units across all orders
    pub quantity: u64,

    /// Sum of line totals
    pub revenue: Amount,
}

/// A customer with at least one order costing more than the average order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighValueCustomer {
    /// Who placed the orders
    pub customer: CustomerUuid,

    /// Their costliest order's cost
    pub order_cost: Amount,

    /// How many of their orders beat the average
    pub orders: usize,
}

/// What a customer's cart holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartSummary {
    /// Cart owner
    pub customer: CustomerUuid,

    /// Units across every line
    pub item_count: u64,

    /// Sum of discounted line totals, before coupon and tax
    pub total_cost: Amount,

    /// Applied coupon's percentage, zero without one
    pub coupon: Percent,
}

/// Average rating for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRating {
    /// Category tag
    pub category: String,

    /// Mean rating rounded to 2 decimal places, zero when nothing is rated
    pub average: Decimal,

    /// Number of rated products
    pub rated: usize,
}

/// Best-selling products by units, most first. Ties keep first-sold order.
///
/// # Errors
///
/// Returns a [`MoneyError`] if the orders mix currencies.
pub fn top_products_by_quantity(
    orders: &[Order],
    limit: usize,
) -> Result<Vec<ProductSales>, MoneyError> {
    let mut sales: Vec<ProductSales> = Vec::new();
    let mut index: FxHashMap<ProductUuid, usize> = FxHashMap::default();

    for line in orders.iter().flat_map(Order::lines) {
        match index.get(&line.product).and_then(|&idx| sales.get_mut(idx)) {
            Some(entry) => {
                entry.quantity += u64::from(line.quantity);
                entry.revenue = entry.revenue.add(line.line_total)?;
            }
            None => {
                index.insert(line.product, sales.len());
                sales.push(ProductSales {
                    product: line.product,
                    quantity: u64::from(line.quantity),
                    revenue: line.line_total,
                });
            }
        }
    }

    sales.sort_by_key(|entry| Reverse(entry.quantity));
    sales.truncate(limit);

    Ok(sales)
}

/// Units sold and revenue per category, ordered by category.
///
/// Lines whose product has left the catalog are counted under [`UNCATEGORIZED`].
///
/// # Errors
///
/// Returns a [`MoneyError`] if the orders mix currencies.
pub fn sales_by_category(
    orders: &[Order],
    catalog: &Catalog,
) -> Result<Vec<CategorySales>, MoneyError> {
    let mut totals: BTreeMap<&str, (u64, Amount)> = BTreeMap::new();

    for line in orders.iter().flat_map(Order::lines) {
        let category = catalog
            .get(line.product)
            .map_or(UNCATEGORIZED, Product::category);

        let total = match totals.get(category) {
            Some(&(quantity, revenue)) => (
                quantity + u64::from(line.quantity),
                revenue.add(line.line_total)?,
            ),
            None => (u64::from(line.quantity), line.line_total),
        };

        totals.insert(category, total);
    }

    Ok(totals
        .into_iter()
        .map(|(category, (quantity, revenue))| CategorySales {
            category: category.to_string(),
            quantity,
            revenue,
        })
        .collect())
}

/// Customers with an order whose cost (before coupon and tax) is strictly above the mean order
/// cost, in order of their first such order.
pub fn customers_above_average(orders: &[Order]) -> Vec<HighValueCustomer> {
    let cost = |order: &Order| Decimal::from(order.order_cost().to_minor_units());

    let Some(mean) = orders
        .iter()
        .map(cost)
        .sum::<Decimal>()
        .checked_div(Decimal::from(orders.len()))
    else {
        return Vec::new();
    };

    let mut customers: Vec<HighValueCustomer> = Vec::new();

    for order in orders.iter().filter(|&order| cost(order) > mean) {
        match customers
            .iter_mut()
            .find(|entry| entry.customer == order.customer())
        {
            Some(entry) => {
                entry.orders += 1;

                if order.order_cost().to_minor_units() > entry.order_cost.to_minor_units() {
                    entry.order_cost = order.order_cost();
                }
            }
            None => customers.push(HighValueCustomer {
                customer: order.customer(),
                order_cost: order.order_cost(),
                orders: 1,
            }),
        }
    }

    customers
}

/// The `limit` products with the highest base price, before any discount. Ties keep catalog
/// order.
pub fn most_expensive(catalog: &Catalog, limit: usize) -> Vec<&Product> {
    let mut products: Vec<&Product> = catalog.iter().collect();

    products.sort_by_key(|product| Reverse(product.price().to_minor_units()));
    products.truncate(limit);

    products
}

/// Electronics manufactured strictly before `date`, in catalog order.
pub fn electronics_made_before(catalog: &Catalog, date: Date) -> Vec<&Product> {
    catalog
        .iter()
        .filter(|product| {
            matches!(
                product.attributes(),
                Some(CategoryDetails::Electronics { manufacture_date, .. })
                    if *manufacture_date < date
            )
        })
        .collect()
}

/// Item count, total and coupon percentage of each cart, in the order given.
pub fn cart_summaries<'a>(carts: impl IntoIterator<Item = &'a Cart>) -> Vec<CartSummary> {
    carts
        .into_iter()
        .map(|cart| CartSummary {
            customer: cart.customer(),
            item_count: cart.total_item_count(),
            total_cost: cart.total_cost(),
            coupon: coupon_percentage(cart),
        })
        .collect()
}

/// Products with no stock, in catalog order.
pub fn out_of_stock(catalog: &Catalog) -> Vec<&Product> {
    catalog.iter().filter(|product| product.stock() == 0).collect()
}

/// Average rating per category, ordered by category.
///
/// Unrated products don't count towards the average; a category with no rated products is
/// still listed, with an average of zero.
pub fn category_ratings(catalog: &Catalog) -> Vec<CategoryRating> {
    let mut totals: BTreeMap<&str, (Decimal, usize)> = BTreeMap::new();

    for product in catalog.iter() {
        let (sum, count) = totals.entry(product.category()).or_default();

        if let Some(rating) = product.rating() {
            *sum += rating;
            *count += 1;
        }
    }

    totals
        .into_iter()
        .map(|(category, (sum, count))| CategoryRating {
            category: category.to_string(),
            average: sum
                .checked_div(Decimal::from(count))
                .unwrap_or_default()
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            rated: count,
        })
        .collect()
}

/// Sum of final amounts per order status.
///
/// # Errors
///
/// Returns a [`MoneyError`] if the orders mix currencies.
pub fn revenue_by_status(orders: &[Order]) -> Result<BTreeMap<OrderStatus, Amount>, MoneyError> {
    let mut revenue: BTreeMap<OrderStatus, Amount> = BTreeMap::new();

    for order in orders {
        let total = match revenue.get(&order.status()) {
            Some(existing) => existing.add(order.final_amount())?,
            None => order.final_amount(),
        };

        revenue.insert(order.status(), total);
    }

    Ok(revenue)
}

#[cfg(test)]
mod tests {
    use jiff::{Timestamp, civil::date};
    use rusty_money::{Money, iso::INR};
    use testresult::TestResult;

    use crate::{
        coupons::Coupon,
        orders::OrderUuid,
        pricing::TaxPolicy,
        products::{NewProduct, tests::new_product},
    };

    use super::*;

    fn rupees(minor: i64) -> Amount {
        Money::from_minor(minor, INR)
    }

    fn product(
        category: &str,
        price: i64,
        rating: Option<Decimal>,
        stock: u32,
    ) -> TestResult<Product> {
        Ok(Product::try_from(NewProduct {
            category: category.to_string(),
            rating,
            ..new_product(price, stock)
        })?)
    }

    fn electronics(made: Option<Date>) -> TestResult<Product> {
        Ok(Product::try_from(NewProduct {
            category: "electronics".to_string(),
            attributes: made.map(|manufacture_date| CategoryDetails::Electronics {
                warranty_months: 12,
                manufacture_date,
                manufacturing_city: "Pune".to_string(),
                power_requirement: "220V AC".to_string(),
            }),
            ..new_product(1_00, 1)
        })?)
    }

    fn order(lines: &[(&Product, u32)]) -> TestResult<Order> {
        order_for(CustomerUuid::new(), lines)
    }

    fn order_for(customer: CustomerUuid, lines: &[(&Product, u32)]) -> TestResult<Order> {
        let mut cart = Cart::new(customer, INR, TaxPolicy::default());

        for (product, quantity) in lines {
            cart.add_item(product, *quantity)?;
        }

        Ok(Order::from_snapshot(OrderUuid::new(), cart.checkout()?, Timestamp::now()))
    }

    #[test]
    fn top_products_sum_quantities_across_orders() -> TestResult {
        let a = product("clothing", 10_00, None, 50)?;
        let b = product("clothing", 20_00, None, 50)?;

        let orders = [order(&[(&a, 1), (&b, 2)])?, order(&[(&a, 3)])?];

        let top = top_products_by_quantity(&orders, 5)?;

        assert_eq!(
            top,
            [
                ProductSales {
                    product: a.uuid(),
                    quantity: 4,
                    revenue: rupees(40_00),
                },
                ProductSales {
                    product: b.uuid(),
                    quantity: 2,
                    revenue: rupees(40_00),
                },
            ]
        );

        assert_eq!(top_products_by_quantity(&orders, 1)?.len(), 1);

        Ok(())
    }

    #[test]
    fn most_expensive_and_out_of_stock() -> TestResult {
        let cheap = product("groceries", 5_00, None, 0)?;
        let pricey = product("electronics", 900_00, None, 3)?;
        let middle = product("clothing", 50_00, None, 0)?;

        let catalog: Catalog = [cheap.clone(), pricey.clone(), middle.clone()]
            .into_iter()
            .collect();

        let expensive: Vec<ProductUuid> = most_expensive(&catalog, 2)
            .iter()
            .map(|product| product.uuid())
            .collect();

        let empty: Vec<ProductUuid> = out_of_stock(&catalog)
            .iter()
            .map(|product| product.uuid())
            .collect();

        assert_eq!(expensive, [pricey.uuid(), middle.uuid()]);
        assert_eq!(empty, [cheap.uuid(), middle.uuid()]);

        Ok(())
    }

    #[test]
    fn most_expensive_ranks_by_base_price() -> TestResult {
        let marked_down = Product::try_from(NewProduct {
            discount: Some(Decimal::from(50)),
            ..new_product(100_00, 1)
        })?;
        let full_price = product("clothing", 80_00, None, 1)?;
        let twin = product("clothing", 80_00, None, 1)?;

        let catalog: Catalog = [full_price.clone(), marked_down.clone(), twin.clone()]
            .into_iter()
            .collect();

        let ranked: Vec<ProductUuid> = most_expensive(&catalog, 3)
            .iter()
            .map(|product| product.uuid())
            .collect();

        assert_eq!(ranked, [marked_down.uuid(), full_price.uuid(), twin.uuid()]);

        Ok(())
    }

    #[test]
    fn sales_are_grouped_by_category() -> TestResult {
        let tee = product("clothing", 10_00, None, 50)?;
        let rice = product("groceries", 20_00, None, 50)?;
        let delisted = product("electronics", 5_00, None, 50)?;

        let catalog: Catalog = [tee.clone(), rice.clone()].into_iter().collect();
        let orders = [
            order(&[(&tee, 2), (&rice, 1)])?,
            order(&[(&tee, 1), (&delisted, 1)])?,
        ];

        assert_eq!(
            sales_by_category(&orders, &catalog)?,
            [
                CategorySales {
                    category: "clothing".to_string(),
                    quantity: 3,
                    revenue: rupees(30_00),
                },
                CategorySales {
                    category: "groceries".to_string(),
                    quantity: 1,
                    revenue: rupees(20_00),
                },
                CategorySales {
                    category: UNCATEGORIZED.to_string(),
                    quantity: 1,
                    revenue: rupees(5_00),
                },
            ]
        );

        Ok(())
    }

    #[test]
    fn customers_above_average_order_cost() -> TestResult {
        let item = product("clothing", 50_00, None, 50)?;
        let regular = CustomerUuid::new();
        let big_spender = CustomerUuid::new();

        // Costs 100, 50, 300, 400 and 350: the mean is 240.
        let orders = [
            order_for(regular, &[(&item, 2)])?,
            order_for(CustomerUuid::new(), &[(&item, 1)])?,
            order_for(regular, &[(&item, 6)])?,
            order_for(big_spender, &[(&item, 8)])?,
            order_for(regular, &[(&item, 7)])?,
        ];

        assert_eq!(
            customers_above_average(&orders),
            [
                HighValueCustomer {
                    customer: regular,
                    order_cost: rupees(350_00),
                    orders: 2,
                },
                HighValueCustomer {
                    customer: big_spender,
                    order_cost: rupees(400_00),
                    orders: 1,
                },
            ]
        );

        assert!(customers_above_average(&[]).is_empty());

        let single = [order(&[(&item, 1)])?];
        assert!(customers_above_average(&single).is_empty());

        Ok(())
    }

    #[test]
    fn electronics_made_before_a_date() -> TestResult {
        let old = electronics(Some(date(2023, 5, 1)))?;
        let recent = electronics(Some(date(2024, 1, 1)))?;
        let undated = electronics(None)?;
        let tee = product("clothing", 1_00, None, 1)?;

        let catalog: Catalog = [old.clone(), recent, undated, tee].into_iter().collect();

        let found: Vec<ProductUuid> = electronics_made_before(&catalog, date(2024, 1, 1))
            .iter()
            .map(|product| product.uuid())
            .collect();

        assert_eq!(found, [old.uuid()]);

        Ok(())
    }

    #[test]
    fn cart_summaries_report_items_total_and_coupon() -> TestResult {
        let item = product("clothing", 10_00, None, 50)?;

        let mut with_coupon = Cart::new(CustomerUuid::new(), INR, TaxPolicy::default());
        with_coupon.add_item(&item, 3)?;
        with_coupon.apply_coupon(
            Coupon::new("SAVE20", Percent::from_points(20)?),
            Timestamp::now(),
        )?;

        let empty = Cart::new(CustomerUuid::new(), INR, TaxPolicy::default());

        assert_eq!(
            cart_summaries([&with_coupon, &empty]),
            [
                CartSummary {
                    customer: with_coupon.customer(),
                    item_count: 3,
                    total_cost: rupees(30_00),
                    coupon: Percent::from_points(20)?,
                },
                CartSummary {
                    customer: empty.customer(),
                    item_count: 0,
                    total_cost: rupees(0),
                    coupon: Percent::ZERO,
                },
            ]
        );

        Ok(())
    }

    #[test]
    fn category_ratings_keep_unrated_categories() -> TestResult {
        let catalog: Catalog = [
            product("clothing", 1_00, Some(Decimal::from(4)), 1)?,
            product("clothing", 1_00, Some(Decimal::from(5)), 1)?,
            product("clothing", 1_00, None, 1)?,
            product("groceries", 1_00, Some(Decimal::new(35, 1)), 1)?,
            product("electronics", 1_00, None, 1)?,
        ]
        .into_iter()
        .collect();

        assert_eq!(
            category_ratings(&catalog),
            [
                CategoryRating {
                    category: "clothing".to_string(),
                    average: Decimal::new(450, 2),
                    rated: 2,
                },
                CategoryRating {
                    category: "electronics".to_string(),
                    average: Decimal::ZERO,
                    rated: 0,
                },
                CategoryRating {
                    category: "groceries".to_string(),
                    average: Decimal::new(350, 2),
                    rated: 1,
                },
            ]
        );

        Ok(())
    }

    #[test]
    fn revenue_is_grouped_by_status() -> TestResult {
        let item = product("clothing", 100_00, None, 10)?;

        let mut completed = order(&[(&item, 1)])?;
        completed.set_status(OrderStatus::Completed)?;

        let orders = [order(&[(&item, 1)])?, order(&[(&item, 2)])?, completed];

        let revenue = revenue_by_status(&orders)?;

        assert_eq!(revenue.get(&OrderStatus::Pending), Some(&rupees(354_00)));
        assert_eq!(revenue.get(&OrderStatus::Completed), Some(&rupees(118_00)));
        assert_eq!(revenue.get(&OrderStatus::Failed), None);

        Ok(())
    }
}
