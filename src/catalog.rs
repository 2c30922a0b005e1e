//! Catalog
//!
//! Read-only product lookup plus the shopper-facing filter and sort over an in-memory list.

use std::cmp::Reverse;

use clap::ValueEnum;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use crate::{
    pricing::Amount,
    products::{Product, ProductUuid},
};

/// Product ordering for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    /// Catalog order
    #[default]
    Featured,

    /// Cheapest first
    PriceAscending,

    /// Most expensive first
    PriceDescending,

    /// Best rated first
    Rating,
}

/// Listing filter; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Exact category match (case-insensitive).
    pub category: Option<String>,

    /// Case-insensitive substring of the name or description.
    pub search: Option<String>,

    /// Lowest discounted price, inclusive.
    pub min_price: Option<Amount>,

    /// Highest discounted price, inclusive.
    pub max_price: Option<Amount>,

    /// Lowest rating, inclusive. Unrated products never pass a rating filter.
    pub min_rating: Option<Decimal>,
}

impl ProductFilter {
    /// Whether `product` passes every set criterion.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category) = &self.category
            && !product.category().eq_ignore_ascii_case(category.trim())
        {
            return false;
        }

        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();

            if !product.name().to_lowercase().contains(&needle)
                && !product.details().to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        if self.min_price.is_some() || self.max_price.is_some() {
            let Ok(price) = product.discounted_price() else {
                return false;
            };

            let price = price.to_minor_units();

            if self.min_price.is_some_and(|min| price < min.to_minor_units())
                || self.max_price.is_some_and(|max| price > max.to_minor_units())
            {
                return false;
            }
        }

        if let Some(min_rating) = self.min_rating {
            return product.rating().is_some_and(|rating| rating >= min_rating);
        }

        true
    }
}

/// In-memory product catalog, preserving insertion order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: FxHashMap<ProductUuid, usize>,
}

impl Catalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a product. Replacing keeps the original position.
    pub fn insert(&mut self, product: Product) {
        if let Some(existing) = self
            .index
            .get(&product.uuid())
            .and_then(|&idx| self.products.get_mut(idx))
        {
            *existing = product;
            return;
        }

        self.index.insert(product.uuid(), self.products.len());
        self.products.push(product);
    }

    /// Look up a product.
    pub fn get(&self, uuid: ProductUuid) -> Option<&Product> {
        self.index.get(&uuid).and_then(|&idx| self.products.get(idx))
    }

    /// Products in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog has no products.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Products in a category.
    pub fn by_category(&self, category: &str) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|product| product.category().eq_ignore_ascii_case(category.trim()))
            .collect()
    }

    /// Products passing `filter`, ordered by `sort`. Ties keep catalog order.
    pub fn search(&self, filter: &ProductFilter, sort: SortOrder) -> Vec<&Product> {
        let mut found: Vec<&Product> = self
            .products
            .iter()
            .filter(|product| filter.matches(product))
            .collect();

        sort_products(&mut found, sort);

        found
    }

    /// The `limit` best-rated products; unrated products come last.
    pub fn top_rated(&self, limit: usize) -> Vec<&Product> {
        let mut products: Vec<&Product> = self.products.iter().collect();

        sort_products(&mut products, SortOrder::Rating);
        products.truncate(limit);

        products
    }
}

impl FromIterator<Product> for Catalog {
    fn from_iter<I: IntoIterator<Item = Product>>(iter: I) -> Self {
        let mut catalog = Catalog::new();

        for product in iter {
            catalog.insert(product);
        }

        catalog
    }
}

fn sort_products(products: &mut [&Product], sort: SortOrder) {
    let price = |product: &Product| {
        product
            .discounted_price()
            .map_or(i64::MAX, |price| price.to_minor_units())
    };

    match sort {
        SortOrder::Featured => {}
        SortOrder::PriceAscending => products.sort_by_key(|product| price(product)),
        SortOrder::PriceDescending => products.sort_by_key(|product| Reverse(price(product))),
        SortOrder::Rating => products.sort_by_key(|product| Reverse(product.rating())),
    }
}
