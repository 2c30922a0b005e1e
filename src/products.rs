//! Products

use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    discounts::{Percent, PercentError},
    ids::TypedUuid,
    pricing::{Amount, LineInput, PricingError, discounted_unit_price},
};

/// Product UUID
pub type ProductUuid = TypedUuid<Product>;

/// Errors raised while constructing a [`Product`].
#[derive(Debug, Error, PartialEq)]
pub enum ProductError {
    /// Base prices can't be negative.
    #[error("product price must not be negative")]
    NegativePrice,

    /// Discount was outside 0–100.
    #[error("invalid discount: {0}")]
    Discount(#[source] PercentError),

    /// GST was outside 0–100.
    #[error("invalid GST: {0}")]
    Gst(#[source] PercentError),

    /// Ratings run from 0 to 5.
    #[error("rating must be between 0 and 5, got {0}")]
    Rating(Decimal),

    /// Category names can't be blank.
    #[error("category must not be empty")]
    EmptyCategory,

    /// The attribute block belongs to a different category.
    #[error("{details} details don't belong to category {category}")]
    DetailsMismatch {
        /// Product category
        category: String,

        /// Category the details describe
        details: &'static str,
    },
}

/// Category-specific attributes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryDetails {
    /// Clothing attributes
    Clothing {
        /// Fabric
        fabric: String,

        /// Intended wearer
        gender: String,

        /// Size label
        size: String,
    },

    /// Grocery attributes
    Groceries {
        /// Use-by date
        use_by_date: Date,

        /// Net weight in grams
        weight_grams: u32,
    },

    /// Electronics attributes
    Electronics {
        /// Warranty length in months
        warranty_months: u32,

        /// Date of manufacture
        manufacture_date: Date,

        /// City of manufacture
        manufacturing_city: String,

        /// Power requirement, e.g. "220V AC"
        power_requirement: String,
    },
}

impl CategoryDetails {
    /// The category these details belong to.
    pub fn category(&self) -> &'static str {
        match self {
            CategoryDetails::Clothing { .. } => "clothing",
            CategoryDetails::Groceries { .. } => "groceries",
            CategoryDetails::Electronics { .. } => "electronics",
        }
    }
}

/// Unvalidated product data.
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Identifier
    pub uuid: ProductUuid,

    /// Display name
    pub name: String,

    /// Free-text description
    pub details: String,

    /// Undiscounted unit price
    pub price: Amount,

    /// Discount in percent points
    pub discount: Option<Decimal>,

    /// Category tag
    pub category: String,

    /// GST in percent points
    pub gst: Option<Decimal>,

    /// Average rating, 0–5
    pub rating: Option<Decimal>,

    /// Units available
    pub stock: u32,

    /// Category-specific attributes
    pub attributes: Option<CategoryDetails>,
}

/// A catalog product.
///
/// Only catalog management changes products; shoppers see them read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    uuid: ProductUuid,
    name: String,
    details: String,
    price: Amount,
    discount: Option<Percent>,
    category: String,
    gst: Option<Percent>,
    rating: Option<Decimal>,
    stock: u32,
    attributes: Option<CategoryDetails>,
}

impl TryFrom<NewProduct> for Product {
    type Error = ProductError;

    fn try_from(product: NewProduct) -> Result<Self, Self::Error> {
        if product.price.to_minor_units() < 0 {
            return Err(ProductError::NegativePrice);
        }

        let discount = product
            .discount
            .map(Percent::new)
            .transpose()
            .map_err(ProductError::Discount)?;

        let gst = product
            .gst
            .map(Percent::new)
            .transpose()
            .map_err(ProductError::Gst)?;

        if let Some(rating) = product.rating
            && (rating < Decimal::ZERO || rating > Decimal::from(5))
        {
            return Err(ProductError::Rating(rating));
        }

        let category = product.category.trim().to_lowercase();

        if category.is_empty() {
            return Err(ProductError::EmptyCategory);
        }

        if let Some(attributes) = &product.attributes
            && attributes.category() != category
        {
            return Err(ProductError::DetailsMismatch {
                category,
                details: attributes.category(),
            });
        }

        Ok(Self {
            uuid: product.uuid,
            name: product.name,
            details: product.details,
            price: product.price,
            discount,
            category,
            gst,
            rating: product.rating,
            stock: product.stock,
            attributes: product.attributes,
        })
    }
}

impl Product {
    /// Identifier
    pub fn uuid(&self) -> ProductUuid {
        self.uuid
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description
    pub fn details(&self) -> &str {
        &self.details
    }

    /// Undiscounted unit price
    pub fn price(&self) -> Amount {
        self.price
    }

    /// Product discount, if any
    pub fn discount(&self) -> Option<Percent> {
        self.discount
    }

    /// Lowercased category tag
    pub fn category(&self) -> &str {
        &self.category
    }

    /// GST rate, if any
    pub fn gst(&self) -> Option<Percent> {
        self.gst
    }

    /// Average rating
    pub fn rating(&self) -> Option<Decimal> {
        self.rating
    }

    /// Units available
    pub fn stock(&self) -> u32 {
        self.stock
    }

    /// Category-specific attributes
    pub fn attributes(&self) -> Option<&CategoryDetails> {
        self.attributes.as_ref()
    }

    /// Unit price after the product discount.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the discounted price can't be represented.
    pub fn discounted_price(&self) -> Result<Amount, PricingError> {
        discounted_unit_price(self.price, self.discount.map(Percent::points))
    }

    /// Pricing input for `quantity` units of this product.
    pub fn line_input(&self, quantity: u32) -> LineInput {
        LineInput {
            unit_price: self.price,
            discount: self.discount.map(Percent::points),
            quantity,
            tax: self.gst.map(Percent::points),
        }
    }

    /// Copy with a new stock level.
    #[must_use]
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    /// Copy with a new base price.
    ///
    /// # Errors
    ///
    /// Returns [`ProductError::NegativePrice`] for a negative price.
    pub fn with_price(mut self, price: Amount) -> Result<Self, ProductError> {
        if price.to_minor_units() < 0 {
            return Err(ProductError::NegativePrice);
        }

        self.price = price;

        Ok(self)
    }
}
