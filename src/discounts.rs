//! Discounts
//!
//! Percentages are held as percent points (`10` means 10%) and applied to amounts in minor
//! units, rounding half away from zero so every result lands on a whole minor unit.

use std::fmt;

use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use thiserror::Error;

/// Errors raised while building or applying a percentage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PercentError {
    /// The value was outside the inclusive 0–100 range.
    #[error("percentage must be between 0 and 100, got {0}")]
    OutOfRange(Decimal),

    /// Applying the percentage overflowed the representable range.
    #[error("percentage calculation overflowed")]
    Overflow,
}

/// A percentage between 0 and 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percent(Decimal);

impl Percent {
    /// 0%
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// 100%
    pub const FULL: Self = Self(Decimal::ONE_HUNDRED);

    /// Build a percentage from percent points.
    ///
    /// # Errors
    ///
    /// Returns [`PercentError::OutOfRange`] when `points` is negative or above 100.
    pub fn new(points: Decimal) -> Result<Self, PercentError> {
        if points < Decimal::ZERO || points > Decimal::ONE_HUNDRED {
            return Err(PercentError::OutOfRange(points));
        }

        Ok(Self(points.normalize()))
    }

    /// Build a percentage from whole points known up front; anything above 100 becomes 100%.
    #[must_use]
    pub fn saturating_points(points: u8) -> Self {
        Self(Decimal::from(points.min(100)))
    }

    /// Build a percentage from whole percent points.
    ///
    /// # Errors
    ///
    /// Returns [`PercentError::OutOfRange`] when `points` is above 100.
    pub fn from_points(points: u8) -> Result<Self, PercentError> {
        Self::new(Decimal::from(points))
    }

    /// Percent points, e.g. `18` for 18%.
    pub fn points(self) -> Decimal {
        self.0
    }

    /// Whether this is 0%.
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Percent {
    type Error = PercentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// The share of `minor` that `percent` represents, rounded to a whole minor unit.
///
/// # Errors
///
/// Returns [`PercentError::Overflow`] if the product can't be represented.
pub fn percent_of_minor(percent: Percent, minor: i64) -> Result<i64, PercentError> {
    let minor = Decimal::from_i64(minor).ok_or(PercentError::Overflow)?;

    round_to_minor(
        minor
            .checked_mul(percent.points())
            .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(PercentError::Overflow)?,
    )
}

/// `minor` reduced by `percent`, rounding the reduced amount (not the reduction).
///
/// # Errors
///
/// Returns [`PercentError::Overflow`] if the result can't be represented.
pub fn percent_off_minor(percent: Percent, minor: i64) -> Result<i64, PercentError> {
    let minor = Decimal::from_i64(minor).ok_or(PercentError::Overflow)?;
    let remaining = Decimal::ONE_HUNDRED - percent.points();

    round_to_minor(
        minor
            .checked_mul(remaining)
            .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(PercentError::Overflow)?,
    )
}

fn round_to_minor(value: Decimal) -> Result<i64, PercentError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PercentError::Overflow)
}
