//! Coupons

use jiff::Timestamp;

use crate::discounts::Percent;

/// A named percentage off a cart subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coupon {
    code: String,
    percentage: Percent,
    expires_at: Option<Timestamp>,
}

impl Coupon {
    /// Create a coupon that never expires. The code is normalised with [`normalize_code`].
    pub fn new(code: &str, percentage: Percent) -> Self {
        Self {
            code: normalize_code(code),
            percentage,
            expires_at: None,
        }
    }

    /// Expire the coupon at `expires_at`.
    #[must_use]
    pub fn expiring_at(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Normalised code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Percentage off the subtotal
    pub fn percentage(&self) -> Percent {
        self.percentage
    }

    /// Expiry, if any
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    /// Whether the coupon can still be redeemed at `now`.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

/// Coupon codes are matched trimmed and uppercased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
