//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are stored with currency precision (two decimal places), are never
//! negative and never exceed [`Price::MAX`]. All arithmetic goes through
//! [`Decimal`] so that summing a cart never drifts the way binary floating
//! point does.

use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimal places kept for every price.
pub const CURRENCY_SCALE: u32 = 2;

/// Errors raised when constructing a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("price must not be negative")]
    Negative,
    #[error("price must not exceed {}", Price::MAX.display())]
    TooLarge,
    #[error("invalid price: {0}")]
    Invalid(String),
}

/// A non-negative amount in the store currency (USD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// The largest price a product may carry: one trillion dollars.
    // 10^14 cents as (lo, mid) 32-bit words
    pub const MAX: Self = Self(Decimal::from_parts(
        0x107A_4000,
        0x5AF3,
        0,
        false,
        CURRENCY_SCALE,
    ));

    /// Create a price, rounding to currency precision.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `amount` is below zero and
    /// `PriceError::TooLarge` if it is above [`Price::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        let amount =
            amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        if amount > Self::MAX.0 {
            return Err(PriceError::TooLarge);
        }
        Ok(Self(amount))
    }

    /// Create a price from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), CURRENCY_SCALE))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    ///
    /// Saturates at the largest representable amount instead of overflowing.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(Decimal::from(quantity)))
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("${:.2}", self.0)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|e| PriceError::Invalid(e.to_string()))?;
        Self::new(amount)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_rejects_negative() {
        assert_eq!("-1.00".parse::<Price>(), Err(PriceError::Negative));
    }

    #[test]
    fn test_price_rounds_to_cents() {
        let price: Price = "10.005".parse().expect("valid");
        assert_eq!(price, Price::from_cents(1001));
    }

    #[test]
    fn test_price_rejects_non_numeric() {
        assert!(matches!("abc".parse::<Price>(), Err(PriceError::Invalid(_))));
    }

    #[test]
    fn test_price_display() {
        assert_eq!(Price::from_cents(2999).display(), "$29.99");
        assert_eq!(Price::ZERO.display(), "$0.00");
    }

    #[test]
    fn test_price_deserializes_from_number_and_string() {
        let from_number: Price = serde_json::from_str("29.99").expect("number");
        let from_string: Price = serde_json::from_str("\"29.99\"").expect("string");
        assert_eq!(from_number, Price::from_cents(2999));
        assert_eq!(from_string, Price::from_cents(2999));
    }

    #[test]
    fn test_price_times_and_sum() {
        let total: Price = [Price::from_cents(2999).times(2), Price::from_cents(5499)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(11497));
    }

    #[test]
    fn test_price_above_max_rejected() {
        assert_eq!(
            "79228162514264337593543950335".parse::<Price>(),
            Err(PriceError::TooLarge)
        );
        assert_eq!("1000000000000.01".parse::<Price>(), Err(PriceError::TooLarge));
        assert_eq!("1000000000000".parse::<Price>(), Ok(Price::MAX));
        assert_eq!(Price::MAX.display(), "$1000000000000.00");
    }

    #[test]
    fn test_price_above_max_rejected_when_decoding() {
        let decoded = serde_json::from_str::<Price>("\"79228162514264337593543950335\"");
        assert!(decoded.is_err());
    }

    #[test]
    fn test_arithmetic_saturates_instead_of_panicking() {
        let huge = Price(Decimal::MAX);
        assert_eq!(huge.times(2), Price(Decimal::MAX));
        assert_eq!(huge + Price::MAX, Price(Decimal::MAX));
        assert_eq!(Price::MAX.amount(), Decimal::new(100_000_000_000_000, CURRENCY_SCALE));
        assert_eq!(
            Price::MAX.times(u32::MAX).amount(),
            Price::MAX.amount() * Decimal::from(u32::MAX)
        );
    }
}
