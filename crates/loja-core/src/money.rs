//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Splitting R$ 100.00 in 3 installments:                                 │
//! │    33.33 × 3 = 99.99  → Lost R$ 0.01!                                   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Centavos                                         │
//! │    10000 / 3 = 3333 (×3 = 9999)                                         │
//! │    We KNOW we lost 1 centavo, and the last installment absorbs it      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Parsing At The Boundary
//! Amounts typed by users arrive as text in either pt-BR (`"12,50"`) or
//! dotted (`"12.50"`) form. They are parsed with `rust_decimal`, rounded to
//! two places with round-half-even, and only then turned into centavos.
//!
//! ```rust
//! use loja_core::money::{to_money, Money};
//!
//! assert_eq!(to_money(Some("12,345"), Money::zero()).cents(), 1234);
//! assert_eq!(to_money(Some("abc"), Money::from_cents(100)).cents(), 100);
//! ```

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in centavos (BRL minor unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: a balance can go negative after a manual edit
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// ## Where Money is Used
/// ```text
/// Sale.total ──► Charge.amount ──► split ──► Installment.amount
///                     │                            │
///                     ▼                            ▼
///              Charge.amount_paid  ◄── sum ── Installment.amount_paid
///                     │
///                     ▼
///              balance ──► PIX field 54 ("1234.56")
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Largest amount accepted from user input: R$ 9999999999.99.
    ///
    /// Its decimal form is 13 characters, the most the PIX amount field
    /// (tag 54) can carry.
    pub const MAX: Money = Money(999_999_999_999);

    /// Creates a Money value from centavos.
    ///
    /// ## Example
    /// ```rust
    /// use loja_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // R$ 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Strictly parses a user-typed amount.
    ///
    /// ## Rules
    /// - Comma or dot as decimal separator (`"12,50"` == `"12.50"`)
    /// - Rounded to 2 places with round-half-even
    /// - Empty or non-numeric input is an error
    /// - Magnitudes above [`Money::MAX`] are an error
    ///
    /// ## Example
    /// ```rust
    /// use loja_core::money::Money;
    ///
    /// assert_eq!(Money::parse("1234,56").unwrap().cents(), 123456);
    /// assert_eq!(Money::parse("0.125").unwrap().cents(), 12);
    /// assert!(Money::parse("doze").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Money, ValidationError> {
        let normalized = raw.trim().replace(',', ".");
        if normalized.is_empty() {
            return Err(ValidationError::Required {
                field: "amount".to_string(),
            });
        }

        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let parsed = Decimal::from_str(&normalized)
            .or_else(|_| Decimal::from_scientific(&normalized))
            .map_err(|_| invalid("not a number"))?;

        let rounded = parsed.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
        let cents = rounded
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|value| value.to_i64())
            .filter(|cents| cents.unsigned_abs() <= Money::MAX.0.unsigned_abs())
            .ok_or_else(|| invalid("out of range"))?;

        Ok(Money(cents))
    }

    /// Returns the value in centavos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (reais) portion.
    #[inline]
    pub const fn reais(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (centavos) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Addition that clamps at the `i64` bounds instead of overflowing.
    #[inline]
    pub const fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Subtraction that clamps at the `i64` bounds instead of overflowing.
    #[inline]
    pub const fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Splits into `parts` equal slices, floored to the centavo.
    ///
    /// Returns `(base, remainder)` where `base * parts + remainder == self`
    /// and `0 <= remainder < parts` centavos for non-negative values.
    ///
    /// ```rust
    /// use loja_core::money::Money;
    ///
    /// let (base, rest) = Money::from_cents(10000).split_even(3);
    /// assert_eq!((base.cents(), rest.cents()), (3333, 1));
    /// ```
    pub fn split_even(&self, parts: u32) -> (Money, Money) {
        if parts == 0 {
            return (Money::zero(), *self);
        }
        let parts = i64::from(parts);
        let base = self.0.div_euclid(parts);
        (Money(base), Money(self.0 - base * parts))
    }

    /// Renders the amount as plain decimal text with two places.
    ///
    /// This is the format of the PIX amount field (tag 54).
    ///
    /// ```rust
    /// use loja_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(123456).to_decimal_string(), "1234.56");
    /// assert_eq!(Money::from_cents(-550).to_decimal_string(), "-5.50");
    /// ```
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.reais().abs(), self.cents_part())
    }
}

/// Leniently parses a money value, degrading to `default` on any failure.
///
/// ## When To Use
/// Rendering paths (receipts, reports) that favor availability over strict
/// validation. Mutation paths use [`Money::parse`] and report errors.
///
/// ```text
/// None / "" / "   "   ──► default
/// "12,5"              ──► 12.50
/// "1.005"             ──► 1.00  (half-even)
/// "NaN" / "abc"       ──► default
/// ```
pub fn to_money(raw: Option<&str>, default: Money) -> Money {
    match raw {
        Some(text) if !text.trim().is_empty() => Money::parse(text).unwrap_or(default),
        _ => default,
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as it is printed on receipts: `R$ 1234.56`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}R$ {}.{:02}",
            sign,
            self.reais().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.reais(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_parse_enforces_max() {
        assert_eq!(Money::parse("9999999999,99").unwrap(), Money::MAX);
        assert_eq!(Money::parse("-9999999999.99").unwrap().cents(), -Money::MAX.cents());
        assert_eq!(Money::MAX.to_decimal_string().len(), 13);

        assert!(matches!(
            Money::parse("10000000000"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(Money::parse("500000000000000.00").is_err());
        assert!(Money::parse("1e30").is_err());
    }

    #[test]
    fn test_saturating_ops_clamp() {
        let big = Money::from_cents(i64::MAX - 10);
        assert_eq!(big.saturating_add(Money::from_cents(100)).cents(), i64::MAX);
        assert_eq!(
            Money::from_cents(i64::MIN + 1)
                .saturating_sub(Money::from_cents(5))
                .cents(),
            i64::MIN
        );
        assert_eq!(Money::from_cents(700).saturating_sub(Money::from_cents(200)).cents(), 500);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "R$ 10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "R$ 5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-R$ 5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "R$ 0.00");
    }

    #[test]
    fn test_parse_accepts_comma_and_dot() {
        assert_eq!(Money::parse("12,50").unwrap().cents(), 1250);
        assert_eq!(Money::parse("12.50").unwrap().cents(), 1250);
        assert_eq!(Money::parse("  7 ").unwrap().cents(), 700);
        assert_eq!(Money::parse("-3,1").unwrap().cents(), -310);
    }

    #[test]
    fn test_parse_rounds_half_even() {
        // 0.125 → 0.12 (2 is even), 0.135 → 0.14 (4 is even)
        assert_eq!(Money::parse("0.125").unwrap().cents(), 12);
        assert_eq!(Money::parse("0.135").unwrap().cents(), 14);
        assert_eq!(Money::parse("2.675").unwrap().cents(), 268);
        assert_eq!(Money::parse("1.004").unwrap().cents(), 100);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Money::parse(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            Money::parse("doze reais"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        // Thousands separator plus decimal comma becomes "1.234.56"
        assert!(Money::parse("1.234,56").is_err());
        assert!(Money::parse("NaN").is_err());
        assert!(Money::parse("inf").is_err());
    }

    #[test]
    fn test_to_money_degrades_to_default() {
        let fallback = Money::from_cents(4200);
        assert_eq!(to_money(None, fallback), fallback);
        assert_eq!(to_money(Some(""), fallback), fallback);
        assert_eq!(to_money(Some("   "), fallback), fallback);
        assert_eq!(to_money(Some("abc"), fallback), fallback);
        assert_eq!(to_money(Some("9,99"), fallback).cents(), 999);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_split_even_keeps_every_centavo() {
        let total = Money::from_cents(10000);
        let (base, rest) = total.split_even(3);
        assert_eq!(base.cents(), 3333);
        assert_eq!(rest.cents(), 1);
        assert_eq!(base * 3 + rest, total);

        let (base, rest) = Money::from_cents(5).split_even(3);
        assert_eq!((base.cents(), rest.cents()), (1, 2));
    }

    #[test]
    fn test_decimal_string() {
        assert_eq!(Money::from_cents(1000).to_decimal_string(), "10.00");
        assert_eq!(Money::from_cents(7).to_decimal_string(), "0.07");
        assert_eq!(Money::from_cents(-7).to_decimal_string(), "-0.07");
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(-100).is_negative());
        assert_eq!(Money::from_cents(-100).abs().cents(), 100);
    }
}
