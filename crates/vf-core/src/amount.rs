//! # Amounts — Two-Decimal Money and Tax Rates
//!
//! Monetary values and rates are exact decimals fixed at two places. Their
//! textual form (`"26.00"`, `"-5.10"`) is what gets hashed and serialized,
//! so the type guarantees a single rendering per value.
//!
//! ## Tolerance
//!
//! Regulation allows a computed tax or total to differ from the declared one
//! by up to two cents. The accepted candidates are the correctly rounded
//! expectation shifted by each of [`TOLERANCE_STEPS_CENTS`]; a declared value
//! is accepted iff it equals one of them.

use std::iter::Sum;
use std::ops::{Add, Neg, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RecordError;

/// Accepted deviations from the rounded expectation, in cents, in the order
/// they are tried.
pub const TOLERANCE_STEPS_CENTS: [i64; 5] = [0, -1, 1, -2, 2];

/// Maximum number of integer digits accepted on the wire.
const MAX_INTEGER_DIGITS: usize = 12;

fn parse_two_decimals(raw: &str, what: &str) -> Result<Decimal, RecordError> {
    let s = raw.trim();
    let invalid = |reason: &str| RecordError::InvalidAmount {
        value: raw.to_string(),
        reason: format!("{what} {reason}"),
    };
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (int, frac) = unsigned
        .split_once('.')
        .ok_or_else(|| invalid("must have exactly two decimals"))?;
    if int.is_empty() || !int.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("must have a plain integer part"));
    }
    if int.len() > MAX_INTEGER_DIGITS {
        return Err(invalid("has too many integer digits"));
    }
    if frac.len() != 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("must have exactly two decimals"));
    }
    Decimal::from_str_exact(s).map_err(|e| invalid(&e.to_string()))
}

fn normalize(value: Decimal) -> Decimal {
    let mut d = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    d.rescale(2);
    if d.is_zero() {
        d.set_sign_positive(true);
    }
    d
}

/// A monetary amount with exactly two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// Zero, rendered `"0.00"`.
    pub fn zero() -> Self {
        Self(normalize(Decimal::ZERO))
    }

    /// Parse a wire-format amount such as `"121.00"` or `"-3.50"`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidAmount`] unless the value has an
    /// optional minus sign, 1..=12 integer digits, a dot and two decimals.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        parse_two_decimals(raw, "amount").map(|d| Self(normalize(d)))
    }

    /// Round an arbitrary decimal half away from zero to two places.
    pub fn from_decimal(value: Decimal) -> Self {
        Self(normalize(value))
    }

    /// Build from an integer number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(normalize(Decimal::new(cents, 2)))
    }

    /// The underlying decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// True if strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// The five amounts accepted for an exact expectation.
    pub fn tolerance_candidates(expected: Decimal) -> [Amount; 5] {
        let best = Self::from_decimal(expected);
        TOLERANCE_STEPS_CENTS.map(|step| best + Self::from_cents(step))
    }

    /// True if `self` equals one of the tolerance candidates of `expected`.
    pub fn within_tolerance_of(&self, expected: Decimal) -> bool {
        Self::tolerance_candidates(expected).contains(self)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Amount {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Self(normalize(self.0 + rhs.0))
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Self(normalize(self.0 - rhs.0))
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Self(normalize(-self.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::zero(), |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.fold(Amount::zero(), |acc, a| acc + *a)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A tax rate in percent with two decimals, in `0.00..=100.00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Parse a rate such as `"21.00"`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidAmount`] if the format is wrong or the
    /// rate is outside `0..=100`.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let d = parse_two_decimals(raw, "tax rate")?;
        if (d.is_sign_negative() && !d.is_zero()) || d > Decimal::ONE_HUNDRED {
            return Err(RecordError::InvalidAmount {
                value: raw.to_string(),
                reason: "tax rate must be within 0.00..=100.00".into(),
            });
        }
        Ok(Self(normalize(d)))
    }

    /// The rate as a decimal percentage.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Exact, unrounded tax on `base`.
    pub fn tax_on(&self, base: Amount) -> Decimal {
        base.as_decimal() * self.0 / Decimal::ONE_HUNDRED
    }
}

impl std::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TaxRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaxRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
