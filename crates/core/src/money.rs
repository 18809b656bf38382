//! Monetary value object.
//!
//! All monetary values in the workspace go through [`Money`]: exact decimal
//! arithmetic (no binary floating point), one normalization function for
//! operator input, and display formatting that never feeds back into
//! arithmetic.

use core::ops::Add;
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Normalize a raw monetary input string to dot-decimal form.
///
/// Operators may type either a comma or a dot as the decimal separator; this
/// is the single place where that difference is erased. Every monetary entry
/// point must parse through [`Money::parse`], which calls this.
pub fn normalize_decimal_input(raw: &str) -> String {
    raw.trim().replace(',', ".")
}

/// A non-negative-by-convention decimal amount in the document currency.
///
/// `Money` itself does not forbid negative amounts; the submission rules
/// decide what is acceptable (see the minimum-unit check). It is always a
/// concrete number: input that fails to parse never becomes a `Money`.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// The minimum monetary unit a line price or total must reach at
    /// submission time: one currency unit (R$ 1,00).
    pub fn minimum() -> Self {
        Self(Decimal::ONE)
    }

    pub fn from_decimal(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Parse operator input into a monetary amount.
    ///
    /// Accepts comma or dot decimal separators and surrounding whitespace.
    /// The whole normalized string must be a valid decimal; trailing garbage
    /// is a parse failure, not a partial parse.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let normalized = normalize_decimal_input(raw);
        let amount = Decimal::from_str(&normalized)
            .map_err(|_| DomainError::validation(format!("unparsable monetary value: {raw:?}")))?;
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Line total for a unit price: `quantity × self`, rounded to cents
    /// (midpoint away from zero).
    pub fn times(&self, quantity: u32) -> Money {
        let total = self.0 * Decimal::from(quantity);
        Money(total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Whether this amount satisfies the submission-time minimum.
    pub fn meets_minimum(&self) -> bool {
        *self >= Self::minimum()
    }

    /// Format for pt-BR display: `R$ 1.234,56` (dot grouping, comma
    /// decimals, always two decimal places).
    pub fn format_brl(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let raw = rounded.abs().to_string();
        let (int_part, frac_part) = match raw.split_once('.') {
            Some((int, frac)) => (int, format!("{frac:0<2}")),
            None => (raw.as_str(), "00".to_string()),
        };

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (pos, digit) in int_part.chars().enumerate() {
            if pos > 0 && (int_part.len() - pos) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(digit);
        }

        let sign = if negative { "-" } else { "" };
        format!("{sign}R$ {grouped},{frac_part}")
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl core::fmt::Display for Money {
    /// Canonical locale-independent form (dot decimal), as stored.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl ValueObject for Money {}
