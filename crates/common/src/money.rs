//! Exact currency amounts.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Money amount held as an exact decimal.
///
/// Unit prices may carry more precision than a cent; line prices and order
/// totals are always rounded to two places with [`Money::round2`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Number of decimal places kept on line prices and totals.
    pub const CENT_SCALE: u32 = 2;

    /// Creates a money amount from a decimal.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Creates a money amount from whole cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, Self::CENT_SCALE))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Largest unit price a product can carry (`NUMERIC(14, 4)`).
    pub fn max_unit_price() -> Money {
        Self(Decimal::new(99_999_999_999_999, 4))
    }

    /// Largest line price or order total an order can carry (`NUMERIC(14, 2)`).
    pub fn max_total() -> Money {
        Self(Decimal::new(99_999_999_999_999, Self::CENT_SCALE))
    }

    /// Rounds to two decimal places, halves away from zero (5.005 -> 5.01).
    pub fn round2(&self) -> Money {
        Self(
            self.0
                .round_dp_with_strategy(Self::CENT_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Price of `quantity` units at this unit price, rounded to the cent.
    ///
    /// Returns `None` if the product overflows or exceeds [`Money::max_total`].
    pub fn line_total(&self, quantity: i32) -> Option<Money> {
        let amount = self.0.checked_mul(Decimal::from(quantity))?;
        Self(amount).round2().within_total()
    }

    /// Adds two amounts, returning `None` past [`Money::max_total`].
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        Self(self.0.checked_add(rhs.0)?).within_total()
    }

    fn within_total(self) -> Option<Money> {
        (self.0.abs() <= Self::max_total().0).then_some(self)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_sign_negative() && !self.0.is_zero() {
            write!(f, "-${}", self.0.abs())
        } else {
            write!(f, "${}", self.0)
        }
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}
