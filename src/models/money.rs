//! Monetary amounts as integer minor units.
//!
//! All ledger arithmetic happens on whole minor units (cents), so balance
//! comparisons are exact and need no epsilon. `rust_decimal` appears only at
//! the presentation boundary and for percentage tax rates.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// An amount of money in minor currency units (cents).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Construct from minor units (cents).
    pub const fn from_minor(units: i64) -> Self {
        Money(units)
    }

    /// Construct from whole major units (e.g. dollars).
    pub const fn from_major(units: i64) -> Self {
        Money(units * 100)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Subtraction clamped at zero, for balances that must never go negative.
    pub fn sub_clamped(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Apply a percentage rate (e.g. `18` for 18%), rounded to the nearest
    /// minor unit.
    pub fn percentage(self, rate: Decimal) -> Money {
        let amount = Decimal::from(self.0) * rate / Decimal::from(100);
        Money(amount.round().to_i64().unwrap_or(0))
    }

    /// Decimal representation in major units, for display and serialization
    /// at API boundaries.
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Mul<u32> for Money {
    type Output = Money;
    fn mul(self, rhs: u32) -> Money {
        Money(self.0 * i64::from(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}
