//! Fixed-point money, quantity and percentage-rate types.
//!
//! Money is stored in minor currency units (1/100 of the major unit),
//! quantities in thousandths, and rates as percent × 100 (7.7 % → 770).
//! The two rounding operations do their single multiplication in
//! [`rust_decimal::Decimal`] and round half-up to a whole minor unit.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::error::BillingError;

/// An amount in minor currency units (e.g. cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Amount in major units, for display only.
    pub fn to_major(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_major())
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

/// A quantity in thousandths of a unit (2.5 units → 2500).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(i64);

impl Quantity {
    pub const fn from_thousandths(thousandths: i64) -> Self {
        Quantity(thousandths)
    }

    /// Whole units, e.g. `Quantity::units(3)` is 3000 thousandths.
    pub const fn units(units: i64) -> Self {
        Quantity(units * 1000)
    }

    pub const fn thousandths(self) -> i64 {
        self.0
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 3)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal().normalize())
    }
}

/// A percentage scaled by 100: 7.7 % is 770, 100 % is 10000.
///
/// Distinct from the money scale; applied as `rate / 10000`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rate(i64);

impl Rate {
    pub const ZERO: Rate = Rate(0);
    pub const MAX: Rate = Rate(10_000);

    pub const fn from_scaled(scaled: i64) -> Self {
        Rate(scaled)
    }

    pub const fn scaled(self) -> i64 {
        self.0
    }

    /// The rate as a fraction, e.g. 770 → 0.077.
    pub fn as_fraction(self) -> Decimal {
        Decimal::new(self.0, 4)
    }

    /// Whether the rate lies within 0–100 %.
    pub fn is_valid(self) -> bool {
        (Self::ZERO..=Self::MAX).contains(&self)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", Decimal::new(self.0, 2).normalize())
    }
}

/// Net amount of a line: `quantity × unit_price × (1 − discount)`, rounded once.
pub fn line_amount(
    quantity: Quantity,
    unit_price: Money,
    discount: Rate,
) -> Result<Money, BillingError> {
    let remaining = Decimal::ONE - discount.as_fraction();
    let amount = quantity
        .to_decimal()
        .checked_mul(Decimal::from(unit_price.minor()))
        .and_then(|gross| gross.checked_mul(remaining))
        .ok_or_else(|| {
            BillingError::Arithmetic(format!("{quantity} × {unit_price} overflows"))
        })?;
    to_minor_units(amount)
}

/// VAT due on a net amount, rounded independently of any other line.
pub fn vat_on_amount(amount: Money, vat_rate: Rate) -> Result<Money, BillingError> {
    let vat = Decimal::from(amount.minor())
        .checked_mul(vat_rate.as_fraction())
        .ok_or_else(|| BillingError::Arithmetic(format!("VAT on {amount} overflows")))?;
    to_minor_units(vat)
}

fn to_minor_units(value: Decimal) -> Result<Money, BillingError> {
    round_half_up(value)
        .to_i64()
        .map(Money::from_minor)
        .ok_or_else(|| BillingError::Arithmetic(format!("{value} exceeds the money range")))
}

fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
