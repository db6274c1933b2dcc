//! Integer money arithmetic in minor currency units.
//!
//! Amounts are always whole minor units (paise for INR). Tax is computed with
//! integer round-half-up so the stored breakdown is exact and reproducible.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The single settlement currency.
pub const SETTLEMENT_CURRENCY: &str = "INR";

/// Basis points in a whole (100.00%).
const BPS_DENOMINATOR: i128 = 10_000;

/// Errors from money arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The result does not fit in an `i64` of minor units.
    #[error("money amount overflow")]
    Overflow,
    /// A negative amount where only non-negative amounts make sense.
    #[error("money amount must not be negative (got {0})")]
    Negative(i64),
}

/// An amount in minor currency units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Create an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Create a non-negative amount from minor units.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` if `minor` is below zero.
    pub const fn non_negative(minor: i64) -> Result<Self, MoneyError> {
        if minor < 0 {
            return Err(MoneyError::Negative(minor));
        }
        Ok(Self(minor))
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Checked addition.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` on overflow.
    pub const fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        match self.0.checked_add(other.0) {
            Some(v) => Ok(Self(v)),
            None => Err(MoneyError::Overflow),
        }
    }

    /// Checked multiplication by a line quantity.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` on overflow.
    pub fn checked_mul(self, quantity: i32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tax rate in basis points (1800 = 18.00%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    /// No tax.
    pub const ZERO: Self = Self(0);

    /// Create a rate from basis points.
    #[must_use]
    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    /// The rate in basis points.
    #[must_use]
    pub const fn bps(self) -> u32 {
        self.0
    }

    /// Tax owed on `base`, rounded half-up to the nearest minor unit.
    ///
    /// `(base * bps + 5000) / 10000`
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` for a negative base and
    /// `MoneyError::Overflow` if the tax does not fit in minor units.
    pub fn tax_on(self, base: Money) -> Result<Money, MoneyError> {
        if base.0 < 0 {
            return Err(MoneyError::Negative(base.0));
        }
        let scaled = i128::from(base.0) * i128::from(self.0) + BPS_DENOMINATOR / 2;
        i64::try_from(scaled / BPS_DENOMINATOR)
            .map(Money)
            .map_err(|_| MoneyError::Overflow)
    }
}

/// The money breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Compute totals from `(unit_price, quantity)` lines.
    ///
    /// Tax applies to subtotal plus shipping.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError` on overflow or on negative prices/shipping.
    pub fn compute<I>(lines: I, shipping: Money, rate: TaxRate) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = (Money, i32)>,
    {
        if shipping.0 < 0 {
            return Err(MoneyError::Negative(shipping.0));
        }

        let mut subtotal = Money::ZERO;
        for (unit_price, quantity) in lines {
            if unit_price.0 < 0 {
                return Err(MoneyError::Negative(unit_price.0));
            }
            subtotal = subtotal.checked_add(unit_price.checked_mul(quantity)?)?;
        }

        let tax_base = subtotal.checked_add(shipping)?;
        let tax = rate.tax_on(tax_base)?;
        let total = tax_base.checked_add(tax)?;

        Ok(Self {
            subtotal,
            shipping,
            tax,
            total,
        })
    }
}
