//! WAD-scaled decimal values, precise to 18 digits.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{BPS_PER_UNIT, PERCENT_SCALER, SCALE, WAD};

/// Arithmetic errors. Every operation is checked; nothing wraps silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("fixed-point overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid decimal literal: {0}")]
    InvalidDecimal(String),
}

/// Fixed-point decimal scaled by 1e18, backed by `U256`.
///
/// Multiplication and division round down (toward zero), so neither the
/// protocol nor the user is ever credited with value the other did not pay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(U256);

impl Decimal {
    /// 0.0
    pub const fn zero() -> Self {
        Self(U256::zero())
    }

    /// 1.0
    pub fn one() -> Self {
        Self(Self::wad())
    }

    fn wad() -> U256 {
        U256::from(WAD)
    }

    /// Whole-number constructor: `from_integer(5)` is 5.0.
    pub fn from_integer(val: u64) -> Self {
        Self(Self::wad() * U256::from(val))
    }

    /// Percent constructor: `from_percent(7)` is 0.07.
    pub fn from_percent(percent: u64) -> Self {
        Self(U256::from(PERCENT_SCALER) * U256::from(percent))
    }

    /// Basis-point constructor: `from_bps(250)` is 0.025.
    pub fn from_bps(bps: u64) -> Self {
        Self(U256::from(crate::BPS_SCALER) * U256::from(bps))
    }

    /// Exact ratio constructor, rounding down.
    pub fn from_ratio(numerator: u128, denominator: u128) -> Result<Self, MathError> {
        if denominator == 0 {
            return Err(MathError::DivisionByZero);
        }
        let scaled = U256::from(numerator)
            .checked_mul(Self::wad())
            .ok_or(MathError::Overflow)?
            / U256::from(denominator);
        Ok(Self(scaled))
    }

    /// Rebuild from a raw 1e18-scaled value.
    pub fn from_scaled(scaled: u128) -> Self {
        Self(U256::from(scaled))
    }

    /// Raw 1e18-scaled value, if it fits in a u128.
    pub fn to_scaled(&self) -> Result<u128, MathError> {
        if self.0 > U256::from(u128::MAX) {
            return Err(MathError::Overflow);
        }
        Ok(self.0.as_u128())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Self) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    pub fn try_add(self, rhs: Self) -> Result<Self, MathError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(MathError::Overflow)
    }

    pub fn try_sub(self, rhs: Self) -> Result<Self, MathError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(MathError::Overflow)
    }

    /// Saturating subtraction; clamps at zero instead of failing.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// `self * rhs`, rounding down.
    pub fn try_mul(self, rhs: Self) -> Result<Self, MathError> {
        let product = self.0.checked_mul(rhs.0).ok_or(MathError::Overflow)?;
        Ok(Self(product / Self::wad()))
    }

    /// `self / rhs`, rounding down.
    pub fn try_div(self, rhs: Self) -> Result<Self, MathError> {
        if rhs.0.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let scaled = self.0.checked_mul(Self::wad()).ok_or(MathError::Overflow)?;
        Ok(Self(scaled / rhs.0))
    }

    pub fn try_mul_int(self, rhs: u64) -> Result<Self, MathError> {
        self.0
            .checked_mul(U256::from(rhs))
            .map(Self)
            .ok_or(MathError::Overflow)
    }

    pub fn try_div_int(self, rhs: u64) -> Result<Self, MathError> {
        if rhs == 0 {
            return Err(MathError::DivisionByZero);
        }
        Ok(Self(self.0 / U256::from(rhs)))
    }

    /// Integer exponent by square-and-multiply.
    pub fn try_pow(self, mut exp: u64) -> Result<Self, MathError> {
        let mut result = Self::one();
        let mut base = self;
        while exp > 0 {
            if exp & 1 == 1 {
                result = result.try_mul(base)?;
            }
            exp >>= 1;
            if exp > 0 {
                base = base.try_mul(base)?;
            }
        }
        Ok(result)
    }

    /// Truncated power series for `e^x`:
    /// `1 + x + x²/2! + x³/3! + x⁴/4! + x⁵/5!`.
    ///
    /// Deterministic across platforms, no native exponential. Truncation
    /// error is below `x⁶ / (720·(1−x))`: under 3e-6 at x = 0.35 (a 35%
    /// annual rate left unaccrued for a full year) and below one ulp of the
    /// 1e18 scale for x ≤ 1e-3, i.e. any realistic tick interval.
    pub fn exp(x: Self) -> Result<Self, MathError> {
        if x.is_zero() {
            return Ok(Self::one());
        }
        let x2 = x.try_mul(x)?;
        let x3 = x2.try_mul(x)?;
        let x4 = x3.try_mul(x)?;
        let x5 = x4.try_mul(x)?;

        Self::one()
            .try_add(x)?
            .try_add(x2.try_div_int(2)?)?
            .try_add(x3.try_div_int(6)?)?
            .try_add(x4.try_div_int(24)?)?
            .try_add(x5.try_div_int(120)?)
    }

    /// Fractional complement `1 - bps/10_000`, e.g. 2_500 bps -> 0.75.
    pub fn complement_of_bps(bps: u64) -> Result<Self, MathError> {
        if bps > BPS_PER_UNIT {
            return Err(MathError::Overflow);
        }
        Self::one().try_sub(Self::from_bps(bps))
    }
}

impl From<u64> for Decimal {
    fn from(val: u64) -> Self {
        Self::from_integer(val)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scaled = self.0.to_string();
        if scaled.len() <= SCALE {
            scaled.insert_str(0, &"0".repeat(SCALE - scaled.len()));
            scaled.insert_str(0, "0.");
        } else {
            scaled.insert(scaled.len() - SCALE, '.');
        }
        // Trim the fraction down to what carries information.
        let trimmed = scaled.trim_end_matches('0').trim_end_matches('.');
        f.write_str(if trimmed.is_empty() { "0" } else { trimmed })
    }
}

impl FromStr for Decimal {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MathError::InvalidDecimal(s.to_string());
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if frac_part.len() > SCALE {
            return Err(invalid());
        }

        let int: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let frac: u128 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac_part, width = SCALE);
            padded.parse().map_err(|_| invalid())?
        };

        let scaled = U256::from(int)
            .checked_mul(Self::wad())
            .and_then(|v| v.checked_add(U256::from(frac)))
            .ok_or(MathError::Overflow)?;
        Ok(Self(scaled))
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
