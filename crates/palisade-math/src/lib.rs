//! Fixed-point decimal arithmetic for Palisade.
//!
//! All financial quantities in the engine (amounts, rates, indices, prices)
//! are `Decimal` values scaled by 1e18 ("WAD") and backed by `U256`, so that
//! products of two full-scale values cannot overflow. Floating point is
//! deliberately absent: compounding rounding error across millions of accrual
//! ticks is not acceptable, and integer fixed point keeps results identical
//! across platforms.

mod decimal;

pub use decimal::{Decimal, MathError};

/// Number of fractional decimal digits carried by [`Decimal`].
pub const SCALE: usize = 18;

/// Identity scale factor: 1.0 == 10^18.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// One percent in WAD scale.
pub const PERCENT_SCALER: u128 = WAD / 100;

/// One basis point in WAD scale.
pub const BPS_SCALER: u128 = WAD / 10_000;

/// Basis points in 100%.
pub const BPS_PER_UNIT: u64 = 10_000;

/// Seconds in a 365-day year, the accrual time base.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;
