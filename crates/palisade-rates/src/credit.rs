//! Credit-tier pricing.

use palisade_math::{Decimal, MathError};

/// Borrow rate after the borrower's tier discount:
/// `base * (1 - discount_bps / 10_000)`.
///
/// The discount is resolved from the borrower's assessment at position-open
/// time and frozen on the position for its lifetime, so a later tier change
/// never re-prices debt that is already outstanding.
pub fn effective_borrow_rate(base_rate: Decimal, discount_bps: u64) -> Result<Decimal, MathError> {
    base_rate.try_mul(Decimal::complement_of_bps(discount_bps)?)
}
