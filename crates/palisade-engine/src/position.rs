//! Position records: supply shares, borrow shares, collateral deposits.
//!
//! A position stores principal shares and the pool index captured at its
//! last interaction. Its current value is `shares * current_index /
//! snapshot_index`, so accrual never touches positions individually; only
//! the pool indices move.

use serde::{Deserialize, Serialize};

use palisade_core::{AssetId, Timestamp};
use palisade_math::{Decimal, MathError};

/// A supplier's stake in one pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyPosition {
    pub shares: Decimal,
    pub snapshot_index: Decimal,
}

impl SupplyPosition {
    pub fn open(index: Decimal) -> Self {
        Self {
            shares: Decimal::zero(),
            snapshot_index: index,
        }
    }

    /// Current value at the given supply index, rounding down.
    pub fn value(&self, index: Decimal) -> Result<Decimal, MathError> {
        if self.shares.is_zero() {
            return Ok(Decimal::zero());
        }
        self.shares.try_mul(index.try_div(self.snapshot_index)?)
    }

    /// Fold accrued growth into the shares and move the snapshot forward.
    /// Returns the realized value.
    pub fn realize(&mut self, index: Decimal) -> Result<Decimal, MathError> {
        let value = self.value(index)?;
        self.shares = value;
        self.snapshot_index = index;
        Ok(value)
    }

    pub fn is_zeroed(&self) -> bool {
        self.shares.is_zero()
    }
}

/// A borrower's debt in one pool.
///
/// The position is charged the pool's index growth with its frozen
/// credit-tier discount applied to the interest portion:
/// `growth = 1 + (index/snapshot - 1) * (1 - discount)`. The pool keeps a
/// discount-weighted borrow aggregate in step with these contributions, so
/// pool-level accrual charges exactly what positions owe in aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowPosition {
    pub shares: Decimal,
    pub snapshot_index: Decimal,
    pub opened_at: Timestamp,
    /// Credit-tier discount frozen at open time; a later tier change never
    /// re-prices this position.
    pub discount_bps: u64,
}

impl BorrowPosition {
    pub fn open(index: Decimal, opened_at: Timestamp, discount_bps: u64) -> Self {
        Self {
            shares: Decimal::zero(),
            snapshot_index: index,
            opened_at,
            discount_bps,
        }
    }

    fn growth(&self, index: Decimal) -> Result<Decimal, MathError> {
        let ratio = index.try_div(self.snapshot_index)?;
        if self.discount_bps == 0 {
            return Ok(ratio);
        }
        let interest_part = ratio.try_sub(Decimal::one())?;
        Decimal::one()
            .try_add(interest_part.try_mul(Decimal::complement_of_bps(self.discount_bps)?)?)
    }

    /// Current debt at the given borrow index, rounding down.
    pub fn debt(&self, index: Decimal) -> Result<Decimal, MathError> {
        if self.shares.is_zero() {
            return Ok(Decimal::zero());
        }
        self.shares.try_mul(self.growth(index)?)
    }

    /// This position's term in the pool's discount-weighted borrow
    /// aggregate: `shares * (1 - discount) / snapshot_index`. Per unit of
    /// borrow-index growth the position owes exactly this much interest.
    pub fn weight_contribution(&self) -> Result<Decimal, MathError> {
        if self.shares.is_zero() {
            return Ok(Decimal::zero());
        }
        self.shares
            .try_mul(Decimal::complement_of_bps(self.discount_bps)?)?
            .try_div(self.snapshot_index)
    }

    /// Fold accrued interest into the shares and move the snapshot forward.
    /// Returns the realized debt.
    pub fn realize(&mut self, index: Decimal) -> Result<Decimal, MathError> {
        let debt = self.debt(index)?;
        self.shares = debt;
        self.snapshot_index = index;
        Ok(debt)
    }

    pub fn is_closed(&self) -> bool {
        self.shares.is_zero()
    }
}

/// Collateral pledged by an owner, one record per asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralDeposit {
    pub asset: AssetId,
    pub quantity: Decimal,
    /// Config version active when the deposit was last changed, for audit;
    /// valuation always uses the snapshot current at evaluation time.
    pub config_version: u32,
}
