//! Pool state and the accrual index.
//!
//! A pool is the unit of serialization: all of its aggregates, indices, and
//! position records live behind one lock, and every mutating operation runs
//! accrue-then-apply so it observes fully accrued state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use palisade_core::{EngineError, OwnerId, PoolId, PoolParams, Result, Timestamp};
use palisade_math::{Decimal, SECONDS_PER_YEAR};
use palisade_rates as rates;

use crate::position::{BorrowPosition, SupplyPosition};

/// Pool-level aggregates, indices, and positions. Created at genesis from
/// configuration; deactivated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub params: PoolParams,
    /// Config snapshot version the params came from.
    pub config_version: u32,

    /// Current supplier-owned value (grows with the supplier share of
    /// accrued interest).
    pub total_supply: Decimal,
    /// Current outstanding debt value (grows with accrued interest).
    pub total_borrow: Decimal,
    /// Discount-weighted borrow aggregate:
    /// `sum over positions of shares * (1 - discount) / snapshot_index`.
    /// One unit of borrow-index growth charges exactly this much interest,
    /// which keeps pool accrual equal to what discounted positions owe.
    pub discount_weight: Decimal,
    pub reserves: Decimal,
    /// Penalty premiums credited to liquidators, tracked for reporting.
    pub liquidator_rewards: Decimal,
    /// Unrecovered shortfall after liquidation exhausted reserves. Reported
    /// externally; never socialized into the supply index by this engine.
    pub bad_debt: Decimal,

    pub borrow_index: Decimal,
    pub supply_index: Decimal,
    pub last_accrual_ts: Timestamp,

    /// Set on a detected data-integrity violation; all mutations are
    /// refused until operator intervention.
    pub frozen: bool,

    /// Monotonically increasing per-pool operation sequence number, returned
    /// to external indexers for replay.
    pub seq: u64,

    pub(crate) supply_positions: BTreeMap<OwnerId, SupplyPosition>,
    pub(crate) borrow_positions: BTreeMap<OwnerId, BorrowPosition>,
}

/// What one accrual tick did, for logs and conservation checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccrualOutcome {
    pub interest: Decimal,
    pub reserve_share: Decimal,
    pub supplier_share: Decimal,
}

impl Pool {
    pub fn new(id: PoolId, params: PoolParams, config_version: u32, genesis_ts: Timestamp) -> Self {
        Self {
            id,
            params,
            config_version,
            total_supply: Decimal::zero(),
            total_borrow: Decimal::zero(),
            discount_weight: Decimal::zero(),
            reserves: Decimal::zero(),
            liquidator_rewards: Decimal::zero(),
            bad_debt: Decimal::zero(),
            borrow_index: Decimal::one(),
            supply_index: Decimal::one(),
            last_accrual_ts: genesis_ts,
            frozen: false,
            seq: 0,
            supply_positions: BTreeMap::new(),
            borrow_positions: BTreeMap::new(),
        }
    }

    /// Reject mutations on frozen or paused pools.
    pub fn ensure_operational(&self) -> Result<()> {
        if self.frozen {
            return Err(EngineError::PoolFrozen {
                pool: self.id.clone(),
            });
        }
        if !self.params.active {
            return Err(EngineError::PoolInactive {
                pool: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Cash on hand: supplied value not currently lent out.
    pub fn available_liquidity(&self) -> Decimal {
        self.total_supply.saturating_sub(self.total_borrow)
    }

    pub fn utilization(&self) -> Result<Decimal> {
        Ok(rates::utilization(self.total_borrow, self.total_supply)?)
    }

    /// Current annual (borrow, supply) rates at this instant's utilization.
    pub fn current_rates(&self) -> Result<(Decimal, Decimal)> {
        let u = self.utilization()?;
        let borrow = rates::borrow_rate(u, &self.params)?;
        let supply = rates::supply_rate(u, borrow, self.params.reserve_factor)?;
        Ok((borrow, supply))
    }

    /// Advance the indices to `now`.
    ///
    /// Equal timestamps are an idempotent no-op. A timestamp regression is
    /// fatal: the pool freezes and refuses further mutation, because it
    /// signals upstream clock or data corruption that retrying would
    /// compound. Indices only ever grow; a computed regression (which the
    /// arithmetic cannot produce, but corruption of stored state can)
    /// freezes the pool the same way.
    pub fn accrue(&mut self, now: Timestamp) -> Result<AccrualOutcome> {
        if self.frozen {
            return Err(EngineError::PoolFrozen {
                pool: self.id.clone(),
            });
        }
        if now == self.last_accrual_ts {
            return Ok(AccrualOutcome::default());
        }
        if now < self.last_accrual_ts {
            self.frozen = true;
            tracing::error!(
                pool = %self.id,
                last_accrual = self.last_accrual_ts,
                timestamp = now,
                "accrual timestamp regression; pool frozen"
            );
            return Err(EngineError::AccrualOutOfOrder {
                pool: self.id.clone(),
                last_accrual: self.last_accrual_ts,
                timestamp: now,
            });
        }

        let elapsed = now - self.last_accrual_ts;
        if self.total_borrow.is_zero() {
            // Nothing owes interest; just move the clock.
            self.last_accrual_ts = now;
            return Ok(AccrualOutcome::default());
        }

        let utilization = self.utilization()?;
        let rate = rates::borrow_rate(utilization, &self.params)?;

        // interest factor = exp(rate * elapsed / year), truncated series
        let exponent = rate
            .try_mul_int(elapsed)?
            .try_div_int(SECONDS_PER_YEAR)?;
        let factor = Decimal::exp(exponent)?;

        let new_borrow_index = self.borrow_index.try_mul(factor)?;
        if new_borrow_index < self.borrow_index {
            self.frozen = true;
            tracing::error!(pool = %self.id, "borrow index regression; pool frozen");
            return Err(EngineError::PoolFrozen {
                pool: self.id.clone(),
            });
        }

        // Interest actually charged: index growth times the
        // discount-weighted aggregate, so credit-tier discounts reduce what
        // suppliers and reserves receive rather than leaving a funding gap.
        let index_growth = new_borrow_index.try_sub(self.borrow_index)?;
        let interest = self.discount_weight.try_mul(index_growth)?;
        let reserve_share = interest.try_mul(self.params.reserve_factor)?;
        let supplier_share = interest.try_sub(reserve_share)?;

        self.borrow_index = new_borrow_index;

        if !self.total_supply.is_zero() && !supplier_share.is_zero() {
            let supply_factor = Decimal::one()
                .try_add(supplier_share.try_div(self.total_supply)?)?;
            let new_supply_index = self.supply_index.try_mul(supply_factor)?;
            if new_supply_index < self.supply_index {
                self.frozen = true;
                tracing::error!(pool = %self.id, "supply index regression; pool frozen");
                return Err(EngineError::PoolFrozen {
                    pool: self.id.clone(),
                });
            }
            self.supply_index = new_supply_index;
            self.total_supply = self.total_supply.try_add(supplier_share)?;
        }

        self.total_borrow = self.total_borrow.try_add(interest)?;
        self.reserves = self.reserves.try_add(reserve_share)?;
        self.last_accrual_ts = now;

        tracing::debug!(
            pool = %self.id,
            elapsed,
            interest = %interest,
            borrow_index = %self.borrow_index,
            supply_index = %self.supply_index,
            "accrued"
        );

        Ok(AccrualOutcome {
            interest,
            reserve_share,
            supplier_share,
        })
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Current debt of one borrower, post-accrual view.
    pub fn borrow_debt(&self, owner: &OwnerId) -> Result<Decimal> {
        match self.borrow_positions.get(owner) {
            Some(pos) => Ok(pos.debt(self.borrow_index)?),
            None => Ok(Decimal::zero()),
        }
    }

    /// Current supplied value of one owner, post-accrual view.
    pub fn supply_value(&self, owner: &OwnerId) -> Result<Decimal> {
        match self.supply_positions.get(owner) {
            Some(pos) => Ok(pos.value(self.supply_index)?),
            None => Ok(Decimal::zero()),
        }
    }

    /// Owners with open borrow positions, for liquidation scans.
    pub fn borrowers(&self) -> Vec<OwnerId> {
        self.borrow_positions.keys().cloned().collect()
    }
}
