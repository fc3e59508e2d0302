//! Pool ledger operations.
//!
//! The only code that mutates pool aggregates and position records. Every
//! operation is accrue-then-apply: it first advances the indices to the call
//! timestamp (idempotent when already current), then applies its own delta
//! against fully accrued state. Precondition failures happen before any
//! mutation.

use serde::{Deserialize, Serialize};

use palisade_core::{EngineError, OwnerId, Result, Timestamp};
use palisade_math::Decimal;

use crate::pool::Pool;
use crate::position::{BorrowPosition, SupplyPosition};

/// Post-operation view of one owner's standing in a pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub supplied: Decimal,
    pub debt: Decimal,
}

/// Result of a ledger mutation.
#[derive(Debug, Clone, Copy)]
pub struct LedgerReceipt {
    /// Per-pool operation sequence number for external replay.
    pub seq: u64,
    pub position: PositionSnapshot,
}

/// Result of applying a liquidation's repay-and-absorb step.
#[derive(Debug, Clone, Copy)]
pub struct LiquidationApplied {
    pub seq: u64,
    pub position: PositionSnapshot,
    /// Shortfall covered by reserves.
    pub reserves_used: Decimal,
    /// Shortfall left after reserves were exhausted.
    pub bad_debt_added: Decimal,
}

impl Pool {
    fn snapshot(&self, owner: &OwnerId) -> Result<PositionSnapshot> {
        Ok(PositionSnapshot {
            supplied: self.supply_value(owner)?,
            debt: self.borrow_debt(owner)?,
        })
    }

    /// Keep the discount-weighted borrow aggregate in step with one
    /// position's contribution moving from `before` to `after`.
    fn shift_weight(&mut self, before: Decimal, after: Decimal) -> Result<()> {
        if after >= before {
            self.discount_weight = self.discount_weight.try_add(after.try_sub(before)?)?;
        } else {
            // Saturate: per-position floor rounding can leave the aggregate
            // an ulp behind the exact sum.
            self.discount_weight = self.discount_weight.saturating_sub(before.try_sub(after)?);
        }
        Ok(())
    }

    /// Deposit `amount` into the owner's supply position.
    pub fn supply(
        &mut self,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<LedgerReceipt> {
        self.ensure_operational()?;
        require_positive(amount)?;
        self.accrue(now)?;

        let index = self.supply_index;
        let pos = self
            .supply_positions
            .entry(owner.clone())
            .or_insert_with(|| SupplyPosition::open(index));
        pos.realize(index)?;
        pos.shares = pos.shares.try_add(amount)?;

        self.total_supply = self.total_supply.try_add(amount)?;
        let seq = self.next_seq();
        Ok(LedgerReceipt {
            seq,
            position: self.snapshot(owner)?,
        })
    }

    /// Withdraw `amount` of supplied value. Limited by the position's value
    /// and by pool cash; the position is zeroed, not deleted, when drained.
    pub fn withdraw(
        &mut self,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<LedgerReceipt> {
        self.ensure_operational()?;
        require_positive(amount)?;
        self.accrue(now)?;

        let index = self.supply_index;
        let available = self.available_liquidity();
        let pos = self
            .supply_positions
            .get_mut(owner)
            .ok_or_else(|| EngineError::UnknownOwner(owner.clone()))?;
        let value = pos.realize(index)?;
        if amount > value {
            return Err(EngineError::InsufficientBalance {
                pool: self.id.clone(),
                requested: amount,
                available: value,
            });
        }
        if amount > available {
            return Err(EngineError::InsufficientLiquidity {
                pool: self.id.clone(),
                requested: amount,
                available,
            });
        }

        pos.shares = pos.shares.try_sub(amount)?;
        self.total_supply = self.total_supply.try_sub(amount)?;
        let seq = self.next_seq();
        Ok(LedgerReceipt {
            seq,
            position: self.snapshot(owner)?,
        })
    }

    /// Draw `amount` of debt. Health-factor admission is the engine's job;
    /// the ledger enforces liquidity and keeps the position's frozen
    /// discount (a new position freezes `discount_bps` now, an existing one
    /// keeps what it opened with).
    pub fn borrow(
        &mut self,
        owner: &OwnerId,
        amount: Decimal,
        discount_bps: u64,
        now: Timestamp,
    ) -> Result<LedgerReceipt> {
        self.ensure_operational()?;
        require_positive(amount)?;
        self.accrue(now)?;

        let available = self.available_liquidity();
        if amount > available {
            return Err(EngineError::InsufficientLiquidity {
                pool: self.id.clone(),
                requested: amount,
                available,
            });
        }

        let index = self.borrow_index;
        let pos = self
            .borrow_positions
            .entry(owner.clone())
            .or_insert_with(|| BorrowPosition::open(index, now, discount_bps));
        let weight_before = pos.weight_contribution()?;
        pos.realize(index)?;
        pos.shares = pos.shares.try_add(amount)?;
        let weight_after = pos.weight_contribution()?;

        self.total_borrow = self.total_borrow.try_add(amount)?;
        self.shift_weight(weight_before, weight_after)?;
        let seq = self.next_seq();
        Ok(LedgerReceipt {
            seq,
            position: self.snapshot(owner)?,
        })
    }

    /// Repay up to `amount` of debt; returns the amount actually applied.
    /// The position record is dropped once its debt reaches zero.
    pub fn repay(
        &mut self,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<(LedgerReceipt, Decimal)> {
        self.ensure_operational()?;
        require_positive(amount)?;
        self.accrue(now)?;

        let index = self.borrow_index;
        let pos = self
            .borrow_positions
            .get_mut(owner)
            .ok_or_else(|| EngineError::UnknownOwner(owner.clone()))?;
        let weight_before = pos.weight_contribution()?;
        let debt = pos.realize(index)?;
        let applied = amount.min(debt);

        pos.shares = pos.shares.try_sub(applied)?;
        let weight_after = pos.weight_contribution()?;
        if pos.is_closed() {
            self.borrow_positions.remove(owner);
        }

        self.total_borrow = self.total_borrow.try_sub(applied)?;
        self.shift_weight(weight_before, weight_after)?;
        let seq = self.next_seq();
        Ok((
            LedgerReceipt {
                seq,
                position: self.snapshot(owner)?,
            },
            applied,
        ))
    }

    /// Apply a liquidation's debt reduction. `repay_value` leaves the
    /// borrower's debt; `covered_value` is what seized collateral actually
    /// funds. Any gap is drawn from reserves, then recorded as bad debt —
    /// supplier value is never reduced here.
    pub fn apply_liquidation(
        &mut self,
        owner: &OwnerId,
        repay_value: Decimal,
        covered_value: Decimal,
        now: Timestamp,
    ) -> Result<LiquidationApplied> {
        if self.frozen {
            return Err(EngineError::PoolFrozen {
                pool: self.id.clone(),
            });
        }
        self.accrue(now)?;

        let index = self.borrow_index;
        let pos = self
            .borrow_positions
            .get_mut(owner)
            .ok_or_else(|| EngineError::UnknownOwner(owner.clone()))?;
        let weight_before = pos.weight_contribution()?;
        let debt = pos.realize(index)?;
        let applied = repay_value.min(debt);

        pos.shares = pos.shares.try_sub(applied)?;
        let weight_after = pos.weight_contribution()?;
        if pos.is_closed() {
            self.borrow_positions.remove(owner);
        }

        self.total_borrow = self.total_borrow.try_sub(applied)?;
        self.shift_weight(weight_before, weight_after)?;

        let shortfall = applied.saturating_sub(covered_value);
        let reserves_used = shortfall.min(self.reserves);
        let bad_debt_added = shortfall.try_sub(reserves_used)?;
        self.reserves = self.reserves.try_sub(reserves_used)?;
        if !bad_debt_added.is_zero() {
            self.bad_debt = self.bad_debt.try_add(bad_debt_added)?;
            tracing::error!(
                pool = %self.id,
                owner = %owner,
                amount = %bad_debt_added,
                "bad debt recorded; governance follow-up required"
            );
        }

        let seq = self.next_seq();
        Ok(LiquidationApplied {
            seq,
            position: self.snapshot(owner)?,
            reserves_used,
            bad_debt_added,
        })
    }

    /// Credit the penalty premium owed to the liquidator of a seizure.
    pub fn credit_liquidator_reward(&mut self, premium: Decimal) -> Result<()> {
        self.liquidator_rewards = self.liquidator_rewards.try_add(premium)?;
        Ok(())
    }
}

fn require_positive(amount: Decimal) -> Result<()> {
    if amount.is_zero() {
        return Err(EngineError::InvalidAmount {
            reason: "amount must be positive".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::{AssetId, PoolId, PoolParams};
    use palisade_math::SECONDS_PER_YEAR;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn owner(name: &str) -> OwnerId {
        OwnerId::new(name)
    }

    fn fresh_pool() -> Pool {
        let params = PoolParams {
            asset: AssetId::new("usdc"),
            base_rate: dec("0.02"),
            slope_below: dec("0.07"),
            kink: dec("0.8"),
            slope_above: dec("0.3"),
            reserve_factor: dec("0.1"),
            active: true,
        };
        Pool::new(PoolId::new("usdc"), params, 1, 1_000)
    }

    #[test]
    fn test_supply_then_withdraw_everything() {
        let mut pool = fresh_pool();
        let alice = owner("alice");

        let receipt = pool.supply(&alice, dec("1000"), 1_000).unwrap();
        assert_eq!(receipt.seq, 1);
        assert_eq!(receipt.position.supplied, dec("1000"));
        assert_eq!(pool.total_supply, dec("1000"));

        let receipt = pool.withdraw(&alice, dec("1000"), 1_000).unwrap();
        assert_eq!(receipt.seq, 2);
        assert_eq!(receipt.position.supplied, Decimal::zero());
        assert_eq!(pool.total_supply, Decimal::zero());
        // zeroed, not deleted
        assert!(pool.supply_positions.get(&alice).unwrap().is_zeroed());
    }

    #[test]
    fn test_supplier_earns_interest() {
        let mut pool = fresh_pool();
        let alice = owner("alice");
        let bob = owner("bob");

        pool.supply(&alice, dec("1000000"), 1_000).unwrap();
        pool.borrow(&bob, dec("500000"), 0, 1_000).unwrap();

        // a year later: 5.5% rate at half utilization, 90% of the interest
        // to the sole supplier
        pool.accrue(1_000 + SECONDS_PER_YEAR).unwrap();
        let value = pool.supply_value(&alice).unwrap();
        assert!(value > dec("1025000"), "value {value}");
        assert!(value < dec("1026000"), "value {value}");
    }

    #[test]
    fn test_withdraw_limited_by_liquidity() {
        let mut pool = fresh_pool();
        let alice = owner("alice");
        let bob = owner("bob");

        pool.supply(&alice, dec("1000"), 1_000).unwrap();
        pool.borrow(&bob, dec("600"), 0, 1_000).unwrap();

        // alice owns 1000 of value but only 400 is cash
        let err = pool.withdraw(&alice, dec("500"), 1_000).unwrap_err();
        assert_eq!(err.error_code(), "insufficient_liquidity");
        pool.withdraw(&alice, dec("400"), 1_000).unwrap();
    }

    #[test]
    fn test_withdraw_more_than_position() {
        let mut pool = fresh_pool();
        let alice = owner("alice");
        pool.supply(&alice, dec("100"), 1_000).unwrap();
        let err = pool.withdraw(&alice, dec("150"), 1_000).unwrap_err();
        assert_eq!(err.error_code(), "insufficient_balance");
    }

    #[test]
    fn test_borrow_limited_by_liquidity() {
        let mut pool = fresh_pool();
        pool.supply(&owner("alice"), dec("1000"), 1_000).unwrap();
        let err = pool
            .borrow(&owner("bob"), dec("1500"), 0, 1_000)
            .unwrap_err();
        assert_eq!(err.error_code(), "insufficient_liquidity");
    }

    #[test]
    fn test_repay_caps_at_outstanding_debt() {
        let mut pool = fresh_pool();
        pool.supply(&owner("alice"), dec("1000"), 1_000).unwrap();
        let bob = owner("bob");
        pool.borrow(&bob, dec("500"), 0, 1_000).unwrap();

        let (receipt, applied) = pool.repay(&bob, dec("9999"), 1_000).unwrap();
        assert_eq!(applied, dec("500"));
        assert_eq!(receipt.position.debt, Decimal::zero());
        // closed positions are dropped
        assert!(pool.borrow_positions.get(&bob).is_none());
        assert_eq!(pool.total_borrow, Decimal::zero());
        assert_eq!(pool.discount_weight, Decimal::zero());
    }

    #[test]
    fn test_discounted_borrower_pays_less() {
        let mut pool = fresh_pool();
        pool.supply(&owner("alice"), dec("1000000"), 1_000).unwrap();
        let bob = owner("bob");
        // diamond borrower: 25% off accrued interest
        pool.borrow(&bob, dec("500000"), 2_500, 1_000).unwrap();
        assert_eq!(pool.discount_weight, dec("375000"));

        let year = 1_000 + SECONDS_PER_YEAR;
        pool.accrue(year).unwrap();

        // full-rate debt would be ~528,270; bob owes 25% less interest
        let (_, applied) = pool.repay(&bob, dec("999999999"), year).unwrap();
        assert!(applied > dec("521000"), "applied {applied}");
        assert!(applied < dec("521500"), "applied {applied}");

        // the pool charged what bob owed, down to floor-rounding dust
        let dust = Decimal::from_scaled(1_000_000_000); // 1e-9 units
        assert!(pool.total_borrow < dust, "residual {}", pool.total_borrow);
        assert_eq!(pool.bad_debt, Decimal::zero());

        // suppliers and reserves split the discounted interest, not the
        // full-rate figure
        let interest = applied.try_sub(dec("500000")).unwrap();
        let supplier_gain = pool
            .supply_value(&owner("alice"))
            .unwrap()
            .try_sub(dec("1000000"))
            .unwrap();
        let split = supplier_gain.try_add(pool.reserves).unwrap();
        let gap = split.max(interest).try_sub(split.min(interest)).unwrap();
        assert!(gap < dust, "split {split} vs interest {interest}");
    }

    #[test]
    fn test_liquidation_shortfall_reserves_then_bad_debt() {
        let mut pool = fresh_pool();
        pool.supply(&owner("alice"), dec("1000"), 1_000).unwrap();
        let bob = owner("bob");
        pool.borrow(&bob, dec("500"), 0, 1_000).unwrap();
        pool.reserves = dec("30");

        // repay 100 of debt with only 50 covered by collateral:
        // 30 from reserves, 20 becomes bad debt
        let applied = pool
            .apply_liquidation(&bob, dec("100"), dec("50"), 1_000)
            .unwrap();
        assert_eq!(applied.reserves_used, dec("30"));
        assert_eq!(applied.bad_debt_added, dec("20"));
        assert_eq!(pool.reserves, Decimal::zero());
        assert_eq!(pool.bad_debt, dec("20"));
        assert_eq!(applied.position.debt, dec("400"));
    }

    #[test]
    fn test_zero_amount_rejected_before_mutation() {
        let mut pool = fresh_pool();
        let seq_before = pool.seq;
        let err = pool
            .supply(&owner("alice"), Decimal::zero(), 1_000)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_amount");
        assert_eq!(pool.seq, seq_before);
    }
}
