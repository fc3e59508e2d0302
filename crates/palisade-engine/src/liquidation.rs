//! Liquidation Cascade
//!
//! Tier selection from the health factor, cooldown tracking with severity
//! override, and the seizure plan over a borrower's collateral. The engine
//! facade drives these against live pool state; everything here is pure or
//! self-contained so the decision logic is testable in isolation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use palisade_core::{AssetId, OwnerId, PoolId, Result, Timestamp};
use palisade_math::Decimal;

use crate::events::SeizedCollateral;

/// Cascade tiers in increasing severity. The derived ordering is the
/// severity ordering used by the cooldown bypass rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LiquidationTier {
    /// Alert only; no seizure, no cooldown.
    MarginCall,
    SoftLiquidation,
    ForcedLiquidation,
    FullLiquidation,
}

impl LiquidationTier {
    /// First matching tier for a finite health factor; `None` at or above
    /// 1.0. The ranges are half-open and mutually exclusive.
    pub fn from_health_factor(hf: Decimal) -> Option<Self> {
        if hf >= Decimal::one() {
            None
        } else if hf >= Decimal::from_bps(9_500) {
            Some(Self::MarginCall)
        } else if hf >= Decimal::from_bps(9_000) {
            Some(Self::SoftLiquidation)
        } else if hf >= Decimal::from_bps(8_500) {
            Some(Self::ForcedLiquidation)
        } else {
            Some(Self::FullLiquidation)
        }
    }

    /// Fraction of outstanding debt this tier repays.
    pub fn repay_fraction(&self) -> Decimal {
        match self {
            Self::MarginCall => Decimal::zero(),
            Self::SoftLiquidation => Decimal::from_percent(25),
            Self::ForcedLiquidation => Decimal::from_percent(50),
            Self::FullLiquidation => Decimal::one(),
        }
    }

    pub fn seizes(&self) -> bool {
        !matches!(self, Self::MarginCall)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarginCall => "margin_call",
            Self::SoftLiquidation => "soft_liquidation",
            Self::ForcedLiquidation => "forced_liquidation",
            Self::FullLiquidation => "full_liquidation",
        }
    }
}

/// Per-(owner, pool) cooldown bookkeeping. A seizure arms the cooldown; a
/// later evaluation inside the window is deferred unless the health factor
/// has crossed into a strictly more severe tier.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    entries: HashMap<(OwnerId, PoolId), CooldownEntry>,
}

#[derive(Debug, Clone, Copy)]
struct CooldownEntry {
    until: Timestamp,
    tier: LiquidationTier,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// May a `tier` action on this pair execute at `now`?
    pub fn permits(
        &self,
        owner: &OwnerId,
        pool: &PoolId,
        tier: LiquidationTier,
        now: Timestamp,
    ) -> bool {
        match self.entries.get(&(owner.clone(), pool.clone())) {
            Some(entry) if now < entry.until => tier > entry.tier,
            _ => true,
        }
    }

    /// Arm the cooldown after a seizure.
    pub fn arm(
        &mut self,
        owner: &OwnerId,
        pool: &PoolId,
        tier: LiquidationTier,
        now: Timestamp,
        cooldown_secs: u64,
    ) {
        self.entries.insert(
            (owner.clone(), pool.clone()),
            CooldownEntry {
                until: now + cooldown_secs,
                tier,
            },
        );
    }

    /// Drop the pair's entry once the position is healthy again.
    pub fn clear(&mut self, owner: &OwnerId, pool: &PoolId) {
        self.entries.remove(&(owner.clone(), pool.clone()));
    }
}

/// One collateral asset available to a seizure, priced and carrying its
/// tier's penalty.
#[derive(Debug, Clone)]
pub struct SeizableCollateral {
    pub asset: AssetId,
    pub quantity: Decimal,
    pub price: Decimal,
    pub penalty: Decimal,
}

/// Outcome of planning a seizure against available collateral.
#[derive(Debug, Clone)]
pub struct SeizePlan {
    pub seized: Vec<SeizedCollateral>,
    /// Debt value the seized collateral funds (net of penalty premium).
    pub covered_value: Decimal,
    /// Penalty premium owed to the liquidator.
    pub penalty_total: Decimal,
}

/// Work out what to seize to cover `repay_value` of debt.
///
/// Walks the deposits in the order given (the engine passes ascending asset
/// id, the deterministic tie-break) taking
/// `min(remaining * (1 + penalty), available value)` from each. Quantities
/// round down, so a seizure never takes more than the plan states. When
/// collateral runs out, `covered_value` falls short of `repay_value` and the
/// caller charges the difference to reserves and then bad debt.
pub fn plan_seizure(
    repay_value: Decimal,
    collateral: &[SeizableCollateral],
) -> Result<SeizePlan> {
    let mut seized = Vec::new();
    let mut covered = Decimal::zero();
    let mut penalty_total = Decimal::zero();

    for c in collateral {
        if covered >= repay_value {
            break;
        }
        if c.quantity.is_zero() || c.price.is_zero() {
            continue;
        }
        let remaining = repay_value.try_sub(covered)?;
        let gross_factor = Decimal::one().try_add(c.penalty)?;
        let gross_needed = remaining.try_mul(gross_factor)?;
        let available_value = c.quantity.try_mul(c.price)?;
        let gross = gross_needed.min(available_value);

        let quantity = gross.try_div(c.price)?;
        let covers = gross.try_div(gross_factor)?;
        let premium = gross.try_sub(covers)?;

        seized.push(SeizedCollateral {
            asset: c.asset.clone(),
            quantity,
            value: gross,
        });
        covered = covered.try_add(covers)?;
        penalty_total = penalty_total.try_add(premium)?;
    }

    Ok(SeizePlan {
        seized,
        covered_value: covered.min(repay_value),
        penalty_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_tier_selection() {
        // table rows from most to least healthy
        assert_eq!(LiquidationTier::from_health_factor(dec("1.2")), None);
        assert_eq!(LiquidationTier::from_health_factor(Decimal::one()), None);
        assert_eq!(
            LiquidationTier::from_health_factor(dec("0.97")),
            Some(LiquidationTier::MarginCall)
        );
        assert_eq!(
            LiquidationTier::from_health_factor(dec("0.95")),
            Some(LiquidationTier::MarginCall)
        );
        assert_eq!(
            LiquidationTier::from_health_factor(dec("0.92")),
            Some(LiquidationTier::SoftLiquidation)
        );
        assert_eq!(
            LiquidationTier::from_health_factor(dec("0.9")),
            Some(LiquidationTier::SoftLiquidation)
        );
        assert_eq!(
            LiquidationTier::from_health_factor(dec("0.87")),
            Some(LiquidationTier::ForcedLiquidation)
        );
        assert_eq!(
            LiquidationTier::from_health_factor(dec("0.85")),
            Some(LiquidationTier::ForcedLiquidation)
        );
        assert_eq!(
            LiquidationTier::from_health_factor(dec("0.84")),
            Some(LiquidationTier::FullLiquidation)
        );
    }

    #[test]
    fn test_repay_fractions() {
        assert_eq!(
            LiquidationTier::MarginCall.repay_fraction(),
            Decimal::zero()
        );
        assert_eq!(
            LiquidationTier::SoftLiquidation.repay_fraction(),
            dec("0.25")
        );
        assert_eq!(
            LiquidationTier::ForcedLiquidation.repay_fraction(),
            dec("0.5")
        );
        assert_eq!(
            LiquidationTier::FullLiquidation.repay_fraction(),
            Decimal::one()
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(LiquidationTier::FullLiquidation > LiquidationTier::ForcedLiquidation);
        assert!(LiquidationTier::ForcedLiquidation > LiquidationTier::SoftLiquidation);
        assert!(LiquidationTier::SoftLiquidation > LiquidationTier::MarginCall);
    }

    #[test]
    fn test_cooldown_blocks_same_tier() {
        let mut tracker = CooldownTracker::new();
        let alice = OwnerId::new("alice");
        let pool = PoolId::new("usdc");

        tracker.arm(&alice, &pool, LiquidationTier::SoftLiquidation, 1_000, 3_600);
        assert!(!tracker.permits(&alice, &pool, LiquidationTier::SoftLiquidation, 2_000));
        // the window has an end
        assert!(tracker.permits(&alice, &pool, LiquidationTier::SoftLiquidation, 4_600));
    }

    #[test]
    fn test_severity_bypasses_cooldown() {
        let mut tracker = CooldownTracker::new();
        let alice = OwnerId::new("alice");
        let pool = PoolId::new("usdc");

        tracker.arm(&alice, &pool, LiquidationTier::SoftLiquidation, 1_000, 3_600);
        assert!(tracker.permits(&alice, &pool, LiquidationTier::ForcedLiquidation, 2_000));
        // but never less severe inside the window
        assert!(!tracker.permits(&alice, &pool, LiquidationTier::MarginCall, 2_000));
    }

    #[test]
    fn test_cooldowns_are_per_pair() {
        let mut tracker = CooldownTracker::new();
        let alice = OwnerId::new("alice");

        tracker.arm(
            &alice,
            &PoolId::new("usdc"),
            LiquidationTier::SoftLiquidation,
            1_000,
            3_600,
        );
        assert!(tracker.permits(
            &alice,
            &PoolId::new("weth"),
            LiquidationTier::SoftLiquidation,
            1_001
        ));
    }

    #[test]
    fn test_seizure_with_ample_collateral() {
        let collateral = [SeizableCollateral {
            asset: AssetId::new("wbtc"),
            quantity: dec("10"),
            price: dec("10000"),
            penalty: dec("0.06"),
        }];
        // covering 1000 of debt costs 1060 gross at a 6% penalty
        let plan = plan_seizure(dec("1000"), &collateral).unwrap();
        assert_eq!(plan.covered_value, dec("1000"));
        assert_eq!(plan.penalty_total, dec("60"));
        assert_eq!(plan.seized.len(), 1);
        assert_eq!(plan.seized[0].value, dec("1060"));
        assert_eq!(plan.seized[0].quantity, dec("0.106"));
    }

    #[test]
    fn test_seizure_spills_across_assets_in_order() {
        let collateral = [
            SeizableCollateral {
                asset: AssetId::new("aave"),
                quantity: dec("5"),
                price: dec("100"),
                penalty: dec("0.06"),
            },
            SeizableCollateral {
                asset: AssetId::new("wbtc"),
                quantity: dec("1"),
                price: dec("10000"),
                penalty: dec("0.06"),
            },
        ];
        // first asset worth 500 gross is exhausted, the rest spills over
        let plan = plan_seizure(dec("1000"), &collateral).unwrap();
        assert_eq!(plan.seized.len(), 2);
        assert_eq!(plan.seized[0].asset.as_str(), "aave");
        assert_eq!(plan.seized[0].value, dec("500"));
        // covered to within floor-rounding dust of the target
        assert!(plan.covered_value <= dec("1000"));
        assert!(plan.covered_value > dec("999.999999999999"));
    }

    #[test]
    fn test_seizure_shortfall() {
        let collateral = [SeizableCollateral {
            asset: AssetId::new("wbtc"),
            quantity: dec("0.0053"),
            price: dec("100000"),
            penalty: dec("0.06"),
        }];
        // only 530 of gross value exists; it covers 500 of debt
        let plan = plan_seizure(dec("1000"), &collateral).unwrap();
        assert_eq!(plan.covered_value, dec("500"));
        assert_eq!(plan.penalty_total, dec("30"));
    }
}
