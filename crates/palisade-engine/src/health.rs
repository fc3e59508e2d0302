//! Health Factor
//!
//! Risk-adjusted collateral value over total debt value. Computed on demand
//! from post-accrual balances and gated prices, never cached across ticks.

use std::fmt;

use serde::Serialize;

use palisade_core::{AssetId, EngineError, PoolId, Result};
use palisade_math::Decimal;

/// A borrower's health factor. Zero debt is explicitly unliquidatable
/// rather than a division by zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthFactor {
    Finite(Decimal),
    NoDebt,
}

impl HealthFactor {
    /// True when the factor is below `bound`. `NoDebt` is below nothing.
    pub fn is_below(&self, bound: Decimal) -> bool {
        match self {
            Self::Finite(hf) => *hf < bound,
            Self::NoDebt => false,
        }
    }

    pub fn as_finite(&self) -> Option<Decimal> {
        match self {
            Self::Finite(hf) => Some(*hf),
            Self::NoDebt => None,
        }
    }
}

impl fmt::Display for HealthFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(hf) => write!(f, "{hf}"),
            Self::NoDebt => write!(f, "inf"),
        }
    }
}

/// One collateral asset's inputs to the computation. `price` is what the
/// oracle gate released for collateral use; `None` makes the asset
/// contribute nothing, never an estimate.
#[derive(Debug, Clone)]
pub struct CollateralValuation {
    pub asset: AssetId,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub max_ltv: Decimal,
    pub liquidation_threshold: Decimal,
    pub haircut: Decimal,
}

impl CollateralValuation {
    /// Market value after the haircut; zero while unpriced.
    fn discounted_value(&self) -> Result<Decimal> {
        let price = match self.price {
            Some(p) => p,
            None => return Ok(Decimal::zero()),
        };
        Ok(self
            .quantity
            .try_mul(price)?
            .try_mul(Decimal::one().try_sub(self.haircut)?)?)
    }
}

/// One pool's debt inputs. `price` is the debt-side price (last good during
/// an outage); debt with no price basis at all blocks the computation.
#[derive(Debug, Clone)]
pub struct DebtValuation {
    pub pool: PoolId,
    pub asset: AssetId,
    pub debt: Decimal,
    pub price: Option<Decimal>,
}

/// `sum(collateral_value * threshold * (1 - haircut)) / sum(debt_value)`.
pub fn health_factor(
    collateral: &[CollateralValuation],
    debts: &[DebtValuation],
) -> Result<HealthFactor> {
    let mut total_debt = Decimal::zero();
    for d in debts {
        if d.debt.is_zero() {
            continue;
        }
        // Debt must always be valued; without even a last-good price the
        // evaluation cannot proceed conservatively.
        let price = d.price.ok_or_else(|| EngineError::CircuitBreakerOpen {
            asset: d.asset.clone(),
        })?;
        total_debt = total_debt.try_add(d.debt.try_mul(price)?)?;
    }

    if total_debt.is_zero() {
        return Ok(HealthFactor::NoDebt);
    }

    let mut adjusted_collateral = Decimal::zero();
    for c in collateral {
        let weighted = c
            .discounted_value()?
            .try_mul(c.liquidation_threshold)?;
        adjusted_collateral = adjusted_collateral.try_add(weighted)?;
    }

    Ok(HealthFactor::Finite(
        adjusted_collateral.try_div(total_debt)?,
    ))
}

/// Maximum debt the collateral can admit: haircut value times per-asset max
/// LTV. Used to gate borrows before any mutation.
pub fn borrow_capacity(collateral: &[CollateralValuation]) -> Result<Decimal> {
    let mut capacity = Decimal::zero();
    for c in collateral {
        capacity = capacity.try_add(c.discounted_value()?.try_mul(c.max_ltv)?)?;
    }
    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn wbtc_collateral(quantity: &str, price: Option<&str>) -> CollateralValuation {
        CollateralValuation {
            asset: AssetId::new("wbtc"),
            quantity: dec(quantity),
            price: price.map(dec),
            max_ltv: dec("0.7"),
            liquidation_threshold: dec("0.85"),
            haircut: dec("0.05"),
        }
    }

    fn usdc_debt(debt: &str) -> DebtValuation {
        DebtValuation {
            pool: PoolId::new("usdc"),
            asset: AssetId::new("usdc"),
            debt: dec(debt),
            price: Some(Decimal::one()),
        }
    }

    #[test]
    fn test_boundary_health_factor_exactly_one() {
        // $100,000 of collateral at 85% threshold and 5% haircut supports
        // exactly $80,750 of debt: 100000 * 0.95 * 0.85 = 80750.
        let collateral = [wbtc_collateral("10", Some("10000"))];
        let hf = health_factor(&collateral, &[usdc_debt("80750")]).unwrap();
        assert_eq!(hf, HealthFactor::Finite(Decimal::one()));

        // one dollar less debt pushes strictly above 1.0
        let hf = health_factor(&collateral, &[usdc_debt("80749")]).unwrap();
        match hf {
            HealthFactor::Finite(v) => assert!(v > Decimal::one()),
            HealthFactor::NoDebt => panic!("debt present"),
        }
    }

    #[test]
    fn test_no_debt_is_unliquidatable() {
        let hf = health_factor(&[wbtc_collateral("10", Some("10000"))], &[]).unwrap();
        assert_eq!(hf, HealthFactor::NoDebt);
        assert!(!hf.is_below(dec("1000000")));
    }

    #[test]
    fn test_unpriced_collateral_contributes_zero() {
        // the only collateral asset has no usable price: HF collapses to 0
        let hf = health_factor(&[wbtc_collateral("10", None)], &[usdc_debt("1000")]).unwrap();
        assert_eq!(hf, HealthFactor::Finite(Decimal::zero()));
    }

    #[test]
    fn test_unpriced_debt_blocks_computation() {
        let mut debt = usdc_debt("1000");
        debt.price = None;
        let err = health_factor(&[wbtc_collateral("10", Some("10000"))], &[debt]).unwrap_err();
        assert_eq!(err.error_code(), "circuit_breaker_open");
    }

    #[test]
    fn test_multi_asset_aggregation() {
        let mut rwa = wbtc_collateral("1000", Some("100"));
        rwa.asset = AssetId::new("t-bill");
        rwa.liquidation_threshold = dec("0.9");
        rwa.haircut = dec("0.1");

        // wbtc: 10*10000*0.95*0.85 = 80750
        // rwa: 1000*100*0.9*0.9 = 81000
        let collateral = [wbtc_collateral("10", Some("10000")), rwa];
        let hf = health_factor(&collateral, &[usdc_debt("100000")]).unwrap();
        assert_eq!(hf, HealthFactor::Finite(dec("1.6175")));
    }

    #[test]
    fn test_borrow_capacity_uses_ltv() {
        // 10 * 10000 * 0.95 * 0.7 = 66500
        let cap = borrow_capacity(&[wbtc_collateral("10", Some("10000"))]).unwrap();
        assert_eq!(cap, dec("66500"));
    }

    #[test]
    fn test_is_below() {
        let hf = HealthFactor::Finite(dec("0.92"));
        assert!(hf.is_below(Decimal::one()));
        assert!(!hf.is_below(dec("0.92")));
    }
}
