//! Jump-rate model: a shallow slope up to the kink utilization, a steep one
//! above it.

use palisade_core::PoolParams;
use palisade_math::{Decimal, MathError};

/// Fraction of supplied capital currently borrowed, clamped to [0, 1].
///
/// Zero supply is defined as zero utilization. Bad-debt absorption can push
/// `total_borrow` transiently above `total_supply`; the clamp keeps the curve
/// input in its domain.
pub fn utilization(total_borrow: Decimal, total_supply: Decimal) -> Result<Decimal, MathError> {
    if total_supply.is_zero() {
        return Ok(Decimal::zero());
    }
    Ok(total_borrow.try_div(total_supply)?.min(Decimal::one()))
}

/// Annual borrow rate at the given utilization.
///
/// Below or at the kink: `base + u * slope_below`.
/// Above: `base + kink * slope_below + (u - kink) * slope_above`.
/// The two branches agree at `u == kink`, so the curve is continuous there.
pub fn borrow_rate(u: Decimal, params: &PoolParams) -> Result<Decimal, MathError> {
    if u <= params.kink {
        params.base_rate.try_add(u.try_mul(params.slope_below)?)
    } else {
        params
            .base_rate
            .try_add(params.kink.try_mul(params.slope_below)?)?
            .try_add(u.try_sub(params.kink)?.try_mul(params.slope_above)?)
    }
}

/// Annual supply rate: the borrow rate scaled by utilization, net of the
/// reserve factor.
pub fn supply_rate(
    u: Decimal,
    borrow_rate: Decimal,
    reserve_factor: Decimal,
) -> Result<Decimal, MathError> {
    borrow_rate
        .try_mul(u)?
        .try_mul(Decimal::one().try_sub(reserve_factor)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::AssetId;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sample_params() -> PoolParams {
        PoolParams {
            asset: AssetId::new("usdc"),
            base_rate: dec("0.02"),
            slope_below: dec("0.07"),
            kink: dec("0.8"),
            slope_above: dec("0.3"),
            reserve_factor: dec("0.1"),
            active: true,
        }
    }

    #[test]
    fn test_utilization_basic() {
        let u = utilization(dec("50"), dec("100")).unwrap();
        assert_eq!(u, dec("0.5"));
    }

    #[test]
    fn test_utilization_zero_supply() {
        assert_eq!(utilization(dec("10"), Decimal::zero()).unwrap(), Decimal::zero());
    }

    #[test]
    fn test_utilization_clamped_to_one() {
        // borrow > supply after bad-debt absorption still reads as full
        let u = utilization(dec("120"), dec("100")).unwrap();
        assert_eq!(u, Decimal::one());
    }

    #[test]
    fn test_borrow_rate_below_kink() {
        // 2% + 0.5 * 7% = 5.5%
        let rate = borrow_rate(dec("0.5"), &sample_params()).unwrap();
        assert_eq!(rate, dec("0.055"));
    }

    #[test]
    fn test_borrow_rate_above_kink() {
        // 2% + 0.8 * 7% + 0.1 * 30% = 2% + 5.6% + 3% = 10.6%
        let rate = borrow_rate(dec("0.9"), &sample_params()).unwrap();
        assert_eq!(rate, dec("0.106"));
    }

    #[test]
    fn test_curve_continuous_at_kink() {
        let params = sample_params();
        let at_kink = borrow_rate(params.kink, &params).unwrap();
        // One ulp above the kink lands on the steep branch.
        let just_above = borrow_rate(
            params.kink.try_add(Decimal::from_scaled(1)).unwrap(),
            &params,
        )
        .unwrap();
        // 2% + 0.8 * 7% = 7.6% on both sides of the joint
        assert_eq!(at_kink, dec("0.076"));
        assert!(just_above >= at_kink);
        assert!(
            just_above.try_sub(at_kink).unwrap() < Decimal::from_scaled(1_000),
            "curve must not jump at the kink"
        );
    }

    #[test]
    fn test_supply_rate() {
        // 5.5% * 0.5 * (1 - 0.1) = 2.475%
        let rate = supply_rate(dec("0.5"), dec("0.055"), dec("0.1")).unwrap();
        assert_eq!(rate, dec("0.02475"));
    }

    #[test]
    fn test_supply_rate_zero_utilization() {
        let rate = supply_rate(Decimal::zero(), dec("0.02"), dec("0.1")).unwrap();
        assert_eq!(rate, Decimal::zero());
    }
}
