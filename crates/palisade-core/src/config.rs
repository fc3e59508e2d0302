//! Versioned risk configuration.
//!
//! All risk parameters are strongly typed records supplied by the
//! configuration collaborator and referenced by version at evaluation time: a
//! parameter change produces a new snapshot and never retroactively alters an
//! in-flight computation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use palisade_math::Decimal;

use crate::errors::{EngineError, Result};
use crate::types::{AssetId, CollateralTier, CreditTier, OwnerId, PoolId, Timestamp};

/// Jump-rate curve and reserve parameters for one pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolParams {
    /// Asset the pool lends out (also the unit its totals are measured in).
    pub asset: AssetId,

    /// Rate at zero utilization.
    pub base_rate: Decimal,

    /// Rate slope below the kink.
    pub slope_below: Decimal,

    /// Utilization at which the slope steepens.
    pub kink: Decimal,

    /// Rate slope above the kink.
    pub slope_above: Decimal,

    /// Share of accrued interest diverted to reserves.
    pub reserve_factor: Decimal,

    /// Paused pools reject all mutating operations.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl PoolParams {
    pub fn validate(&self) -> Result<()> {
        let one = Decimal::one();
        if self.kink > one {
            return Err(EngineError::InvalidConfig {
                reason: format!("pool {}: kink {} above 1.0", self.asset, self.kink),
            });
        }
        if self.reserve_factor >= one {
            return Err(EngineError::InvalidConfig {
                reason: format!(
                    "pool {}: reserve factor {} must be below 1.0",
                    self.asset, self.reserve_factor
                ),
            });
        }
        Ok(())
    }
}

/// Risk parameters for one collateral asset. Immutable per config version;
/// deposits reference the version active when they are evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralParams {
    pub tier: CollateralTier,

    /// Maximum loan-to-value for new borrows.
    pub max_ltv: Decimal,

    /// Collateralization level at which liquidation becomes possible.
    pub liquidation_threshold: Decimal,

    /// Valuation discount reflecting liquidity/credit risk.
    pub haircut: Decimal,

    /// Premium paid to liquidators out of seized collateral.
    pub liquidation_penalty: Decimal,
}

impl CollateralParams {
    pub fn validate(&self, asset: &AssetId) -> Result<()> {
        let one = Decimal::one();
        if self.max_ltv > self.liquidation_threshold {
            return Err(EngineError::InvalidConfig {
                reason: format!(
                    "collateral {}: max LTV {} above liquidation threshold {}",
                    asset, self.max_ltv, self.liquidation_threshold
                ),
            });
        }
        if self.liquidation_threshold > one || self.haircut >= one {
            return Err(EngineError::InvalidConfig {
                reason: format!("collateral {}: threshold/haircut out of range", asset),
            });
        }
        Ok(())
    }
}

/// Pricing parameters for one credit tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTierParams {
    /// Borrow-rate discount in basis points.
    pub discount_bps: u64,

    /// Optional override of the collateral max LTV for this tier.
    #[serde(default)]
    pub max_ltv_override: Option<Decimal>,
}

/// Parameter bundle per credit tier; the single lookup point for tier
/// parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTierTable {
    pub diamond: CreditTierParams,
    pub gold: CreditTierParams,
    pub silver: CreditTierParams,
    pub bronze: CreditTierParams,
    pub unrated: CreditTierParams,
}

impl CreditTierTable {
    pub fn params(&self, tier: CreditTier) -> &CreditTierParams {
        match tier {
            CreditTier::Diamond => &self.diamond,
            CreditTier::Gold => &self.gold,
            CreditTier::Silver => &self.silver,
            CreditTier::Bronze => &self.bronze,
            CreditTier::Unrated => &self.unrated,
        }
    }
}

impl Default for CreditTierTable {
    fn default() -> Self {
        Self {
            diamond: CreditTierParams {
                discount_bps: 2_500,
                max_ltv_override: None,
            },
            gold: CreditTierParams {
                discount_bps: 1_500,
                max_ltv_override: None,
            },
            silver: CreditTierParams {
                discount_bps: 750,
                max_ltv_override: None,
            },
            bronze: CreditTierParams {
                discount_bps: 250,
                max_ltv_override: None,
            },
            unrated: CreditTierParams {
                discount_bps: 0,
                max_ltv_override: None,
            },
        }
    }
}

/// One borrower's credit standing.
///
/// A downgrade never touches positions that are already open; their discount
/// was frozen at open time. New positions always price at the current tier,
/// even inside the grace window (`grace_until` is kept for reporting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAssessment {
    /// Composite score, 0-1000.
    pub score: u16,

    pub tier: CreditTier,

    pub effective_from: Timestamp,

    /// End of the downgrade grace window, if one is running.
    #[serde(default)]
    pub grace_until: Option<Timestamp>,
}

impl CreditAssessment {
    /// Assessment for an owner the configuration knows nothing about.
    pub fn unrated() -> Self {
        Self {
            score: 0,
            tier: CreditTier::Unrated,
            effective_from: 0,
            grace_until: None,
        }
    }
}

/// Price-feed acceptance parameters for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleParams {
    /// Maximum age of an observation's source timestamp, in seconds.
    #[serde(default = "default_max_staleness")]
    pub max_staleness_secs: u64,

    /// Deviation from the rolling TWAP (in basis points) that trips the
    /// circuit breaker.
    #[serde(default = "default_max_deviation_bps")]
    pub max_deviation_bps: u64,

    /// Rolling TWAP window, in seconds.
    #[serde(default = "default_twap_window")]
    pub twap_window_secs: u64,
}

fn default_max_staleness() -> u64 {
    60
}

fn default_max_deviation_bps() -> u64 {
    500
}

fn default_twap_window() -> u64 {
    1_800
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            max_staleness_secs: default_max_staleness(),
            max_deviation_bps: default_max_deviation_bps(),
            twap_window_secs: default_twap_window(),
        }
    }
}

/// Liquidation cascade parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationParams {
    /// Minimum spacing between seizure actions on one (owner, pool) pair,
    /// unless severity escalates.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

fn default_cooldown() -> u64 {
    3_600
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown(),
        }
    }
}

/// Complete risk configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Snapshot version; every evaluation records the version it priced
    /// against.
    pub version: u32,

    pub pools: BTreeMap<PoolId, PoolParams>,

    pub collateral: BTreeMap<AssetId, CollateralParams>,

    #[serde(default)]
    pub credit_tiers: CreditTierTable,

    #[serde(default)]
    pub assessments: BTreeMap<OwnerId, CreditAssessment>,

    #[serde(default)]
    pub oracle: BTreeMap<AssetId, OracleParams>,

    #[serde(default)]
    pub liquidation: LiquidationParams,

    /// Health factor a borrow/withdraw must leave behind.
    #[serde(default = "default_min_health_factor")]
    pub min_health_factor: Decimal,
}

fn default_min_health_factor() -> Decimal {
    // 1.10, the post-action buffer above liquidation eligibility.
    Decimal::from_bps(11_000)
}

impl RiskConfig {
    /// Parse and validate a JSON snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for params in self.pools.values() {
            params.validate()?;
        }
        for (asset, params) in &self.collateral {
            params.validate(asset)?;
        }
        Ok(())
    }

    pub fn pool_params(&self, pool: &PoolId) -> Result<&PoolParams> {
        self.pools
            .get(pool)
            .ok_or_else(|| EngineError::UnknownPool(pool.clone()))
    }

    pub fn collateral_params(&self, asset: &AssetId) -> Result<&CollateralParams> {
        self.collateral
            .get(asset)
            .ok_or_else(|| EngineError::UnknownAsset(asset.clone()))
    }

    /// Oracle acceptance parameters, falling back to defaults for assets
    /// without an explicit entry.
    pub fn oracle_params(&self, asset: &AssetId) -> OracleParams {
        self.oracle.get(asset).cloned().unwrap_or_default()
    }

    /// Credit assessment for an owner; owners the config does not know are
    /// unrated (zero discount).
    pub fn assessment(&self, owner: &OwnerId) -> CreditAssessment {
        self.assessments
            .get(owner)
            .cloned()
            .unwrap_or_else(CreditAssessment::unrated)
    }

    /// Borrow-rate discount a *new* position by `owner` receives right now.
    pub fn discount_bps(&self, owner: &OwnerId) -> u64 {
        self.credit_tiers.params(self.assessment(owner).tier).discount_bps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config_json() -> String {
        r#"{
            "version": 3,
            "pools": {
                "usdc": {
                    "asset": "usdc",
                    "base_rate": "0.02",
                    "slope_below": "0.07",
                    "kink": "0.8",
                    "slope_above": "0.3",
                    "reserve_factor": "0.1"
                }
            },
            "collateral": {
                "wbtc": {
                    "tier": "crypto",
                    "max_ltv": "0.7",
                    "liquidation_threshold": "0.85",
                    "haircut": "0.05",
                    "liquidation_penalty": "0.06"
                }
            },
            "assessments": {
                "alice": {
                    "score": 930,
                    "tier": "diamond",
                    "effective_from": 1700000000
                }
            }
        }"#
        .to_string()
    }

    #[test]
    fn test_config_from_json() {
        let config = RiskConfig::from_json(&sample_config_json()).unwrap();
        assert_eq!(config.version, 3);

        let pool = config.pool_params(&PoolId::new("usdc")).unwrap();
        assert_eq!(pool.kink, Decimal::from_percent(80));
        assert!(pool.active);

        let wbtc = config.collateral_params(&AssetId::new("wbtc")).unwrap();
        assert_eq!(wbtc.tier, CollateralTier::Crypto);
        assert_eq!(wbtc.haircut, Decimal::from_percent(5));

        // Defaults fill what the snapshot leaves out.
        assert_eq!(config.liquidation.cooldown_secs, 3_600);
        assert_eq!(
            config.oracle_params(&AssetId::new("wbtc")).max_staleness_secs,
            60
        );
        assert_eq!(config.min_health_factor, Decimal::from_bps(11_000));
    }

    #[test]
    fn test_discount_resolution() {
        let config = RiskConfig::from_json(&sample_config_json()).unwrap();
        // alice is diamond: 2500 bps by the default tier table
        assert_eq!(config.discount_bps(&OwnerId::new("alice")), 2_500);
        // unknown owners are unrated: no discount
        assert_eq!(config.discount_bps(&OwnerId::new("mallory")), 0);
    }

    #[test]
    fn test_validation_rejects_inverted_ltv() {
        let mut config = RiskConfig::from_json(&sample_config_json()).unwrap();
        let params = config.collateral.get_mut(&AssetId::new("wbtc")).unwrap();
        params.max_ltv = Decimal::from_percent(90); // above the 85% threshold
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "invalid_config");
    }

    #[test]
    fn test_validation_rejects_kink_above_one() {
        let mut config = RiskConfig::from_json(&sample_config_json()).unwrap();
        config.pools.get_mut(&PoolId::new("usdc")).unwrap().kink =
            Decimal::from_percent(120);
        assert!(config.validate().is_err());
    }
}
