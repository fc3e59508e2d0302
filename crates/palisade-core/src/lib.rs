//! Core types, errors, and risk configuration for the Palisade engine.

pub mod config;
pub mod errors;
pub mod types;

pub use config::{
    CollateralParams, CreditAssessment, CreditTierParams, CreditTierTable, LiquidationParams,
    OracleParams, PoolParams, RiskConfig,
};
pub use errors::{EngineError, Result};
pub use types::{AssetId, CollateralTier, CreditTier, OwnerId, PoolId, Timestamp};
