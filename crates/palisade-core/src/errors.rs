//! Error types for the Palisade engine.
//!
//! Every precondition failure is detected before any state mutation, so an
//! `Err` from a mutating operation guarantees nothing changed. Only
//! `AccrualOutOfOrder` (and a detected index regression, surfaced as
//! `PoolFrozen` on later calls) is fatal to its pool; everything else is an
//! ordinary rejection carrying enough detail for the caller to act on.

use thiserror::Error;

use palisade_math::{Decimal, MathError};

use crate::types::{AssetId, OwnerId, PoolId, Timestamp};

/// Engine errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("price for {asset} is {staleness}s old (max {max_staleness}s)")]
    StaleOracle {
        asset: AssetId,
        staleness: u64,
        max_staleness: u64,
    },

    #[error("circuit breaker open for {asset}")]
    CircuitBreakerOpen { asset: AssetId },

    #[error("health factor {current} below required {required}")]
    HealthFactorTooLow { current: Decimal, required: Decimal },

    #[error("insufficient collateral for {owner}: need {required}, have {available}")]
    InsufficientCollateral {
        owner: OwnerId,
        required: Decimal,
        available: Decimal,
    },

    #[error("pool {pool} has {available} available, {requested} requested")]
    InsufficientLiquidity {
        pool: PoolId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("position in pool {pool} holds {available}, {requested} requested")]
    InsufficientBalance {
        pool: PoolId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("pool {pool} is paused")]
    PoolInactive { pool: PoolId },

    #[error("pool {pool} is frozen pending operator intervention")]
    PoolFrozen { pool: PoolId },

    #[error("accrual timestamp {timestamp} precedes last accrual {last_accrual} on pool {pool}")]
    AccrualOutOfOrder {
        pool: PoolId,
        last_accrual: Timestamp,
        timestamp: Timestamp,
    },

    #[error("unknown pool: {0}")]
    UnknownPool(PoolId),

    #[error("unknown asset: {0}")]
    UnknownAsset(AssetId),

    #[error("unknown owner: {0}")]
    UnknownOwner(OwnerId),

    #[error("invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("math error: {0}")]
    Math(#[from] MathError),
}

impl EngineError {
    /// Stable machine-readable code for callers and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::StaleOracle { .. } => "stale_oracle",
            Self::CircuitBreakerOpen { .. } => "circuit_breaker_open",
            Self::HealthFactorTooLow { .. } => "health_factor_too_low",
            Self::InsufficientCollateral { .. } => "insufficient_collateral",
            Self::InsufficientLiquidity { .. } => "insufficient_liquidity",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::PoolInactive { .. } => "pool_inactive",
            Self::PoolFrozen { .. } => "pool_frozen",
            Self::AccrualOutOfOrder { .. } => "accrual_out_of_order",
            Self::UnknownPool(_) => "unknown_pool",
            Self::UnknownAsset(_) => "unknown_asset",
            Self::UnknownOwner(_) => "unknown_owner",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::Math(_) => "math_error",
        }
    }

    /// HTTP-friendly status for the API collaborator.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount { .. } | Self::InvalidConfig { .. } => 400,
            Self::UnknownPool(_) | Self::UnknownAsset(_) | Self::UnknownOwner(_) => 404,
            Self::HealthFactorTooLow { .. }
            | Self::InsufficientCollateral { .. }
            | Self::InsufficientLiquidity { .. }
            | Self::InsufficientBalance { .. }
            | Self::PoolInactive { .. } => 422,
            Self::StaleOracle { .. } | Self::CircuitBreakerOpen { .. } => 503,
            Self::PoolFrozen { .. } | Self::AccrualOutOfOrder { .. } | Self::Math(_) => 500,
        }
    }

    /// Fatal errors freeze their pool until an operator steps in; they signal
    /// upstream corruption that retrying would compound.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AccrualOutOfOrder { .. } | Self::PoolFrozen { .. }
        )
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
