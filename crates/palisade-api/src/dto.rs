//! Data Transfer Objects for the API layer.
//!
//! Amounts travel as decimal strings, never floats, so clients render
//! exactly what the engine computed.

use serde::{Deserialize, Serialize};

use palisade_core::EngineError;
use palisade_engine::{
    HealthFactor, LiquidationEvent, OpReceipt, OwnerPositions, PoolStateView,
};

/// Pool information for the markets endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolInfo {
    pub pool_id: String,
    pub asset: String,
    pub total_supplied: String,
    pub total_borrowed: String,
    pub available_liquidity: String,
    pub utilization: String,
    pub borrow_rate: String,
    pub supply_rate: String,
    pub reserves: String,
    pub bad_debt: String,
    pub active: bool,
    pub frozen: bool,
    pub seq: u64,
}

impl From<PoolStateView> for PoolInfo {
    fn from(view: PoolStateView) -> Self {
        Self {
            pool_id: view.pool.to_string(),
            asset: view.asset.to_string(),
            total_supplied: view.total_supply.to_string(),
            total_borrowed: view.total_borrow.to_string(),
            available_liquidity: view.available_liquidity.to_string(),
            utilization: view.utilization.to_string(),
            borrow_rate: view.borrow_rate.to_string(),
            supply_rate: view.supply_rate.to_string(),
            reserves: view.reserves.to_string(),
            bad_debt: view.bad_debt.to_string(),
            active: view.active,
            frozen: view.frozen,
            seq: view.seq,
        }
    }
}

/// Response to a mutating pool operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub pool_id: String,
    pub owner: String,
    pub seq: u64,
    pub supplied: String,
    pub debt: String,
    pub applied: String,
    /// Post-operation health factor; "inf" when the owner has no debt.
    pub health_factor: Option<String>,
}

impl From<OpReceipt> for OperationResponse {
    fn from(receipt: OpReceipt) -> Self {
        Self {
            pool_id: receipt.pool.to_string(),
            owner: receipt.owner.to_string(),
            seq: receipt.seq,
            supplied: receipt.position.supplied.to_string(),
            debt: receipt.position.debt.to_string(),
            applied: receipt.applied.to_string(),
            health_factor: receipt.health_factor.map(|hf| hf.to_string()),
        }
    }
}

/// One position row in the positions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    pub pool_id: String,
    pub supplied: String,
    pub debt: String,
}

/// One collateral row in the positions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralInfo {
    pub asset: String,
    pub quantity: String,
}

/// An owner's portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionsResponse {
    pub owner: String,
    pub positions: Vec<PositionInfo>,
    pub collateral: Vec<CollateralInfo>,
    pub health_factor: String,
}

impl From<OwnerPositions> for PositionsResponse {
    fn from(positions: OwnerPositions) -> Self {
        Self {
            owner: positions.owner.to_string(),
            positions: positions
                .pools
                .into_iter()
                .map(|p| PositionInfo {
                    pool_id: p.pool.to_string(),
                    supplied: p.supplied.to_string(),
                    debt: p.debt.to_string(),
                })
                .collect(),
            collateral: positions
                .collateral
                .into_iter()
                .map(|c| CollateralInfo {
                    asset: c.asset.to_string(),
                    quantity: c.quantity.to_string(),
                })
                .collect(),
            health_factor: positions.health_factor.to_string(),
        }
    }
}

/// One liquidation event for the events endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInfo {
    pub id: u64,
    pub borrower: String,
    pub pool_id: String,
    pub tier: String,
    pub debt_repaid: String,
    pub penalty_paid: String,
    pub bad_debt: String,
    pub health_factor_before: String,
    pub health_factor_after: String,
    pub timestamp: u64,
}

impl From<LiquidationEvent> for EventInfo {
    fn from(event: LiquidationEvent) -> Self {
        Self {
            id: event.id,
            borrower: event.borrower.to_string(),
            pool_id: event.pool.to_string(),
            tier: event.tier.as_str().to_string(),
            debt_repaid: event.debt_repaid.to_string(),
            penalty_paid: event.penalty_paid.to_string(),
            bad_debt: event.bad_debt.to_string(),
            health_factor_before: event.health_factor_before.to_string(),
            health_factor_after: match event.health_factor_after {
                HealthFactor::Finite(hf) => hf.to_string(),
                HealthFactor::NoDebt => "inf".to_string(),
            },
            timestamp: event.timestamp,
        }
    }
}

/// Generic API error response, carrying the engine's stable error code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub status: u16,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self {
            code: err.error_code().to_string(),
            status: err.status_code(),
            message: err.to_string(),
        }
    }
}
