//! Shared service state handed to API handlers.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use palisade_core::{AssetId, OwnerId, PoolId, Timestamp};
use palisade_engine::{Engine, EvaluationOutcome, EventFilter, Pagination};
use palisade_math::Decimal;

use crate::dto::{ApiError, EventInfo, OperationResponse, PoolInfo, PositionsResponse};

/// Summary of the most recent liquidation scan, for dashboards.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanSummary {
    pub at: Timestamp,
    pub evaluated: usize,
    pub executed: usize,
    pub margin_calls: usize,
    pub deferred: usize,
    pub errors: usize,
}

/// Cloneable handle over the engine shared by all handlers and the
/// scheduler.
#[derive(Clone)]
pub struct EngineState {
    inner: Arc<EngineStateInner>,
}

struct EngineStateInner {
    engine: Engine,
    last_scan: RwLock<Option<ScanSummary>>,
}

impl EngineState {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(EngineStateInner {
                engine,
                last_scan: RwLock::new(None),
            }),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// All pools with their current metrics.
    pub async fn markets(&self) -> Result<Vec<PoolInfo>, ApiError> {
        let engine = self.engine();
        let mut pools = Vec::new();
        for pool_id in engine.pool_ids() {
            pools.push(engine.pool_state(&pool_id)?.into());
        }
        Ok(pools)
    }

    pub async fn supply(
        &self,
        pool: &PoolId,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<OperationResponse, ApiError> {
        Ok(self.engine().supply(pool, owner, amount, now)?.into())
    }

    pub async fn withdraw(
        &self,
        pool: &PoolId,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<OperationResponse, ApiError> {
        Ok(self.engine().withdraw(pool, owner, amount, now)?.into())
    }

    pub async fn borrow(
        &self,
        pool: &PoolId,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<OperationResponse, ApiError> {
        Ok(self.engine().borrow(pool, owner, amount, now)?.into())
    }

    pub async fn repay(
        &self,
        pool: &PoolId,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<OperationResponse, ApiError> {
        Ok(self.engine().repay(pool, owner, amount, now)?.into())
    }

    pub async fn add_collateral(
        &self,
        owner: &OwnerId,
        asset: &AssetId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<String, ApiError> {
        let quantity = self.engine().add_collateral(owner, asset, amount, now)?;
        Ok(quantity.to_string())
    }

    pub async fn positions(
        &self,
        owner: &OwnerId,
        now: Timestamp,
    ) -> Result<PositionsResponse, ApiError> {
        Ok(self.engine().positions(owner, now)?.into())
    }

    pub async fn health_factor(
        &self,
        owner: &OwnerId,
        now: Timestamp,
    ) -> Result<String, ApiError> {
        Ok(self.engine().health_factor(owner, now)?.to_string())
    }

    pub async fn liquidation_events(
        &self,
        owner: Option<OwnerId>,
        pool: Option<PoolId>,
        page: Pagination,
    ) -> (Vec<EventInfo>, usize) {
        let filter = EventFilter { owner, pool };
        let (events, total) = self.engine().list_liquidation_events(&filter, page);
        (events.into_iter().map(EventInfo::from).collect(), total)
    }

    /// Accrue every pool; scheduler entry point. Individual pool failures
    /// (frozen pools) are logged, not fatal to the tick.
    pub async fn accrue_all(&self, now: Timestamp) {
        let engine = self.engine();
        for pool_id in engine.pool_ids() {
            if let Err(err) = engine.accrue_pool(&pool_id, now) {
                tracing::warn!(pool = %pool_id, error = %err, "accrual tick failed");
            }
        }
    }

    /// Sweep all borrowers through the liquidation cascade and remember the
    /// summary.
    pub async fn run_scan(&self, now: Timestamp) -> ScanSummary {
        let mut summary = ScanSummary {
            at: now,
            ..Default::default()
        };
        for (owner, pool, outcome) in self.engine().scan(now) {
            summary.evaluated += 1;
            match outcome {
                Ok(EvaluationOutcome::Executed { .. }) => summary.executed += 1,
                Ok(EvaluationOutcome::MarginCall { .. }) => summary.margin_calls += 1,
                Ok(EvaluationOutcome::Deferred { .. }) => summary.deferred += 1,
                Ok(EvaluationOutcome::Healthy { .. }) => {}
                Err(err) => {
                    summary.errors += 1;
                    tracing::warn!(owner = %owner, pool = %pool, error = %err, "evaluation failed");
                }
            }
        }
        *self.inner.last_scan.write().await = Some(summary);
        summary
    }

    pub async fn last_scan(&self) -> Option<ScanSummary> {
        *self.inner.last_scan.read().await
    }
}
