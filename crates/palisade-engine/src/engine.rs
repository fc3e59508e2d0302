//! Engine facade: the registry of pool handles and the operations exposed to
//! the API/UI collaborator.
//!
//! Concurrency discipline (single writer per pool):
//! - every pool lives behind its own lock; mutating operations lock exactly
//!   one pool and run accrue-then-apply under it;
//! - cross-pool reads (health factors) lock pools one at a time, never
//!   nested, in ascending pool-id order;
//! - the collateral map is acquired before any pool lock when both are
//!   needed (liquidation holds it across the seizure so the collateral a
//!   health factor was computed from cannot move before it is seized);
//! - oracle gates, the cooldown tracker, and the event log are leaf locks:
//!   nothing else is acquired while one is held.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use palisade_core::{
    AssetId, CollateralParams, EngineError, OwnerId, PoolId, Result, RiskConfig, Timestamp,
};
use palisade_math::Decimal;
use palisade_oracle::{BreakerState, OracleGate, PriceObservation, PriceRead};

use crate::events::{EventFilter, EventLog, LiquidationEvent, Pagination};
use crate::health::{self, CollateralValuation, DebtValuation, HealthFactor};
use crate::ledger::PositionSnapshot;
use crate::liquidation::{plan_seizure, CooldownTracker, LiquidationTier, SeizableCollateral};
use crate::pool::{AccrualOutcome, Pool};
use crate::position::CollateralDeposit;

/// Result of a mutating pool operation.
#[derive(Debug, Clone, Serialize)]
pub struct OpReceipt {
    pub pool: PoolId,
    pub owner: OwnerId,
    /// Per-pool operation sequence number for external replay.
    pub seq: u64,
    pub position: PositionSnapshot,
    /// Post-operation health factor, for operations that touch debt.
    pub health_factor: Option<HealthFactor>,
    /// Amount actually applied (repayments cap at outstanding debt).
    pub applied: Decimal,
}

/// Why a liquidation evaluation did not execute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferralReason {
    /// A relevant asset is unpriceable; never liquidate on missing prices.
    OracleUnavailable { asset: AssetId },
    /// Inside the cooldown window without a severity escalation.
    Cooldown,
}

/// Outcome of one liquidation evaluation.
#[derive(Debug, Clone, Serialize)]
pub enum EvaluationOutcome {
    /// At or above 1.0 (or no debt); nothing to do.
    Healthy { health_factor: HealthFactor },
    /// Alert-only tier; no seizure, no cooldown.
    MarginCall { health_factor: Decimal },
    Deferred { reason: DeferralReason },
    Executed {
        event_id: u64,
        tier: LiquidationTier,
        debt_repaid: Decimal,
        health_factor_after: HealthFactor,
    },
}

/// Read-only market view of one pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStateView {
    pub pool: PoolId,
    pub asset: AssetId,
    pub total_supply: Decimal,
    pub total_borrow: Decimal,
    pub available_liquidity: Decimal,
    pub utilization: Decimal,
    pub borrow_rate: Decimal,
    pub supply_rate: Decimal,
    pub borrow_index: Decimal,
    pub supply_index: Decimal,
    pub reserves: Decimal,
    pub liquidator_rewards: Decimal,
    pub bad_debt: Decimal,
    pub last_accrual_ts: Timestamp,
    pub active: bool,
    pub frozen: bool,
    pub seq: u64,
    pub config_version: u32,
}

/// An owner's standing in one pool.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerPoolPosition {
    pub pool: PoolId,
    pub supplied: Decimal,
    pub debt: Decimal,
}

/// Everything an owner holds, plus their current health factor.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerPositions {
    pub owner: OwnerId,
    pub pools: Vec<OwnerPoolPosition>,
    pub collateral: Vec<CollateralDeposit>,
    pub health_factor: HealthFactor,
}

/// The risk engine. All state is in memory behind per-resource locks; the
/// persistence collaborator replays receipts and events.
pub struct Engine {
    config: RwLock<Arc<RiskConfig>>,
    pools: RwLock<BTreeMap<PoolId, Arc<Mutex<Pool>>>>,
    oracles: RwLock<BTreeMap<AssetId, Arc<Mutex<OracleGate>>>>,
    collateral: RwLock<BTreeMap<OwnerId, BTreeMap<AssetId, CollateralDeposit>>>,
    cooldowns: Mutex<CooldownTracker>,
    events: Mutex<EventLog>,
}

impl Engine {
    /// Build the engine from a validated genesis configuration: one pool per
    /// configured pool entry, one oracle gate per known asset.
    pub fn new(config: RiskConfig, genesis_ts: Timestamp) -> Result<Self> {
        config.validate()?;

        let mut pools = BTreeMap::new();
        for (id, params) in &config.pools {
            pools.insert(
                id.clone(),
                Arc::new(Mutex::new(Pool::new(
                    id.clone(),
                    params.clone(),
                    config.version,
                    genesis_ts,
                ))),
            );
        }

        let mut oracles = BTreeMap::new();
        for asset in config
            .pools
            .values()
            .map(|p| &p.asset)
            .chain(config.collateral.keys())
        {
            oracles.entry(asset.clone()).or_insert_with(|| {
                Arc::new(Mutex::new(OracleGate::new(
                    asset.clone(),
                    config.oracle_params(asset),
                )))
            });
        }

        tracing::info!(
            version = config.version,
            pools = pools.len(),
            assets = oracles.len(),
            "engine initialized"
        );

        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            pools: RwLock::new(pools),
            oracles: RwLock::new(oracles),
            collateral: RwLock::new(BTreeMap::new()),
            cooldowns: Mutex::new(CooldownTracker::new()),
            events: Mutex::new(EventLog::new()),
        })
    }

    pub fn config_version(&self) -> u32 {
        self.config_snapshot().version
    }

    /// Swap in a new configuration snapshot. Existing pools adopt the new
    /// parameters (indices and totals untouched); new pools and oracle gates
    /// are created; pools are never deleted, only deactivated by the new
    /// snapshot's `active` flags.
    pub fn reload_config(&self, config: RiskConfig, now: Timestamp) -> Result<()> {
        config.validate()?;
        let config = Arc::new(config);

        {
            let mut pools = self.pools.write().expect("pools lock");
            for (id, params) in &config.pools {
                match pools.get(id) {
                    Some(handle) => {
                        let mut pool = handle.lock().expect("pool lock");
                        pool.params = params.clone();
                        pool.config_version = config.version;
                    }
                    None => {
                        pools.insert(
                            id.clone(),
                            Arc::new(Mutex::new(Pool::new(
                                id.clone(),
                                params.clone(),
                                config.version,
                                now,
                            ))),
                        );
                    }
                }
            }
        }
        {
            let mut oracles = self.oracles.write().expect("oracles lock");
            for asset in config
                .pools
                .values()
                .map(|p| &p.asset)
                .chain(config.collateral.keys())
            {
                oracles.entry(asset.clone()).or_insert_with(|| {
                    Arc::new(Mutex::new(OracleGate::new(
                        asset.clone(),
                        config.oracle_params(asset),
                    )))
                });
            }
        }

        tracing::info!(version = config.version, "risk configuration reloaded");
        *self.config.write().expect("config lock") = config;
        Ok(())
    }

    fn config_snapshot(&self) -> Arc<RiskConfig> {
        self.config.read().expect("config lock").clone()
    }

    fn pool_handle(&self, pool: &PoolId) -> Result<Arc<Mutex<Pool>>> {
        self.pools
            .read()
            .expect("pools lock")
            .get(pool)
            .cloned()
            .ok_or_else(|| EngineError::UnknownPool(pool.clone()))
    }

    fn oracle_handle(&self, asset: &AssetId) -> Result<Arc<Mutex<OracleGate>>> {
        self.oracles
            .read()
            .expect("oracles lock")
            .get(asset)
            .cloned()
            .ok_or_else(|| EngineError::UnknownAsset(asset.clone()))
    }

    // ------------------------------------------------------------------
    // Oracle surface
    // ------------------------------------------------------------------

    /// Ingest one price observation from the price collaborator.
    pub fn submit_price_observation(
        &self,
        asset: &AssetId,
        price: Decimal,
        confidence: Decimal,
        source_ts: Timestamp,
        now: Timestamp,
    ) -> Result<()> {
        let gate = self.oracle_handle(asset)?;
        let mut gate = gate.lock().expect("oracle lock");
        gate.ingest(
            PriceObservation {
                price,
                confidence,
                source_ts,
                ingested_at: now,
            },
            now,
        )
    }

    /// Governance action: move a tripped breaker to half-open.
    pub fn reset_breaker(&self, asset: &AssetId) -> Result<BreakerState> {
        let gate = self.oracle_handle(asset)?;
        let mut gate = gate.lock().expect("oracle lock");
        Ok(gate.reset())
    }

    pub fn breaker_state(&self, asset: &AssetId) -> Result<BreakerState> {
        let gate = self.oracle_handle(asset)?;
        let state = gate.lock().expect("oracle lock").breaker();
        Ok(state)
    }

    fn price_read(&self, asset: &AssetId, now: Timestamp) -> Result<PriceRead> {
        let gate = self.oracle_handle(asset)?;
        let read = gate.lock().expect("oracle lock").price(now);
        Ok(read)
    }

    /// Price that must be fully available (fresh and breaker closed), with a
    /// structured error otherwise. Used where degrading is not acceptable:
    /// drawing new debt, executing a seizure.
    fn price_strict(&self, asset: &AssetId, now: Timestamp) -> Result<Decimal> {
        let gate = self.oracle_handle(asset)?;
        let gate = gate.lock().expect("oracle lock");
        if gate.breaker() != BreakerState::Closed {
            return Err(EngineError::CircuitBreakerOpen {
                asset: asset.clone(),
            });
        }
        match gate.price(now) {
            PriceRead::Available(price) => Ok(price),
            PriceRead::Unavailable { .. } => Err(EngineError::StaleOracle {
                asset: asset.clone(),
                staleness: gate
                    .last_updated()
                    .map(|ts| now.saturating_sub(ts))
                    .unwrap_or(u64::MAX),
                max_staleness: gate.max_staleness(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Pool operations
    // ------------------------------------------------------------------

    /// Scheduler tick: advance one pool's indices.
    pub fn accrue_pool(&self, pool: &PoolId, now: Timestamp) -> Result<AccrualOutcome> {
        let handle = self.pool_handle(pool)?;
        let mut pool = handle.lock().expect("pool lock");
        pool.accrue(now)
    }

    pub fn supply(
        &self,
        pool_id: &PoolId,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<OpReceipt> {
        let handle = self.pool_handle(pool_id)?;
        let receipt = {
            let mut pool = handle.lock().expect("pool lock");
            pool.supply(owner, amount, now)?
        };
        tracing::info!(pool = %pool_id, owner = %owner, amount = %amount, seq = receipt.seq, "supply");
        Ok(OpReceipt {
            pool: pool_id.clone(),
            owner: owner.clone(),
            seq: receipt.seq,
            position: receipt.position,
            health_factor: None,
            applied: amount,
        })
    }

    pub fn withdraw(
        &self,
        pool_id: &PoolId,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<OpReceipt> {
        let handle = self.pool_handle(pool_id)?;
        let receipt = {
            let mut pool = handle.lock().expect("pool lock");
            pool.withdraw(owner, amount, now)?
        };
        tracing::info!(pool = %pool_id, owner = %owner, amount = %amount, seq = receipt.seq, "withdraw");
        Ok(OpReceipt {
            pool: pool_id.clone(),
            owner: owner.clone(),
            seq: receipt.seq,
            position: receipt.position,
            health_factor: None,
            applied: amount,
        })
    }

    /// Draw new debt. Admission is checked before any mutation: the pool
    /// asset must be strictly priceable, the post-borrow debt must fit the
    /// collateral's LTV capacity, and the post-borrow health factor must
    /// clear the configured minimum.
    pub fn borrow(
        &self,
        pool_id: &PoolId,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<OpReceipt> {
        let config = self.config_snapshot();
        let handle = self.pool_handle(pool_id)?;
        let asset = {
            let pool = handle.lock().expect("pool lock");
            pool.ensure_operational()?;
            pool.params.asset.clone()
        };
        let price = self.price_strict(&asset, now)?;

        let collateral = self.collateral_valuations(owner, &config, now)?;
        let mut debts = self.debt_valuations(owner, now)?;
        let new_debt_value = amount.try_mul(price)?;
        debts.push(DebtValuation {
            pool: pool_id.clone(),
            asset: asset.clone(),
            debt: amount,
            price: Some(price),
        });

        let total_debt_value = Self::total_debt_value(&debts)?;
        let capacity = health::borrow_capacity(&collateral)?;
        if total_debt_value > capacity {
            return Err(EngineError::InsufficientCollateral {
                owner: owner.clone(),
                required: total_debt_value,
                available: capacity,
            });
        }
        let hf_after = health::health_factor(&collateral, &debts)?;
        if hf_after.is_below(config.min_health_factor) {
            return Err(EngineError::HealthFactorTooLow {
                current: hf_after.as_finite().unwrap_or_else(Decimal::zero),
                required: config.min_health_factor,
            });
        }

        let discount_bps = config.discount_bps(owner);
        let receipt = {
            let mut pool = handle.lock().expect("pool lock");
            pool.borrow(owner, amount, discount_bps, now)?
        };
        tracing::info!(
            pool = %pool_id,
            owner = %owner,
            amount = %amount,
            value = %new_debt_value,
            discount_bps,
            seq = receipt.seq,
            "borrow"
        );
        Ok(OpReceipt {
            pool: pool_id.clone(),
            owner: owner.clone(),
            seq: receipt.seq,
            position: receipt.position,
            health_factor: Some(hf_after),
            applied: amount,
        })
    }

    pub fn repay(
        &self,
        pool_id: &PoolId,
        owner: &OwnerId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<OpReceipt> {
        let handle = self.pool_handle(pool_id)?;
        let (receipt, applied) = {
            let mut pool = handle.lock().expect("pool lock");
            pool.repay(owner, amount, now)?
        };
        let health_factor = self.health_factor(owner, now).ok();
        tracing::info!(pool = %pool_id, owner = %owner, applied = %applied, seq = receipt.seq, "repay");
        Ok(OpReceipt {
            pool: pool_id.clone(),
            owner: owner.clone(),
            seq: receipt.seq,
            position: receipt.position,
            health_factor,
            applied,
        })
    }

    /// Annual borrow rate a new position by `owner` would pay at the pool's
    /// current utilization, with their credit-tier discount applied.
    pub fn quote_borrow_rate(&self, pool_id: &PoolId, owner: &OwnerId) -> Result<Decimal> {
        let config = self.config_snapshot();
        let handle = self.pool_handle(pool_id)?;
        let (base_rate, _) = handle.lock().expect("pool lock").current_rates()?;
        Ok(palisade_rates::effective_borrow_rate(
            base_rate,
            config.discount_bps(owner),
        )?)
    }

    /// Pause or resume a pool (governance).
    pub fn set_pool_active(&self, pool_id: &PoolId, active: bool) -> Result<()> {
        let handle = self.pool_handle(pool_id)?;
        let mut pool = handle.lock().expect("pool lock");
        pool.params.active = active;
        tracing::info!(pool = %pool_id, active, "pool active flag changed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Collateral
    // ------------------------------------------------------------------

    /// Pledge collateral. Returns the new quantity on deposit.
    pub fn add_collateral(
        &self,
        owner: &OwnerId,
        asset: &AssetId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<Decimal> {
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount {
                reason: "amount must be positive".to_string(),
            });
        }
        let config = self.config_snapshot();
        // Only configured collateral assets are accepted.
        config.collateral_params(asset)?;

        let mut collateral = self.collateral.write().expect("collateral lock");
        let deposit = collateral
            .entry(owner.clone())
            .or_default()
            .entry(asset.clone())
            .or_insert_with(|| CollateralDeposit {
                asset: asset.clone(),
                quantity: Decimal::zero(),
                config_version: config.version,
            });
        deposit.quantity = deposit.quantity.try_add(amount)?;
        deposit.config_version = config.version;
        let quantity = deposit.quantity;
        drop(collateral);

        tracing::info!(owner = %owner, asset = %asset, amount = %amount, now, "collateral added");
        Ok(quantity)
    }

    /// Release collateral. Rejected before any mutation when the remaining
    /// collateral would leave the owner's health factor under the minimum.
    pub fn remove_collateral(
        &self,
        owner: &OwnerId,
        asset: &AssetId,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<Decimal> {
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount {
                reason: "amount must be positive".to_string(),
            });
        }
        let config = self.config_snapshot();
        let debts = self.debt_valuations(owner, now)?;

        let mut collateral = self.collateral.write().expect("collateral lock");
        let deposits = collateral
            .get_mut(owner)
            .ok_or_else(|| EngineError::UnknownOwner(owner.clone()))?;
        let available = deposits
            .get(asset)
            .ok_or_else(|| EngineError::UnknownAsset(asset.clone()))?
            .quantity;
        if amount > available {
            return Err(EngineError::InsufficientCollateral {
                owner: owner.clone(),
                required: amount,
                available,
            });
        }

        // Health check against the reduced deposit set, before mutating.
        let mut reduced: Vec<CollateralDeposit> = deposits.values().cloned().collect();
        if let Some(d) = reduced.iter_mut().find(|d| &d.asset == asset) {
            d.quantity = d.quantity.try_sub(amount)?;
        }
        let valuations = self.valuations_for(&reduced, &config, now)?;
        let hf = health::health_factor(&valuations, &debts)?;
        if hf.is_below(config.min_health_factor) {
            return Err(EngineError::HealthFactorTooLow {
                current: hf.as_finite().unwrap_or_else(Decimal::zero),
                required: config.min_health_factor,
            });
        }

        let deposit = deposits
            .get_mut(asset)
            .ok_or_else(|| EngineError::UnknownAsset(asset.clone()))?;
        deposit.quantity = deposit.quantity.try_sub(amount)?;
        let quantity = deposit.quantity;
        drop(collateral);

        tracing::info!(owner = %owner, asset = %asset, amount = %amount, "collateral removed");
        Ok(quantity)
    }

    // ------------------------------------------------------------------
    // Health & liquidation
    // ------------------------------------------------------------------

    /// Current health factor, recomputed from post-accrual balances and
    /// gated prices; never cached.
    pub fn health_factor(&self, owner: &OwnerId, now: Timestamp) -> Result<HealthFactor> {
        let config = self.config_snapshot();
        let collateral = self.collateral_valuations(owner, &config, now)?;
        let debts = self.debt_valuations(owner, now)?;
        health::health_factor(&collateral, &debts)
    }

    /// Evaluate one (owner, pool) pair against the liquidation cascade.
    pub fn evaluate(&self, owner: &OwnerId, pool_id: &PoolId, now: Timestamp) -> Result<EvaluationOutcome> {
        let config = self.config_snapshot();
        let pool_handle = self.pool_handle(pool_id)?;
        let pool_asset = {
            let pool = pool_handle.lock().expect("pool lock");
            pool.params.asset.clone()
        };

        // Hold the collateral lock across the whole evaluation so the
        // deposits a seizure was planned from cannot move underneath it.
        let mut collateral_map = self.collateral.write().expect("collateral lock");
        let deposits: Vec<CollateralDeposit> = collateral_map
            .get(owner)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();

        // Never liquidate on missing prices: every relevant asset must be
        // fully available.
        for asset in deposits
            .iter()
            .filter(|d| !d.quantity.is_zero())
            .map(|d| &d.asset)
            .chain(std::iter::once(&pool_asset))
        {
            if !self.price_read(asset, now)?.is_available() {
                tracing::warn!(owner = %owner, pool = %pool_id, asset = %asset, "evaluation deferred: price unavailable");
                return Ok(EvaluationOutcome::Deferred {
                    reason: DeferralReason::OracleUnavailable {
                        asset: asset.clone(),
                    },
                });
            }
        }

        let valuations = self.valuations_for(&deposits, &config, now)?;
        let debts = self.debt_valuations(owner, now)?;
        let hf = health::health_factor(&valuations, &debts)?;

        let hf_value = match hf {
            HealthFactor::NoDebt => {
                self.cooldowns.lock().expect("cooldowns lock").clear(owner, pool_id);
                return Ok(EvaluationOutcome::Healthy { health_factor: hf });
            }
            HealthFactor::Finite(v) => v,
        };
        let tier = match LiquidationTier::from_health_factor(hf_value) {
            None => {
                self.cooldowns.lock().expect("cooldowns lock").clear(owner, pool_id);
                return Ok(EvaluationOutcome::Healthy { health_factor: hf });
            }
            Some(t) => t,
        };

        if !tier.seizes() {
            tracing::warn!(owner = %owner, pool = %pool_id, health_factor = %hf_value, "margin call");
            return Ok(EvaluationOutcome::MarginCall {
                health_factor: hf_value,
            });
        }

        if !self
            .cooldowns
            .lock()
            .expect("cooldowns lock")
            .permits(owner, pool_id, tier, now)
        {
            tracing::debug!(owner = %owner, pool = %pool_id, tier = tier.as_str(), "evaluation deferred: cooldown");
            return Ok(EvaluationOutcome::Deferred {
                reason: DeferralReason::Cooldown,
            });
        }

        // Execute under the debt pool's lock: re-accrue, re-read the debt,
        // seize, repay. This is the same lock ordinary mutations take, so a
        // concurrent repay cannot slip between computation and seizure.
        let pool_price = self.price_strict(&pool_asset, now)?;
        let (applied_amount, applied, plan, hf_after) = {
            let mut pool = pool_handle.lock().expect("pool lock");
            pool.accrue(now)?;
            let debt = pool.borrow_debt(owner)?;
            if debt.is_zero() {
                self.cooldowns.lock().expect("cooldowns lock").clear(owner, pool_id);
                return Ok(EvaluationOutcome::Healthy {
                    health_factor: HealthFactor::NoDebt,
                });
            }

            let repay_amount = debt.try_mul(tier.repay_fraction())?;
            let repay_value = repay_amount.try_mul(pool_price)?;

            let seizables: Vec<SeizableCollateral> = valuations
                .iter()
                .filter_map(|v| {
                    let price = v.price?;
                    let params = config.collateral_params(&v.asset).ok()?;
                    Some(SeizableCollateral {
                        asset: v.asset.clone(),
                        quantity: v.quantity,
                        price,
                        penalty: params.liquidation_penalty,
                    })
                })
                .collect();
            let plan = plan_seizure(repay_value, &seizables)?;

            let covered_amount = plan.covered_value.try_div(pool_price)?;
            let applied = pool.apply_liquidation(owner, repay_amount, covered_amount, now)?;
            pool.credit_liquidator_reward(plan.penalty_total)?;

            // Post-seizure health factor from the updated balances.
            let mut debts_after = debts.clone();
            if let Some(d) = debts_after.iter_mut().find(|d| &d.pool == pool_id) {
                d.debt = applied.position.debt;
            }
            let mut valuations_after = valuations.clone();
            for seized in &plan.seized {
                if let Some(v) = valuations_after.iter_mut().find(|v| v.asset == seized.asset) {
                    v.quantity = v.quantity.saturating_sub(seized.quantity);
                }
            }
            let hf_after = health::health_factor(&valuations_after, &debts_after)?;
            (repay_amount, applied, plan, hf_after)
        };

        // Take the seized quantities out of the held collateral map.
        if let Some(deposits) = collateral_map.get_mut(owner) {
            for seized in &plan.seized {
                if let Some(d) = deposits.get_mut(&seized.asset) {
                    d.quantity = d.quantity.saturating_sub(seized.quantity);
                }
            }
        }
        drop(collateral_map);

        self.cooldowns.lock().expect("cooldowns lock").arm(
            owner,
            pool_id,
            tier,
            now,
            config.liquidation.cooldown_secs,
        );

        let event = LiquidationEvent {
            id: 0,
            borrower: owner.clone(),
            pool: pool_id.clone(),
            tier,
            debt_repaid: applied_amount,
            penalty_paid: plan.penalty_total,
            seized: plan.seized.clone(),
            reserves_used: applied.reserves_used,
            bad_debt: applied.bad_debt_added,
            health_factor_before: hf_value,
            health_factor_after: hf_after,
            timestamp: now,
            config_version: config.version,
        };
        let event_id = self.events.lock().expect("events lock").append(event);

        tracing::warn!(
            owner = %owner,
            pool = %pool_id,
            tier = tier.as_str(),
            debt_repaid = %applied_amount,
            bad_debt = %applied.bad_debt_added,
            event_id,
            "liquidation executed"
        );

        Ok(EvaluationOutcome::Executed {
            event_id,
            tier,
            debt_repaid: applied_amount,
            health_factor_after: hf_after,
        })
    }

    /// Sweep every borrower of every pool through the cascade. Evaluations
    /// are independent; a caller may stop consuming mid-scan without
    /// correctness impact.
    pub fn scan(&self, now: Timestamp) -> Vec<(OwnerId, PoolId, Result<EvaluationOutcome>)> {
        let pool_ids: Vec<PoolId> = self.pools.read().expect("pools lock").keys().cloned().collect();
        let mut results = Vec::new();
        for pool_id in pool_ids {
            let Ok(handle) = self.pool_handle(&pool_id) else {
                continue;
            };
            let borrowers: Vec<OwnerId> = {
                let pool = handle.lock().expect("pool lock");
                pool.borrowers()
            };
            for owner in borrowers {
                let outcome = self.evaluate(&owner, &pool_id, now);
                results.push((owner, pool_id.clone(), outcome));
            }
        }
        results
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn pool_ids(&self) -> Vec<PoolId> {
        self.pools.read().expect("pools lock").keys().cloned().collect()
    }

    pub fn pool_state(&self, pool_id: &PoolId) -> Result<PoolStateView> {
        let handle = self.pool_handle(pool_id)?;
        let pool = handle.lock().expect("pool lock");
        let utilization = pool.utilization()?;
        let (borrow_rate, supply_rate) = pool.current_rates()?;
        Ok(PoolStateView {
            pool: pool.id.clone(),
            asset: pool.params.asset.clone(),
            total_supply: pool.total_supply,
            total_borrow: pool.total_borrow,
            available_liquidity: pool.available_liquidity(),
            utilization,
            borrow_rate,
            supply_rate,
            borrow_index: pool.borrow_index,
            supply_index: pool.supply_index,
            reserves: pool.reserves,
            liquidator_rewards: pool.liquidator_rewards,
            bad_debt: pool.bad_debt,
            last_accrual_ts: pool.last_accrual_ts,
            active: pool.params.active,
            frozen: pool.frozen,
            seq: pool.seq,
            config_version: pool.config_version,
        })
    }

    /// All of an owner's positions, post-accrual, with their health factor.
    pub fn positions(&self, owner: &OwnerId, now: Timestamp) -> Result<OwnerPositions> {
        let pool_ids: Vec<PoolId> = self.pools.read().expect("pools lock").keys().cloned().collect();
        let mut pools = Vec::new();
        for pool_id in pool_ids {
            let handle = self.pool_handle(&pool_id)?;
            let mut pool = handle.lock().expect("pool lock");
            pool.accrue(now)?;
            let supplied = pool.supply_value(owner)?;
            let debt = pool.borrow_debt(owner)?;
            if !supplied.is_zero() || !debt.is_zero() {
                pools.push(OwnerPoolPosition {
                    pool: pool_id.clone(),
                    supplied,
                    debt,
                });
            }
        }
        let collateral: Vec<CollateralDeposit> = self
            .collateral
            .read()
            .expect("collateral lock")
            .get(owner)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        let health_factor = self.health_factor(owner, now)?;
        Ok(OwnerPositions {
            owner: owner.clone(),
            pools,
            collateral,
            health_factor,
        })
    }

    pub fn list_liquidation_events(
        &self,
        filter: &EventFilter,
        page: Pagination,
    ) -> (Vec<LiquidationEvent>, usize) {
        self.events.lock().expect("events lock").query(filter, page)
    }

    // ------------------------------------------------------------------
    // Valuation plumbing
    // ------------------------------------------------------------------

    fn collateral_valuations(
        &self,
        owner: &OwnerId,
        config: &RiskConfig,
        now: Timestamp,
    ) -> Result<Vec<CollateralValuation>> {
        let deposits: Vec<CollateralDeposit> = self
            .collateral
            .read()
            .expect("collateral lock")
            .get(owner)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        self.valuations_for(&deposits, config, now)
    }

    fn valuations_for(
        &self,
        deposits: &[CollateralDeposit],
        config: &RiskConfig,
        now: Timestamp,
    ) -> Result<Vec<CollateralValuation>> {
        let mut valuations = Vec::with_capacity(deposits.len());
        for deposit in deposits {
            if deposit.quantity.is_zero() {
                continue;
            }
            let params: &CollateralParams = config.collateral_params(&deposit.asset)?;
            let price = self.price_read(&deposit.asset, now)?.for_collateral();
            valuations.push(CollateralValuation {
                asset: deposit.asset.clone(),
                quantity: deposit.quantity,
                price,
                max_ltv: params.max_ltv,
                liquidation_threshold: params.liquidation_threshold,
                haircut: params.haircut,
            });
        }
        Ok(valuations)
    }

    /// Accrue and read the owner's debt in every pool, one pool lock at a
    /// time in ascending pool-id order.
    fn debt_valuations(&self, owner: &OwnerId, now: Timestamp) -> Result<Vec<DebtValuation>> {
        let pool_ids: Vec<PoolId> = self.pools.read().expect("pools lock").keys().cloned().collect();
        let mut debts = Vec::new();
        for pool_id in pool_ids {
            let handle = self.pool_handle(&pool_id)?;
            let (debt, asset) = {
                let mut pool = handle.lock().expect("pool lock");
                pool.accrue(now)?;
                (pool.borrow_debt(owner)?, pool.params.asset.clone())
            };
            if debt.is_zero() {
                continue;
            }
            let price = self.price_read(&asset, now)?.for_debt();
            debts.push(DebtValuation {
                pool: pool_id,
                asset,
                debt,
                price,
            });
        }
        Ok(debts)
    }

    fn total_debt_value(debts: &[DebtValuation]) -> Result<Decimal> {
        let mut total = Decimal::zero();
        for d in debts {
            let price = d.price.ok_or_else(|| EngineError::CircuitBreakerOpen {
                asset: d.asset.clone(),
            })?;
            total = total.try_add(d.debt.try_mul(price)?)?;
        }
        Ok(total)
    }
}
