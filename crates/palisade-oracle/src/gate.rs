//! Per-asset price gate and circuit breaker.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use palisade_core::{AssetId, EngineError, OracleParams, Result, Timestamp};
use palisade_math::{Decimal, BPS_PER_UNIT};

/// One price report from the price collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub price: Decimal,
    pub confidence: Decimal,
    /// When the source produced the price.
    pub source_ts: Timestamp,
    /// When this engine received it.
    pub ingested_at: Timestamp,
}

/// Circuit breaker state.
///
/// `Closed` admits observations; a deviant one trips to `Open`, where all
/// reads return unavailable. Governance moves `Open` to `HalfOpen`, and the
/// gate closes again only after one fresh, in-bound observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Result of a price read.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceRead {
    Available(Decimal),
    Unavailable { last_good: Option<Decimal> },
}

impl PriceRead {
    /// Price usable for collateral valuation. Unavailable collateral is
    /// worth nothing for borrowing-power purposes, never estimated.
    pub fn for_collateral(&self) -> Option<Decimal> {
        match self {
            Self::Available(p) => Some(*p),
            Self::Unavailable { .. } => None,
        }
    }

    /// Price usable for debt valuation. Falls back to the last good price so
    /// an outage can never shrink reported debt.
    pub fn for_debt(&self) -> Option<Decimal> {
        match self {
            Self::Available(p) => Some(*p),
            Self::Unavailable { last_good } => *last_good,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Gate for one asset's price feed.
#[derive(Debug)]
pub struct OracleGate {
    asset: AssetId,
    params: OracleParams,
    /// Accepted observations inside the TWAP window: (source_ts, price).
    window: VecDeque<(Timestamp, Decimal)>,
    breaker: BreakerState,
    last_good: Option<(Timestamp, Decimal)>,
    rejected: u64,
}

impl OracleGate {
    pub fn new(asset: AssetId, params: OracleParams) -> Self {
        Self {
            asset,
            params,
            window: VecDeque::new(),
            breaker: BreakerState::Closed,
            last_good: None,
            rejected: 0,
        }
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub fn breaker(&self) -> BreakerState {
        self.breaker
    }

    /// Observations rejected since construction, for operator dashboards.
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Source timestamp of the newest accepted observation.
    pub fn last_updated(&self) -> Option<Timestamp> {
        self.last_good.map(|(ts, _)| ts)
    }

    pub fn max_staleness(&self) -> u64 {
        self.params.max_staleness_secs
    }

    /// Validate and apply one observation.
    ///
    /// Stale observations are rejected without touching gate state (beyond
    /// the rejection counter). A deviation beyond the configured bound trips
    /// the breaker. In `HalfOpen`, one in-bound fresh observation closes the
    /// breaker; a deviant one re-opens it.
    pub fn ingest(&mut self, obs: PriceObservation, now: Timestamp) -> Result<()> {
        if self.breaker == BreakerState::Open {
            self.rejected += 1;
            return Err(EngineError::CircuitBreakerOpen {
                asset: self.asset.clone(),
            });
        }

        let staleness = now.saturating_sub(obs.source_ts);
        if staleness > self.params.max_staleness_secs {
            self.rejected += 1;
            tracing::warn!(
                asset = %self.asset,
                staleness,
                max = self.params.max_staleness_secs,
                "rejected stale price observation"
            );
            return Err(EngineError::StaleOracle {
                asset: self.asset.clone(),
                staleness,
                max_staleness: self.params.max_staleness_secs,
            });
        }

        if let Some(twap) = self.twap(now) {
            if Self::deviation_exceeds(obs.price, twap, self.params.max_deviation_bps) {
                self.rejected += 1;
                self.breaker = BreakerState::Open;
                tracing::warn!(
                    asset = %self.asset,
                    price = %obs.price,
                    twap = %twap,
                    "price deviation tripped circuit breaker"
                );
                return Err(EngineError::CircuitBreakerOpen {
                    asset: self.asset.clone(),
                });
            }
        }

        if self.breaker == BreakerState::HalfOpen {
            self.breaker = BreakerState::Closed;
            tracing::info!(asset = %self.asset, "circuit breaker closed");
        }

        self.window.push_back((obs.source_ts, obs.price));
        self.last_good = Some((obs.source_ts, obs.price));
        self.trim(now);
        Ok(())
    }

    /// Current usable price.
    ///
    /// Unavailable while the breaker is not closed, and once the newest
    /// accepted observation itself has gone past the staleness bound.
    pub fn price(&self, now: Timestamp) -> PriceRead {
        let last_good = self.last_good.map(|(_, p)| p);
        if self.breaker != BreakerState::Closed {
            return PriceRead::Unavailable { last_good };
        }
        match self.last_good {
            Some((ts, price)) if now.saturating_sub(ts) <= self.params.max_staleness_secs => {
                PriceRead::Available(price)
            }
            _ => PriceRead::Unavailable { last_good },
        }
    }

    /// Rolling time-weighted average over the accepted window, each
    /// observation weighted by the interval until the next one (the newest
    /// runs until `now`). None when the window is empty.
    pub fn twap(&self, now: Timestamp) -> Option<Decimal> {
        let mut weighted = Decimal::zero();
        let mut total_secs: u64 = 0;

        let mut iter = self.window.iter().peekable();
        while let Some(&(ts, price)) = iter.next() {
            let end = match iter.peek() {
                Some(&&(next_ts, _)) => next_ts,
                None => now.max(ts),
            };
            // Zero-length intervals still count one second so a burst of
            // same-timestamp observations cannot erase the window.
            let dt = end.saturating_sub(ts).max(1);
            weighted = weighted.try_add(price.try_mul_int(dt).ok()?).ok()?;
            total_secs += dt;
        }

        if total_secs == 0 {
            return None;
        }
        weighted.try_div_int(total_secs).ok()
    }

    /// Governance action: begin recovery from a tripped breaker. Returns the
    /// resulting state; a no-op unless the breaker is `Open`.
    pub fn reset(&mut self) -> BreakerState {
        if self.breaker == BreakerState::Open {
            self.breaker = BreakerState::HalfOpen;
            tracing::info!(asset = %self.asset, "circuit breaker reset to half-open");
        }
        self.breaker
    }

    fn deviation_exceeds(price: Decimal, twap: Decimal, max_bps: u64) -> bool {
        if twap.is_zero() {
            return false;
        }
        let diff = price.max(twap).saturating_sub(price.min(twap));
        // |price - twap| / twap > max_bps / 10_000, in cross-multiplied form
        // to stay in integer arithmetic.
        match (
            diff.try_mul_int(BPS_PER_UNIT),
            twap.try_mul_int(max_bps),
        ) {
            (Ok(lhs), Ok(rhs)) => lhs > rhs,
            // Overflow here means an absurd price; treat as deviant.
            _ => true,
        }
    }

    fn trim(&mut self, now: Timestamp) {
        let cutoff = now.saturating_sub(self.params.twap_window_secs);
        while let Some(&(ts, _)) = self.window.front() {
            if ts < cutoff && self.window.len() > 1 {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}
