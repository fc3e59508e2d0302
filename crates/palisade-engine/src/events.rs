//! Append-only liquidation event log.

use serde::Serialize;

use palisade_core::{AssetId, OwnerId, PoolId, Timestamp};
use palisade_math::Decimal;

use crate::health::HealthFactor;
use crate::liquidation::LiquidationTier;

/// One collateral asset seized in a liquidation.
#[derive(Debug, Clone, Serialize)]
pub struct SeizedCollateral {
    pub asset: AssetId,
    pub quantity: Decimal,
    pub value: Decimal,
}

/// Immutable record of one liquidation action. Written once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct LiquidationEvent {
    /// Engine-wide event id, monotonically increasing.
    pub id: u64,
    pub borrower: OwnerId,
    pub pool: PoolId,
    pub tier: LiquidationTier,
    pub debt_repaid: Decimal,
    pub penalty_paid: Decimal,
    pub seized: Vec<SeizedCollateral>,
    /// Shortfall absorbed by pool reserves.
    pub reserves_used: Decimal,
    /// Shortfall recorded as bad debt after reserves ran out.
    pub bad_debt: Decimal,
    pub health_factor_before: Decimal,
    pub health_factor_after: HealthFactor,
    pub timestamp: Timestamp,
    /// Risk-config snapshot the evaluation priced against.
    pub config_version: u32,
}

/// Page request for event queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// Filter for event queries; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub owner: Option<OwnerId>,
    pub pool: Option<PoolId>,
}

impl EventFilter {
    fn matches(&self, event: &LiquidationEvent) -> bool {
        self.owner
            .as_ref()
            .map(|o| &event.borrower == o)
            .unwrap_or(true)
            && self.pool.as_ref().map(|p| &event.pool == p).unwrap_or(true)
    }
}

/// In-memory append-only log. The persistence collaborator mirrors it; this
/// engine only requires ordered, write-once semantics.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<LiquidationEvent>,
    next_id: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next id and append. Returns the assigned id.
    pub fn append(&mut self, mut event: LiquidationEvent) -> u64 {
        self.next_id += 1;
        event.id = self.next_id;
        let id = event.id;
        self.events.push(event);
        id
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filtered page plus the total number of matches.
    pub fn query(&self, filter: &EventFilter, page: Pagination) -> (Vec<LiquidationEvent>, usize) {
        let matched: Vec<&LiquidationEvent> =
            self.events.iter().filter(|e| filter.matches(e)).collect();
        let total = matched.len();
        let page_items = matched
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();
        (page_items, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(borrower: &str, pool: &str) -> LiquidationEvent {
        LiquidationEvent {
            id: 0,
            borrower: OwnerId::new(borrower),
            pool: PoolId::new(pool),
            tier: LiquidationTier::SoftLiquidation,
            debt_repaid: Decimal::from_integer(100),
            penalty_paid: Decimal::from_integer(6),
            seized: vec![],
            reserves_used: Decimal::zero(),
            bad_debt: Decimal::zero(),
            health_factor_before: "0.92".parse().unwrap(),
            health_factor_after: HealthFactor::Finite("0.97".parse().unwrap()),
            timestamp: 1_000,
            config_version: 1,
        }
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let mut log = EventLog::new();
        assert_eq!(log.append(event("alice", "usdc")), 1);
        assert_eq!(log.append(event("bob", "usdc")), 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_query_filters_by_owner_and_pool() {
        let mut log = EventLog::new();
        log.append(event("alice", "usdc"));
        log.append(event("alice", "weth"));
        log.append(event("bob", "usdc"));

        let (items, total) = log.query(
            &EventFilter {
                owner: Some(OwnerId::new("alice")),
                pool: None,
            },
            Pagination::default(),
        );
        assert_eq!(total, 2);
        assert!(items.iter().all(|e| e.borrower.as_str() == "alice"));

        let (items, total) = log.query(
            &EventFilter {
                owner: Some(OwnerId::new("alice")),
                pool: Some(PoolId::new("weth")),
            },
            Pagination::default(),
        );
        assert_eq!(total, 1);
        assert_eq!(items[0].pool.as_str(), "weth");
    }

    #[test]
    fn test_pagination() {
        let mut log = EventLog::new();
        for _ in 0..5 {
            log.append(event("alice", "usdc"));
        }
        let (items, total) = log.query(
            &EventFilter::default(),
            Pagination {
                offset: 3,
                limit: 10,
            },
        );
        assert_eq!(total, 5);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 4);
    }
}
