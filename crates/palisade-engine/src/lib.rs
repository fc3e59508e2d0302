//! Palisade risk engine: pooled interest accrual, health factors, and the
//! graduated liquidation cascade.
//!
//! The engine is deliberately free of I/O and clocks: callers supply
//! timestamps, the price collaborator supplies observations, and the
//! persistence collaborator replays receipts and events. See the crate-level
//! modules for the serialization discipline each piece relies on.

pub mod engine;
pub mod events;
pub mod health;
pub mod ledger;
pub mod liquidation;
pub mod pool;
pub mod position;

pub use engine::{
    DeferralReason, Engine, EvaluationOutcome, OpReceipt, OwnerPoolPosition, OwnerPositions,
    PoolStateView,
};
pub use events::{EventFilter, LiquidationEvent, Pagination, SeizedCollateral};
pub use health::HealthFactor;
pub use ledger::PositionSnapshot;
pub use liquidation::LiquidationTier;
pub use pool::{AccrualOutcome, Pool};
pub use position::{BorrowPosition, CollateralDeposit, SupplyPosition};
