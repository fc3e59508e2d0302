//! Oracle Gate
//!
//! Validates incoming price observations for staleness and deviation against
//! a rolling TWAP, and holds a per-asset circuit breaker. Downstream
//! valuation never sees a price this gate has not accepted: while the breaker
//! is open the asset is unpriceable, which collateral valuation treats as
//! worthless and debt valuation prices at the last good observation (debt is
//! never understated by a missing price).

mod gate;

pub use gate::{BreakerState, OracleGate, PriceObservation, PriceRead};
