//! Service facade over the Palisade engine.
//!
//! The transport layer lives with the API collaborator; this crate only
//! provides the shared state handle and the serializable request/response
//! shapes it consumes.

pub mod dto;
pub mod state;

pub use dto::{ApiError, EventInfo, OperationResponse, PoolInfo, PositionsResponse};
pub use state::{EngineState, ScanSummary};
