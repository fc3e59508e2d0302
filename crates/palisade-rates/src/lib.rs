//! Rate Curve & Credit Pricing
//!
//! Pure math, no state: utilization, the jump-rate borrow curve, the derived
//! supply rate, and the credit-tier discount applied to a borrower's rate.

mod credit;
mod curve;

pub use credit::effective_borrow_rate;
pub use curve::{borrow_rate, supply_rate, utilization};
