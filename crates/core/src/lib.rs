//! TradeGate Core Types
//!
//! Identifiers, amounts and the trade command shared by the settlement
//! gateways and the orchestrator, plus the pure hashing used to derive the
//! idempotency reference and the signal digests.

mod error;
mod hash;
mod trade;
mod types;

pub use error::*;
pub use hash::*;
pub use trade::*;
pub use types::*;
