//! Coordinator side of the lease protocol
//!
//! Holds the token pool, per-job ledgers and the gRPC service.

pub mod leader;
pub mod ledger;
pub mod pool;

pub use leader::{CoordinatorConfig, LeaseServer};
pub use ledger::TokenLedger;
pub use pool::TokenPool;
