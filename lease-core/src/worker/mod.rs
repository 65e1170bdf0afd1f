//! Worker-side logic
//!
//! Lease channel abstraction, gRPC client, token processors and the
//! Get/Done state machine.

pub mod channel;
pub mod client;
pub mod processor;
pub mod state;

pub use channel::LeaseChannel;
pub use client::{ClientConfig, CoordinatorClient};
pub use processor::{CopyProcessor, DelayProcessor, TokenProcessor, TokenRecord};
pub use state::{write_report, LoopConfig, StopReason, WorkerLoop, WorkerPhase, WorkerSummary};
