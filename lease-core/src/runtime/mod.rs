//! Process lifecycle helpers
//!
//! Shutdown signalling shared by the gRPC server and background tasks.

pub mod shutdown;

pub use shutdown::ShutdownSignal;
