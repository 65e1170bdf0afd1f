//! Graceful shutdown handling
//!
//! Watch-based signal: once triggered it stays triggered, so tasks that
//! start waiting late still observe it.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable shutdown trigger
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Trigger shutdown for every waiter
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once shutdown has been triggered
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // Sender lives in self, so this only errors if it was dropped
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }

    /// Trigger shutdown on Ctrl-C
    pub fn trigger_on_ctrl_c(&self) {
        let signal = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received, shutting down");
                signal.shutdown();
            }
        });
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
