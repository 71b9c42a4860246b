use std::sync::Arc;

use tokio::sync::watch;

use rolegate_core::{AppError, AppResult};

/// Process-wide "system ready" signal.
///
/// Clones share one flag. Once marked ready it stays ready.
#[derive(Debug, Clone)]
pub struct SystemReadyGate {
    sender: Arc<watch::Sender<bool>>,
}

impl SystemReadyGate {
    /// Creates a gate that is not ready yet.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Marks the process ready and wakes every waiter.
    pub fn mark_ready(&self) {
        self.sender.send_replace(true);
    }

    /// Returns the current readiness.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.sender.borrow()
    }

    /// Suspends until the process is ready.
    pub async fn wait_until_ready(&self) -> AppResult<()> {
        let mut receiver = self.sender.subscribe();
        receiver
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|error| AppError::Internal(format!("readiness signal closed: {error}")))
    }
}

impl Default for SystemReadyGate {
    fn default() -> Self {
        Self::new()
    }
}
