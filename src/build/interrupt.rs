//! Build interruption
//!
//! One Ctrl-C listener per process feeds an [`Interrupt`] that every running
//! build watches. A build that sees it kills its container or driver process
//! and returns `Interrupted`. A second Ctrl-C exits right away.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Exit status after a second Ctrl-C, as a shell reports SIGINT
const SIGINT_EXIT: i32 = 130;

/// Shared, clonable interruption flag
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
}

impl Interrupt {
    /// A flag only [`trigger`](Self::trigger) sets
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// A flag set by the first Ctrl-C the process receives.
    ///
    /// Must be called inside a Tokio runtime, and only once per process.
    pub fn on_ctrl_c() -> Self {
        let interrupt = Self::new();
        let handle = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("Interrupted, stopping builds (Ctrl-C again to exit now)");
            handle.trigger();

            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(SIGINT_EXIT);
            }
        });
        interrupt
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the flag is set; immediately if it already is
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns once set
        let _ = rx.wait_for(|set| *set).await;
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}
