//! One-shot fatal shutdown signal.
//!
//! The engine raises it when the provisioning backend is declared unusable;
//! the host process decides how to exit. Raising twice is a no-op.

use tokio::sync::watch;

/// Cloneable sender side of the fatal signal.
#[derive(Debug, Clone)]
pub struct FatalSignal {
    tx: watch::Sender<bool>,
}

impl FatalSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Raise the signal. Returns `true` only for the call that raised it.
    pub fn raise(&self) -> bool {
        self.tx.send_if_modified(|raised| {
            if *raised {
                false
            } else {
                *raised = true;
                true
            }
        })
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe for the raise notification.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolve once the signal has been raised.
    pub async fn raised(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` cannot fail here.
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

impl Default for FatalSignal {
    fn default() -> Self {
        Self::new()
    }
}
