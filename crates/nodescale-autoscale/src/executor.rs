//! Fires scaling events and waits for scale-ups to land.
//!
//! Only scale-ups are verified: after asking the provisioner for a node,
//! the executor polls the node set until it grows past the baseline or the
//! attempt's deadline passes. Consecutive timeouts count against the
//! backend failure budget; a confirmed scale-up resets it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use nodescale_core::{FatalSignal, NodeSet, Provisioner};

use crate::decision::ScaleKind;
use crate::error::AutoscaleError;

/// Result of one [`ScaleExecutor::fire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Scale-down requested; never verified.
    ScaledDown,
    /// The node set grew to `nodes` during the wait.
    ScaleUpConfirmed { nodes: usize },
    /// The wait ran out; `failures` consecutive timeouts so far.
    ScaleUpTimedOut { failures: u32 },
    /// The failure budget is spent and the fatal signal is raised.
    BudgetExceeded { failures: u32 },
    /// Shutdown interrupted the wait. Not counted as a failure.
    Aborted,
}

enum WaitResult {
    Grown(usize),
    TimedOut,
    Aborted,
}

pub struct ScaleExecutor {
    provisioner: Arc<dyn Provisioner>,
    nodes: NodeSet,
    fatal: FatalSignal,
    shutdown: watch::Receiver<bool>,
    scale_up_timeout: Duration,
    check_period: Duration,
    max_backend_failure: u32,
    /// Consecutive scale-up timeouts, reset by any confirmed scale-up.
    backend_failures: u32,
}

impl ScaleExecutor {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        nodes: NodeSet,
        fatal: FatalSignal,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            provisioner,
            nodes,
            fatal,
            shutdown,
            scale_up_timeout: Duration::from_secs(600),
            check_period: Duration::from_secs(60),
            max_backend_failure: 3,
            backend_failures: 0,
        }
    }

    /// Set how long a scale-up may take before it counts as failed.
    pub fn with_scale_up_timeout(mut self, timeout: Duration) -> Self {
        self.scale_up_timeout = timeout;
        self
    }

    /// Set how often the node count is polled during a scale-up wait.
    pub fn with_check_period(mut self, period: Duration) -> Self {
        self.check_period = period;
        self
    }

    /// Set how many consecutive scale-up timeouts are tolerated.
    pub fn with_max_backend_failure(mut self, max: u32) -> Self {
        self.max_backend_failure = max;
        self
    }

    pub fn backend_failures(&self) -> u32 {
        self.backend_failures
    }

    /// Fire one scaling event.
    ///
    /// `baseline` is the node count a scale-up must exceed to be confirmed.
    pub async fn fire(&mut self, kind: ScaleKind, baseline: usize) -> FireOutcome {
        info!(%kind, provisioner = %self.provisioner.kind(), "firing scaling");

        match kind {
            ScaleKind::Down => {
                self.provisioner.scale_down();
                FireOutcome::ScaledDown
            }
            ScaleKind::Up => {
                self.provisioner.scale_up();
                info!(baseline, timeout = ?self.scale_up_timeout, "waiting for scale up");
                self.settle_scale_up(baseline).await
            }
        }
    }

    async fn settle_scale_up(&mut self, baseline: usize) -> FireOutcome {
        match self.wait_for_scale_up(baseline).await {
            WaitResult::Grown(nodes) => {
                self.backend_failures = 0;
                info!(nodes, "scale up finished");
                FireOutcome::ScaleUpConfirmed { nodes }
            }
            WaitResult::Aborted => {
                info!("scale up wait aborted by shutdown");
                FireOutcome::Aborted
            }
            WaitResult::TimedOut => {
                self.backend_failures += 1;
                let err = AutoscaleError::ScaleUpTimeout(self.scale_up_timeout);
                warn!(error = %err, failures = self.backend_failures, "waiting for scale up timed out");

                if self.backend_failures > self.max_backend_failure {
                    let err = AutoscaleError::BackendFailureBudgetExceeded {
                        failures: self.backend_failures,
                        max: self.max_backend_failure,
                    };
                    if self.fatal.raise() {
                        error!(error = %err, "provisioning backend unusable, requesting shutdown");
                    }
                    return FireOutcome::BudgetExceeded {
                        failures: self.backend_failures,
                    };
                }

                FireOutcome::ScaleUpTimedOut {
                    failures: self.backend_failures,
                }
            }
        }
    }

    /// Poll the node set until it exceeds `baseline`, the deadline passes,
    /// or shutdown is requested. The deadline is fixed when the wait starts.
    async fn wait_for_scale_up(&mut self, baseline: usize) -> WaitResult {
        let deadline = Instant::now() + self.scale_up_timeout;

        loop {
            if *self.shutdown.borrow() {
                return WaitResult::Aborted;
            }

            let current = self.nodes.len().await;
            if current > baseline {
                return WaitResult::Grown(current);
            }

            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    // A dropped sender means the host is gone too.
                    if changed.is_err() || *self.shutdown.borrow() {
                        return WaitResult::Aborted;
                    }
                }
                _ = tokio::time::sleep_until(deadline) => return WaitResult::TimedOut,
                _ = tokio::time::sleep(self.check_period) => {}
            }
        }
    }
}
