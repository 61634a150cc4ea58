//! Debounced alarm state machine.
//!
//! Pure value-in/value-out transitions over an explicit pending/fired pair.
//! Time is passed in by the caller, so tests drive it without timers.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::decision::{ScaleDecision, ScaleKind};

/// Timing knobs of the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmWindows {
    /// Dwell time before a pending event may fire.
    pub window: Duration,
    /// Minimum spacing between two fires, counted from fire completion.
    pub cool_down: Duration,
    /// Lifetime of a pending event that is no longer confirmed.
    pub cancel_window: Duration,
}

/// An alarm that has been observed but not fired yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEvent {
    pub kind: ScaleKind,
    pub first_observed_at: Instant,
    pub fire_at: Instant,
    pub cancel_at: Instant,
}

impl PendingEvent {
    fn new(kind: ScaleKind, now: Instant, windows: &AlarmWindows) -> Self {
        Self {
            kind,
            first_observed_at: now,
            fire_at: now + windows.window,
            cancel_at: now + windows.cancel_window,
        }
    }
}

/// The most recent event that actually fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredEvent {
    pub kind: ScaleKind,
    pub fired_at: Instant,
    pub allow_next_fire_at: Instant,
}

/// What a single evaluation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmAction {
    /// Nothing pending and nothing to do.
    Idle,
    /// A new pending event was created, replacing one of another kind if any.
    Armed {
        kind: ScaleKind,
        replaced: Option<ScaleKind>,
    },
    /// Same kind confirmed, alarm window not over yet.
    Waiting(ScaleKind),
    /// Alarm window over, but the previous fire's cooldown still applies.
    CoolingDown(ScaleKind),
    /// Signal is normal again; the pending event is left to expire.
    Decaying(ScaleKind),
    /// The pending event expired without firing.
    Cancelled(ScaleKind),
    /// The caller must fire this kind now, then call `record_fired`.
    Fire(ScaleKind),
}

/// At most one pending and one fired event.
#[derive(Debug, Clone)]
pub struct AlarmState {
    windows: AlarmWindows,
    pending: Option<PendingEvent>,
    fired: Option<FiredEvent>,
}

impl AlarmState {
    pub fn new(windows: AlarmWindows) -> Self {
        Self {
            windows,
            pending: None,
            fired: None,
        }
    }

    pub fn pending(&self) -> Option<&PendingEvent> {
        self.pending.as_ref()
    }

    pub fn last_fired(&self) -> Option<&FiredEvent> {
        self.fired.as_ref()
    }

    /// Advance the machine with this cycle's decision.
    ///
    /// Returns [`AlarmAction::Fire`] at most once per pending event; the
    /// pending event is cleared when it does.
    pub fn evaluate(&mut self, decision: ScaleDecision, now: Instant) -> AlarmAction {
        let Some(kind) = decision.kind() else {
            return self.decay(now);
        };

        let mut pending = match self.pending {
            Some(pending) if pending.kind == kind => pending,
            other => {
                let replaced = other.map(|p| p.kind);
                self.pending = Some(PendingEvent::new(kind, now, &self.windows));
                debug!(%kind, ?replaced, "alarm armed");
                return AlarmAction::Armed { kind, replaced };
            }
        };

        let window_over = now >= pending.fire_at;
        let cooled_down = self
            .fired
            .is_none_or(|fired| now >= fired.allow_next_fire_at);

        if window_over && cooled_down {
            debug!(
                %kind,
                observed_for = ?now.saturating_duration_since(pending.first_observed_at),
                "alarm fires"
            );
            self.pending = None;
            return AlarmAction::Fire(kind);
        }

        // Still confirmed: keep the alarm alive.
        pending.cancel_at = now + self.windows.cancel_window;
        self.pending = Some(pending);
        if window_over {
            debug!(%kind, "alarm held by cooldown");
            AlarmAction::CoolingDown(kind)
        } else {
            AlarmAction::Waiting(kind)
        }
    }

    /// Stamp the event returned by [`AlarmAction::Fire`].
    ///
    /// `completed_at` is when the executor returned; the cooldown runs
    /// from there, so a long scale-up wait pushes the next fire out.
    pub fn record_fired(&mut self, kind: ScaleKind, fired_at: Instant, completed_at: Instant) {
        self.fired = Some(FiredEvent {
            kind,
            fired_at,
            allow_next_fire_at: completed_at + self.windows.cool_down,
        });
    }

    fn decay(&mut self, now: Instant) -> AlarmAction {
        match self.pending {
            None => AlarmAction::Idle,
            Some(pending) if now >= pending.cancel_at => {
                debug!(
                    kind = %pending.kind,
                    observed_for = ?now.saturating_duration_since(pending.first_observed_at),
                    "alarm cancelled"
                );
                self.pending = None;
                AlarmAction::Cancelled(pending.kind)
            }
            Some(pending) => AlarmAction::Decaying(pending.kind),
        }
    }
}
