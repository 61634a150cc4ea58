//! nodescale-autoscale — the scaling decision engine.
//!
//! Periodically averages CPU and memory utilization over the ready nodes,
//! classifies the result against scale-up/scale-down thresholds, debounces
//! the classification through an alarm state machine, and fires at most one
//! scaling at a time. A scale-up is only considered done once the node set
//! grows; repeated timeouts exhaust a failure budget and raise the fatal
//! signal.
//!
//! # Cycle
//!
//! ```text
//! Calculator::run_cycle
//!   ├── MetricAggregator::sample()   → UtilizationSample (or skip cycle)
//!   ├── classify()                   → ScaleUp | ScaleDown | NoAction
//!   ├── AlarmState::evaluate()       → Armed | Waiting | CoolingDown | Fire ...
//!   └── ScaleExecutor::fire()        → provisioner + scale-up wait
//!       └── AlarmState::record_fired()  (cooldown starts when fire returns)
//! ```
//!
//! # Alarm timing
//!
//! A decision must hold for `alarm_window` before it fires, two fires are
//! at least `alarm_cool_down` apart, and a pending alarm whose signal
//! returns to normal is dropped once `alarm_cancel_window` has passed since
//! it was last confirmed.

pub mod aggregator;
pub mod alarm;
pub mod calculator;
pub mod decision;
pub mod error;
pub mod executor;
pub mod threshold;

pub use aggregator::{MetricAggregator, UtilizationSample};
pub use alarm::{AlarmAction, AlarmState, AlarmWindows, FiredEvent, PendingEvent};
pub use calculator::{Calculator, CalculatorConfig, CycleOutcome};
pub use decision::{ScaleDecision, ScaleKind, classify};
pub use error::{AutoscaleError, AutoscaleResult};
pub use executor::{FireOutcome, ScaleExecutor};
pub use threshold::{ThresholdSet, parse_thresholds};
