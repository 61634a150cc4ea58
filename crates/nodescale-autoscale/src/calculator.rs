//! Calculator — the periodic control loop.
//!
//! One cycle samples utilization, classifies it, advances the alarm, and
//! fires when the alarm says so. Cycles never overlap: the loop does not
//! tick again until a fire, including any scale-up wait, has returned.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use nodescale_core::{FatalSignal, MetricSource, NodeSet, Provisioner};

use crate::aggregator::MetricAggregator;
use crate::alarm::{AlarmAction, AlarmState, AlarmWindows};
use crate::decision::classify;
use crate::error::{AutoscaleError, AutoscaleResult};
use crate::executor::{FireOutcome, ScaleExecutor};
use crate::threshold::ThresholdSet;

/// Engine settings, already converted to durations.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorConfig {
    pub calc_period: Duration,
    pub scale_up_threshold: String,
    pub scale_down_threshold: String,
    pub alarm_window: Duration,
    pub alarm_cool_down: Duration,
    /// Expected to exceed `alarm_window`; not enforced.
    pub alarm_cancel_window: Duration,
    pub scale_up_timeout: Duration,
    pub scale_up_check_period: Duration,
    pub max_backend_failure: u32,
    /// Reserved; the decision logic does not consult it.
    pub min_node_num: usize,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            calc_period: Duration::from_secs(5),
            scale_up_threshold: "memory=0.7,cpu=0.7".to_string(),
            scale_down_threshold: "memory=0.15,cpu=0.15".to_string(),
            alarm_window: Duration::from_secs(300),
            alarm_cool_down: Duration::from_secs(300),
            alarm_cancel_window: Duration::from_secs(600),
            scale_up_timeout: Duration::from_secs(600),
            scale_up_check_period: Duration::from_secs(60),
            max_backend_failure: 3,
            min_node_num: 0,
        }
    }
}

/// Whether the loop keeps going after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue,
    Stop,
}

pub struct Calculator {
    calc_period: Duration,
    thresholds: ThresholdSet,
    aggregator: MetricAggregator,
    alarm: AlarmState,
    executor: ScaleExecutor,
    shutdown: watch::Receiver<bool>,
}

impl Calculator {
    /// Build the engine. Fails if either threshold string is malformed or a
    /// polling period is zero.
    pub fn new(
        config: CalculatorConfig,
        nodes: NodeSet,
        metric_source: Arc<dyn MetricSource>,
        provisioner: Arc<dyn Provisioner>,
        fatal: FatalSignal,
        shutdown: watch::Receiver<bool>,
    ) -> AutoscaleResult<Self> {
        if config.calc_period.is_zero() {
            return Err(AutoscaleError::ZeroPeriod("calc_period"));
        }
        if config.scale_up_check_period.is_zero() {
            return Err(AutoscaleError::ZeroPeriod("scale_up_check_period"));
        }

        let thresholds =
            ThresholdSet::parse(&config.scale_up_threshold, &config.scale_down_threshold)?;

        let executor = ScaleExecutor::new(provisioner, nodes.clone(), fatal, shutdown.clone())
            .with_scale_up_timeout(config.scale_up_timeout)
            .with_check_period(config.scale_up_check_period)
            .with_max_backend_failure(config.max_backend_failure);

        Ok(Self {
            calc_period: config.calc_period,
            thresholds,
            aggregator: MetricAggregator::new(nodes, metric_source),
            alarm: AlarmState::new(AlarmWindows {
                window: config.alarm_window,
                cool_down: config.alarm_cool_down,
                cancel_window: config.alarm_cancel_window,
            }),
            executor,
            shutdown,
        })
    }

    pub fn alarm(&self) -> &AlarmState {
        &self.alarm
    }

    pub fn backend_failures(&self) -> u32 {
        self.executor.backend_failures()
    }

    /// Run cycles until shutdown or the failure budget runs out.
    ///
    /// The first cycle runs immediately, later ones once per period.
    pub async fn run(&mut self) {
        info!(period = ?self.calc_period, "starting metric calculator");

        let mut ticker = tokio::time::interval(self.calc_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if *self.shutdown.borrow() {
                break;
            }
            if self.run_cycle().await == CycleOutcome::Stop {
                break;
            }
        }

        info!("stopping metric calculator");
    }

    /// Run a single aggregate → classify → alarm → fire cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let sample = match self.aggregator.sample().await {
            Ok(sample) => sample,
            Err(e) => {
                debug!(error = %e, "skipping evaluation this cycle");
                return CycleOutcome::Continue;
            }
        };

        let decision = classify(
            sample.cpu,
            sample.memory,
            sample.sampled_nodes,
            &self.thresholds,
        );
        let now = Instant::now();
        let action = self.alarm.evaluate(decision, now);
        debug!(
            avg_cpu = sample.cpu,
            avg_memory = sample.memory,
            %decision,
            ?action,
            "evaluated alarm"
        );

        let AlarmAction::Fire(kind) = action else {
            return CycleOutcome::Continue;
        };

        let baseline = self.aggregator.last_node_num();
        let outcome = self.executor.fire(kind, baseline).await;
        self.alarm.record_fired(kind, now, Instant::now());

        match outcome {
            FireOutcome::BudgetExceeded { .. } | FireOutcome::Aborted => CycleOutcome::Stop,
            _ => CycleOutcome::Continue,
        }
    }
}
