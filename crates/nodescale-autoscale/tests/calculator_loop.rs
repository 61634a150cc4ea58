//! End-to-end tests of the calculator loop against in-memory collaborators.
//!
//! Time is paused, so scale-up waits and periodic ticks advance instantly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use nodescale_autoscale::*;
use nodescale_core::*;

/// Usage per node as (cpu, memory); nodes without an entry are unavailable.
#[derive(Default)]
struct FakeSource {
    usage: Mutex<HashMap<String, (Quantity, Quantity)>>,
    default_usage: Mutex<Option<(Quantity, Quantity)>>,
}

impl FakeSource {
    fn set(&self, node: &str, cpu: &str, memory: &str) {
        self.usage.lock().unwrap().insert(
            node.to_string(),
            (Quantity::parse(cpu).unwrap(), Quantity::parse(memory).unwrap()),
        );
    }

    fn set_default(&self, cpu: &str, memory: &str) {
        *self.default_usage.lock().unwrap() =
            Some((Quantity::parse(cpu).unwrap(), Quantity::parse(memory).unwrap()));
    }

    fn clear(&self) {
        self.usage.lock().unwrap().clear();
        *self.default_usage.lock().unwrap() = None;
    }
}

#[async_trait]
impl MetricSource for FakeSource {
    async fn get_metric(&self, node: &str, resource: Resource) -> Result<Quantity, MetricError> {
        let entry = self
            .usage
            .lock()
            .unwrap()
            .get(node)
            .copied()
            .or(*self.default_usage.lock().unwrap());
        let (cpu, memory) =
            entry.ok_or_else(|| MetricError::unavailable(node, resource, "no usage recorded"))?;
        Ok(match resource {
            Resource::Cpu => cpu,
            Resource::Memory => memory,
        })
    }
}

/// Records calls; optionally joins a node a little after each scale-up.
struct FakeProvisioner {
    nodes: NodeSet,
    grow_on_scale_up: bool,
    ups: AtomicUsize,
    downs: AtomicUsize,
}

impl FakeProvisioner {
    fn new(nodes: NodeSet, grow_on_scale_up: bool) -> Self {
        Self {
            nodes,
            grow_on_scale_up,
            ups: AtomicUsize::new(0),
            downs: AtomicUsize::new(0),
        }
    }

    fn ups(&self) -> usize {
        self.ups.load(Ordering::SeqCst)
    }

    fn downs(&self) -> usize {
        self.downs.load(Ordering::SeqCst)
    }
}

impl Provisioner for FakeProvisioner {
    fn kind(&self) -> ProvisionerKind {
        ProvisionerKind::DryRun
    }

    fn scale_up(&self) {
        let n = self.ups.fetch_add(1, Ordering::SeqCst);
        if self.grow_on_scale_up {
            let nodes = self.nodes.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(90)).await;
                nodes.insert(node(&format!("joined-{n}"))).await;
            });
        }
    }

    fn scale_down(&self) {
        self.downs.fetch_add(1, Ordering::SeqCst);
    }
}

fn node(name: &str) -> TrackedNode {
    TrackedNode::new(name, Quantity::from_units(1), Quantity::parse("4Gi").unwrap())
}

struct Setup {
    calculator: Calculator,
    nodes: NodeSet,
    source: Arc<FakeSource>,
    provisioner: Arc<FakeProvisioner>,
    fatal: FatalSignal,
    shutdown_tx: watch::Sender<bool>,
}

async fn setup(config: CalculatorConfig, node_names: &[&str], grow_on_scale_up: bool) -> Setup {
    let nodes = NodeSet::new();
    for name in node_names {
        nodes.insert(node(name)).await;
    }
    let source = Arc::new(FakeSource::default());
    let provisioner = Arc::new(FakeProvisioner::new(nodes.clone(), grow_on_scale_up));
    let fatal = FatalSignal::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let calculator = Calculator::new(
        config,
        nodes.clone(),
        source.clone(),
        provisioner.clone(),
        fatal.clone(),
        shutdown_rx,
    )
    .unwrap();

    Setup {
        calculator,
        nodes,
        source,
        provisioner,
        fatal,
        shutdown_tx,
    }
}

fn instant_config() -> CalculatorConfig {
    CalculatorConfig {
        calc_period: Duration::from_secs(5),
        scale_up_threshold: "cpu=0.7".to_string(),
        scale_down_threshold: String::new(),
        alarm_window: Duration::ZERO,
        alarm_cool_down: Duration::ZERO,
        alarm_cancel_window: Duration::ZERO,
        scale_up_timeout: Duration::from_secs(600),
        scale_up_check_period: Duration::from_secs(60),
        max_backend_failure: 3,
        min_node_num: 0,
    }
}

#[tokio::test]
async fn malformed_thresholds_fail_construction() {
    let (_tx, rx) = watch::channel(false);
    let nodes = NodeSet::new();
    let config = CalculatorConfig {
        scale_up_threshold: "cpu=x".to_string(),
        ..CalculatorConfig::default()
    };

    let result = Calculator::new(
        config,
        nodes.clone(),
        Arc::new(FakeSource::default()),
        Arc::new(FakeProvisioner::new(nodes, false)),
        FatalSignal::new(),
        rx,
    );
    assert!(matches!(
        result,
        Err(AutoscaleError::InvalidThresholdFormat { .. })
    ));
}

#[tokio::test]
async fn zero_periods_fail_construction() {
    for (config, name) in [
        (
            CalculatorConfig {
                calc_period: Duration::ZERO,
                ..instant_config()
            },
            "calc_period",
        ),
        (
            CalculatorConfig {
                scale_up_check_period: Duration::ZERO,
                ..instant_config()
            },
            "scale_up_check_period",
        ),
    ] {
        let (_tx, rx) = watch::channel(false);
        let nodes = NodeSet::new();
        let result = Calculator::new(
            config,
            nodes.clone(),
            Arc::new(FakeSource::default()),
            Arc::new(FakeProvisioner::new(nodes, false)),
            FatalSignal::new(),
            rx,
        );
        assert_eq!(result.err(), Some(AutoscaleError::ZeroPeriod(name)));
    }
}

#[tokio::test(start_paused = true)]
async fn scale_up_fires_on_second_cycle() {
    let mut s = setup(instant_config(), &["n1"], true).await;
    s.source.set("n1", "800m", "1Gi");

    assert_eq!(s.calculator.run_cycle().await, CycleOutcome::Continue);
    assert_eq!(s.provisioner.ups(), 0);
    assert_eq!(s.calculator.alarm().pending().unwrap().kind, ScaleKind::Up);

    assert_eq!(s.calculator.run_cycle().await, CycleOutcome::Continue);
    assert_eq!(s.provisioner.ups(), 1);
    assert_eq!(s.nodes.len().await, 2);
    assert_eq!(s.calculator.backend_failures(), 0);
    assert!(s.calculator.alarm().pending().is_none());
    assert_eq!(s.calculator.alarm().last_fired().unwrap().kind, ScaleKind::Up);
}

#[tokio::test(start_paused = true)]
async fn unreadable_cycle_leaves_alarm_untouched() {
    let mut s = setup(instant_config(), &["n1", "n2"], false).await;
    s.source.set_default("900m", "1Gi");

    s.calculator.run_cycle().await;
    let pending = *s.calculator.alarm().pending().unwrap();

    s.source.clear();
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(s.calculator.run_cycle().await, CycleOutcome::Continue);
    assert_eq!(s.calculator.alarm().pending(), Some(&pending));
    assert_eq!(s.provisioner.ups(), 0);
}

#[tokio::test(start_paused = true)]
async fn fatal_signal_on_third_consecutive_timeout() {
    let config = CalculatorConfig {
        scale_up_timeout: Duration::from_secs(60),
        scale_up_check_period: Duration::from_secs(10),
        max_backend_failure: 2,
        ..instant_config()
    };
    let mut s = setup(config, &["n1"], false).await;
    s.source.set("n1", "900m", "1Gi");

    let mut outcomes = Vec::new();
    for _ in 0..6 {
        outcomes.push(s.calculator.run_cycle().await);
        if s.provisioner.ups() == 2 {
            assert!(!s.fatal.is_raised());
            assert_eq!(s.calculator.backend_failures(), 2);
        }
    }

    assert_eq!(s.provisioner.ups(), 3);
    assert_eq!(s.calculator.backend_failures(), 3);
    assert!(s.fatal.is_raised());
    assert_eq!(outcomes.last(), Some(&CycleOutcome::Stop));
    assert!(outcomes[..5].iter().all(|o| *o == CycleOutcome::Continue));
}

#[tokio::test(start_paused = true)]
async fn pending_scale_down_cancelled_when_load_returns() {
    let config = CalculatorConfig {
        scale_up_threshold: "cpu=0.7,memory=0.7".to_string(),
        scale_down_threshold: "cpu=0.15,memory=0.15".to_string(),
        alarm_window: Duration::from_secs(60),
        alarm_cancel_window: Duration::from_secs(120),
        ..instant_config()
    };
    let mut s = setup(config, &["n1", "n2"], false).await;

    s.source.set_default("100m", "256Mi");
    s.calculator.run_cycle().await;
    assert_eq!(s.calculator.alarm().pending().unwrap().kind, ScaleKind::Down);

    // Moderate load: no action, the alarm decays and is dropped.
    s.source.set_default("500m", "2Gi");
    for _ in 0..30 {
        tokio::time::advance(Duration::from_secs(5)).await;
        s.calculator.run_cycle().await;
    }

    assert!(s.calculator.alarm().pending().is_none());
    assert!(s.calculator.alarm().last_fired().is_none());
    assert_eq!(s.provisioner.downs(), 0);
}

#[tokio::test(start_paused = true)]
async fn scale_down_fires_after_window() {
    let config = CalculatorConfig {
        scale_up_threshold: "cpu=0.7,memory=0.7".to_string(),
        scale_down_threshold: "cpu=0.15,memory=0.15".to_string(),
        alarm_window: Duration::from_secs(60),
        alarm_cancel_window: Duration::from_secs(120),
        ..instant_config()
    };
    let mut s = setup(config, &["n1", "n2"], false).await;
    s.source.set_default("50m", "128Mi");

    for _ in 0..12 {
        s.calculator.run_cycle().await;
        tokio::time::advance(Duration::from_secs(5)).await;
    }
    assert_eq!(s.provisioner.downs(), 0);

    s.calculator.run_cycle().await;
    assert_eq!(s.provisioner.downs(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_exits_on_shutdown() {
    let mut s = setup(instant_config(), &["n1"], false).await;
    s.source.set("n1", "100m", "1Gi");

    let mut calculator = s.calculator;
    let handle = tokio::spawn(async move {
        calculator.run().await;
        calculator
    });

    tokio::time::sleep(Duration::from_secs(60)).await;
    s.shutdown_tx.send(true).unwrap();

    let calculator = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("calculator did not stop")
        .unwrap();
    assert!(calculator.alarm().last_fired().is_none());
    assert!(!s.fatal.is_raised());
}

#[tokio::test(start_paused = true)]
async fn run_stops_itself_when_budget_is_spent() {
    let config = CalculatorConfig {
        scale_up_timeout: Duration::from_secs(30),
        scale_up_check_period: Duration::from_secs(10),
        max_backend_failure: 0,
        ..instant_config()
    };
    let mut s = setup(config, &["n1"], false).await;
    s.source.set("n1", "950m", "1Gi");

    let fatal = s.fatal.clone();
    let mut calculator = s.calculator;
    let handle = tokio::spawn(async move { calculator.run().await });

    tokio::time::timeout(Duration::from_secs(300), fatal.raised())
        .await
        .expect("fatal signal never raised");
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("calculator kept running")
        .unwrap();
    assert_eq!(s.provisioner.ups(), 1);
    // Keep the shutdown sender alive until the end.
    drop(s.shutdown_tx);
}
