//! Daemon wiring.
//!
//! Builds the node inventory, metric source, provisioner and calculator
//! from a `NodescalerConfig`, runs the inventory and calculator loops on
//! background tasks, and tears both down on shutdown or when the fatal
//! signal fires.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use nodescale_autoscale::{Calculator, CalculatorConfig};
use nodescale_core::{FatalSignal, MetricSourceKind, NodeSet, NodescalerConfig, ProvisionerKind};
use nodescale_inventory::{FileInventory, FileMetricSource, build_provisioner};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub calc_period_secs: Option<u64>,
    pub dry_run: bool,
}

/// Load, override and validate the configuration.
pub fn load_config(path: &Path, overrides: &Overrides) -> anyhow::Result<NodescalerConfig> {
    let mut config = NodescalerConfig::from_file(path)?;

    if let Some(secs) = overrides.calc_period_secs {
        config.metrics_calculate_period_secs = secs;
    }
    if overrides.dry_run {
        config.provisioner.kind = ProvisionerKind::DryRun;
    }

    config.validate()?;
    Ok(config)
}

pub fn calculator_config(config: &NodescalerConfig) -> CalculatorConfig {
    CalculatorConfig {
        calc_period: config.calc_period(),
        scale_up_threshold: config.scale_up_threshold.clone(),
        scale_down_threshold: config.scale_down_threshold.clone(),
        alarm_window: config.alarm_window(),
        alarm_cool_down: config.alarm_cool_down(),
        alarm_cancel_window: config.alarm_cancel_window(),
        scale_up_timeout: config.scale_up_timeout(),
        scale_up_check_period: config.scale_up_check_period(),
        max_backend_failure: config.max_backend_failure,
        min_node_num: config.min_node_num,
    }
}

/// Run until `shutdown_signal` resolves or the provisioning backend is
/// declared unusable. The latter is returned as an error.
pub async fn run(
    config: NodescalerConfig,
    shutdown_signal: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let nodes = NodeSet::new();

    // ── Collaborators ──────────────────────────────────────────

    let inventory = FileInventory::new(&config.inventory.path, nodes.clone())
        .with_label_selector(&config.inventory.label_selector)?;
    match inventory.sync_once().await {
        Ok(report) => info!(nodes = report.total, "initial node inventory loaded"),
        Err(e) => warn!(error = %e, "initial node inventory sync failed"),
    }

    let metric_source = match config.metric_source.kind {
        MetricSourceKind::File => Arc::new(FileMetricSource::new(
            &config.metric_source.path,
            config.metric_cache_expire(),
        )),
    };

    let provisioner = build_provisioner(&config.provisioner)?;
    info!(kind = %provisioner.kind(), "provisioner initialized");

    // ── Shutdown plumbing ──────────────────────────────────────

    let fatal = FatalSignal::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut calculator = Calculator::new(
        calculator_config(&config),
        nodes,
        metric_source,
        provisioner,
        fatal.clone(),
        shutdown_rx.clone(),
    )
    .context("failed to build metric calculator")?;

    // ── Background tasks ───────────────────────────────────────

    let resync_period = config.inventory_resync_period();
    let inventory_shutdown = shutdown_rx;
    let inventory_handle = tokio::spawn(async move {
        inventory.run(resync_period, inventory_shutdown).await;
    });

    let calculator_handle = tokio::spawn(async move {
        calculator.run().await;
    });

    tokio::select! {
        _ = shutdown_signal => info!("shutdown signal received"),
        _ = fatal.raised() => error!("fatal signal raised, shutting down"),
    }

    let _ = shutdown_tx.send(true);
    let _ = calculator_handle.await;
    let _ = inventory_handle.await;

    if fatal.is_raised() {
        anyhow::bail!("provisioning backend failure budget exceeded");
    }

    info!("nodescaler stopped");
    Ok(())
}
