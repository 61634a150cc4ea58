//! nodescaled — the node autoscaler daemon.
//!
//! Keeps a set of ready nodes from the inventory file, samples their
//! utilization every period and asks the provisioner to add or remove one
//! node when utilization stays past a threshold long enough.
//!
//! # Usage
//!
//! ```text
//! nodescaled run --config /etc/nodescaler/nodescaler.toml
//! nodescaled check --config /etc/nodescaler/nodescaler.toml
//! ```

mod daemon;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use daemon::Overrides;

#[derive(Parser)]
#[command(name = "nodescaled", version, about = "Node autoscaler daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the autoscaler until interrupted.
    Run {
        /// Path to nodescaler.toml.
        #[arg(long, default_value = "nodescaler.toml")]
        config: PathBuf,

        /// Override the metrics calculation period, in seconds.
        #[arg(long)]
        calc_period: Option<u64>,

        /// Only log scaling requests, whatever the configured provisioner.
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration and print it with defaults filled in.
    Check {
        #[arg(long, default_value = "nodescaler.toml")]
        config: PathBuf,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nodescaled=debug,nodescale=debug"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            calc_period,
            dry_run,
        } => {
            let overrides = Overrides {
                calc_period_secs: calc_period,
                dry_run,
            };
            let config = daemon::load_config(&config, &overrides)?;
            info!(
                period = config.metrics_calculate_period_secs,
                provisioner = %config.provisioner.kind,
                "nodescaler starting"
            );
            daemon::run(config, ctrl_c()).await
        }
        Command::Check { config } => {
            let config = daemon::load_config(&config, &Overrides::default())?;
            nodescale_autoscale::ThresholdSet::parse(
                &config.scale_up_threshold,
                &config.scale_down_threshold,
            )?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed only the fatal
/// signal can stop the daemon.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}
