//! nodescaler.toml configuration parser.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Durations are whole seconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::provider::ProvisionerKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodescalerConfig {
    /// Period in which metrics are calculated.
    pub metrics_calculate_period_secs: u64,
    /// Ratios exceeding which a scale-up is triggered, e.g. `memory=0.7,cpu=0.7`.
    pub scale_up_threshold: String,
    /// Ratios below which a scale-down is triggered, e.g. `memory=0.15,cpu=0.15`.
    pub scale_down_threshold: String,
    /// How long a threshold break must persist before a scaling fires.
    pub alarm_window_secs: u64,
    /// Minimum time between two fired scalings, counted from the end of
    /// the first one.
    pub alarm_cool_down_secs: u64,
    /// How long metrics must stay normal before a pending alarm is dropped.
    /// Should be larger than `alarm_window_secs`.
    pub alarm_cancel_window_secs: u64,
    /// Consecutive scale-up timeouts tolerated before giving up.
    pub max_backend_failure: u32,
    pub scale_up_timeout_secs: u64,
    /// How often the node count is polled while waiting for a scale-up.
    pub scale_up_check_period_secs: u64,
    /// Reserved; not consulted by the decision logic.
    pub min_node_num: usize,
    /// How long a metrics read may be served from cache.
    pub metric_cache_expire_secs: u64,
    /// How often the node inventory is re-read.
    pub inventory_resync_period_secs: u64,
    pub inventory: InventoryConfig,
    pub metric_source: MetricSourceConfig,
    pub provisioner: ProvisionerConfig,
}

impl Default for NodescalerConfig {
    fn default() -> Self {
        Self {
            metrics_calculate_period_secs: 5,
            scale_up_threshold: "memory=0.7,cpu=0.7".to_string(),
            scale_down_threshold: "memory=0.15,cpu=0.15".to_string(),
            alarm_window_secs: 300,
            alarm_cool_down_secs: 300,
            alarm_cancel_window_secs: 600,
            max_backend_failure: 3,
            scale_up_timeout_secs: 600,
            scale_up_check_period_secs: 60,
            min_node_num: 0,
            metric_cache_expire_secs: 10,
            inventory_resync_period_secs: 10,
            inventory: InventoryConfig::default(),
            metric_source: MetricSourceConfig::default(),
            provisioner: ProvisionerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// JSON file listing cluster nodes and their conditions.
    pub path: PathBuf,
    /// `key=value[,key=value]` labels a node must carry to be tracked.
    pub label_selector: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("nodes.json"),
            label_selector: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricSourceKind {
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSourceConfig {
    pub kind: MetricSourceKind,
    /// JSON file with per-node usage.
    pub path: PathBuf,
}

impl Default for MetricSourceConfig {
    fn default() -> Self {
        Self {
            kind: MetricSourceKind::File,
            path: PathBuf::from("usage.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    pub kind: ProvisionerKind,
    pub scale_up_command: Option<String>,
    pub scale_down_command: Option<String>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            kind: ProvisionerKind::DryRun,
            scale_up_command: None,
            scale_down_command: None,
        }
    }
}

impl NodescalerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reject values the daemon cannot run with.
    ///
    /// A cancel window not larger than the alarm window is only warned
    /// about: alarms still work, they just get dropped sooner.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metrics_calculate_period_secs == 0 {
            return Err(ConfigError::Invalid(
                "metrics_calculate_period_secs must be greater than zero".into(),
            ));
        }
        if self.scale_up_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "scale_up_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.scale_up_check_period_secs == 0 {
            return Err(ConfigError::Invalid(
                "scale_up_check_period_secs must be greater than zero".into(),
            ));
        }
        if self.inventory_resync_period_secs == 0 {
            return Err(ConfigError::Invalid(
                "inventory_resync_period_secs must be greater than zero".into(),
            ));
        }
        if self.provisioner.kind == ProvisionerKind::Command
            && (self.provisioner.scale_up_command.is_none()
                || self.provisioner.scale_down_command.is_none())
        {
            return Err(ConfigError::Invalid(
                "command provisioner requires scale_up_command and scale_down_command".into(),
            ));
        }
        if self.alarm_cancel_window_secs <= self.alarm_window_secs {
            warn!(
                alarm_window = self.alarm_window_secs,
                alarm_cancel_window = self.alarm_cancel_window_secs,
                "alarm cancel window should be larger than alarm window"
            );
        }
        Ok(())
    }

    pub fn calc_period(&self) -> Duration {
        Duration::from_secs(self.metrics_calculate_period_secs)
    }

    pub fn alarm_window(&self) -> Duration {
        Duration::from_secs(self.alarm_window_secs)
    }

    pub fn alarm_cool_down(&self) -> Duration {
        Duration::from_secs(self.alarm_cool_down_secs)
    }

    pub fn alarm_cancel_window(&self) -> Duration {
        Duration::from_secs(self.alarm_cancel_window_secs)
    }

    pub fn scale_up_timeout(&self) -> Duration {
        Duration::from_secs(self.scale_up_timeout_secs)
    }

    pub fn scale_up_check_period(&self) -> Duration {
        Duration::from_secs(self.scale_up_check_period_secs)
    }

    pub fn metric_cache_expire(&self) -> Duration {
        Duration::from_secs(self.metric_cache_expire_secs)
    }

    pub fn inventory_resync_period(&self) -> Duration {
        Duration::from_secs(self.inventory_resync_period_secs)
    }
}
