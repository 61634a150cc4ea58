//! Collaborator traits driven by the decision engine.
//!
//! Implementations live outside the engine (see `nodescale-inventory`);
//! the engine only depends on these capability sets.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quantity::Quantity;
use crate::types::Resource;

/// Errors a metric source may report for a single node read.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("metric {resource} unavailable for node {node}: {reason}")]
    Unavailable {
        node: String,
        resource: Resource,
        reason: String,
    },
}

impl MetricError {
    pub fn unavailable(node: &str, resource: Resource, reason: impl Into<String>) -> Self {
        MetricError::Unavailable {
            node: node.to_string(),
            resource,
            reason: reason.into(),
        }
    }
}

/// Reads current resource usage for a node.
///
/// Must be safe to call concurrently with the rest of the system.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn get_metric(&self, node: &str, resource: Resource) -> Result<Quantity, MetricError>;
}

/// Backend provisioner type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionerKind {
    /// Runs an operator-supplied shell command.
    Command,
    /// Only logs what would have happened.
    DryRun,
}

impl fmt::Display for ProvisionerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionerKind::Command => f.write_str("command"),
            ProvisionerKind::DryRun => f.write_str("dry-run"),
        }
    }
}

/// Adds or removes ONE node in the backend.
///
/// Both calls are fire-and-forget: they must return promptly and carry no
/// success signal. The engine infers a completed scale-up only by watching
/// the node set grow.
pub trait Provisioner: Send + Sync {
    fn kind(&self) -> ProvisionerKind;

    fn scale_up(&self);

    fn scale_down(&self);
}
