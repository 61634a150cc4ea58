//! nodescale-core — shared building blocks for the node autoscaler.
//!
//! Holds the types every other crate speaks in (`Resource`, `Quantity`,
//! `TrackedNode`), the lock-guarded `NodeSet` shared between the node
//! inventory and the decision engine, the collaborator traits the engine
//! drives (`MetricSource`, `Provisioner`), the one-shot `FatalSignal`, and
//! the daemon configuration.

pub mod config;
pub mod node_set;
pub mod provider;
pub mod quantity;
pub mod signal;
pub mod types;

pub use config::{
    ConfigError, InventoryConfig, MetricSourceConfig, MetricSourceKind, NodescalerConfig,
    ProvisionerConfig,
};
pub use node_set::NodeSet;
pub use provider::{MetricError, MetricSource, Provisioner, ProvisionerKind};
pub use quantity::{Quantity, QuantityError};
pub use signal::FatalSignal;
pub use types::*;
