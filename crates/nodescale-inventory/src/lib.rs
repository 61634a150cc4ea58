//! nodescale-inventory — concrete collaborators for the nodescaler daemon.
//!
//! The decision engine only knows the `NodeSet`, `MetricSource` and
//! `Provisioner` abstractions. This crate provides file-driven versions so
//! the daemon can run against any system that can write two JSON files and
//! accept a shell command.
//!
//! # Architecture
//!
//! ```text
//! FileInventory  (nodes.json, polled)
//!   └── readiness filter → NodeSet::apply (write lock only on change)
//!
//! FileMetricSource (usage.json, cached for metric_cache_expire)
//!   └── MetricSource::get_metric(node, cpu|memory)
//!
//! CommandProvisioner / DryRunProvisioner
//!   └── Provisioner::scale_up / scale_down (spawned, fire-and-forget)
//! ```

pub mod error;
pub mod inventory;
pub mod metrics;
pub mod provisioner;

pub use error::{InventoryError, InventoryResult};
pub use inventory::{FileInventory, NodeCondition, NodeRecord, SyncReport, is_node_ready};
pub use metrics::{FileMetricSource, NodeUsage};
pub use provisioner::{CommandProvisioner, DryRunProvisioner, build_provisioner};
