//! File-backed node inventory.
//!
//! Periodically re-reads a JSON node list and keeps the shared `NodeSet`
//! limited to nodes that match the label selector and are ready. Nodes
//! that become not-ready or disappear from the file are dropped.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use nodescale_core::{NodeSet, Quantity, TrackedNode};

use crate::error::{InventoryError, InventoryResult};

/// Node conditions consulted by the readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCondition {
    Ready,
    MemoryPressure,
    DiskPressure,
    PidPressure,
    NetworkUnavailable,
}

impl NodeCondition {
    /// Every checked condition with the status a ready node must report.
    pub const READY_EXPECTATIONS: [(NodeCondition, bool); 5] = [
        (NodeCondition::Ready, true),
        (NodeCondition::MemoryPressure, false),
        (NodeCondition::DiskPressure, false),
        (NodeCondition::PidPressure, false),
        (NodeCondition::NetworkUnavailable, false),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeCondition::Ready => "Ready",
            NodeCondition::MemoryPressure => "MemoryPressure",
            NodeCondition::DiskPressure => "DiskPressure",
            NodeCondition::PidPressure => "PIDPressure",
            NodeCondition::NetworkUnavailable => "NetworkUnavailable",
        }
    }
}

/// One node as listed in the inventory file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub cpu: Quantity,
    pub memory: Quantity,
    /// Condition name → status. Unknown conditions are ignored.
    #[serde(default)]
    pub conditions: HashMap<String, bool>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl NodeRecord {
    fn to_tracked(&self) -> TrackedNode {
        TrackedNode::new(self.name.clone(), self.cpu, self.memory)
    }
}

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    nodes: Vec<NodeRecord>,
}

/// A node is ready only if every reported condition it lists matches the
/// expected status. Conditions the record does not mention are not checked.
pub fn is_node_ready(record: &NodeRecord) -> bool {
    NodeCondition::READY_EXPECTATIONS
        .iter()
        .all(|(condition, expected)| {
            record
                .conditions
                .get(condition.as_str())
                .is_none_or(|status| status == expected)
        })
}

/// Changes applied by one [`FileInventory::sync_once`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub total: usize,
}

/// Keeps a `NodeSet` in step with a JSON inventory file.
pub struct FileInventory {
    path: PathBuf,
    nodes: NodeSet,
    /// `label → value` pairs a node must carry; empty matches all.
    selector: Vec<(String, String)>,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>, nodes: NodeSet) -> Self {
        Self {
            path: path.into(),
            nodes,
            selector: Vec::new(),
        }
    }

    /// Only track nodes whose labels match `selector` (`k=v,k2=v2`).
    pub fn with_label_selector(mut self, selector: &str) -> InventoryResult<Self> {
        self.selector = parse_label_selector(selector)?;
        Ok(self)
    }

    /// Read and parse the inventory file.
    pub async fn load(&self) -> InventoryResult<Vec<NodeRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| InventoryError::Read {
                path: self.path.clone(),
                source,
            })?;
        let file: InventoryFile =
            serde_json::from_str(&content).map_err(|source| InventoryError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(file.nodes)
    }

    /// Reconcile the node set with the file once.
    ///
    /// Ready nodes not yet tracked are added and tracked nodes that are no
    /// longer ready (or listed) are removed. The write lock is only taken
    /// when something changes.
    pub async fn sync_once(&self) -> InventoryResult<SyncReport> {
        let records = self.load().await?;

        let ready: HashMap<&str, &NodeRecord> = records
            .iter()
            .filter(|r| self.matches_selector(r))
            .filter(|r| {
                let ready = is_node_ready(r);
                if !ready {
                    debug!(node = %r.name, "node not ready");
                }
                ready
            })
            .map(|r| (r.name.as_str(), r))
            .collect();

        let tracked: HashSet<String> = self.nodes.names().await.into_iter().collect();

        let mut removed: Vec<String> = tracked
            .iter()
            .filter(|name| !ready.contains_key(name.as_str()))
            .cloned()
            .collect();
        removed.sort();

        let mut added: Vec<TrackedNode> = ready
            .values()
            .filter(|r| !tracked.contains(&r.name))
            .map(|r| r.to_tracked())
            .collect();
        added.sort_by(|a, b| a.name.cmp(&b.name));

        let report = SyncReport {
            added: added.iter().map(|n| n.name.clone()).collect(),
            removed: removed.clone(),
            total: ready.len(),
        };

        for name in &report.removed {
            info!(node = %name, "remove unavailable node from metrics calculation");
        }
        for name in &report.added {
            info!(node = %name, "add available node into metrics calculation");
        }
        self.nodes.apply(&removed, added).await;

        Ok(report)
    }

    /// Re-sync every `period` until shutdown.
    ///
    /// A failed read keeps the current node set.
    pub async fn run(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(path = %self.path.display(), ?period, "starting node inventory");

        loop {
            if let Err(e) = self.sync_once().await {
                warn!(error = %e, "node inventory sync failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = shutdown.changed() => {
                    info!("stopping node inventory");
                    break;
                }
            }
        }
    }

    fn matches_selector(&self, record: &NodeRecord) -> bool {
        self.selector
            .iter()
            .all(|(key, value)| record.labels.get(key) == Some(value))
    }
}

fn parse_label_selector(selector: &str) -> InventoryResult<Vec<(String, String)>> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| InventoryError::Selector(pair.to_string()))
        })
        .collect()
}
