//! The shared set of ready nodes.
//!
//! The node inventory is the only writer; the decision engine only reads.
//! Readers copy what they need out of the map and drop the guard before
//! doing anything slow, so the lock is never held across a metric fetch
//! or a provisioner call.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::types::TrackedNode;

/// Cloneable handle to a lock-guarded `name → TrackedNode` map.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    inner: Arc<RwLock<HashMap<String, TrackedNode>>>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node. Returns `true` if the node was not tracked before.
    pub async fn insert(&self, node: TrackedNode) -> bool {
        let mut nodes = self.inner.write().await;
        let name = node.name.clone();
        let added = nodes.insert(name.clone(), node).is_none();
        debug!(node = %name, added, "node set updated");
        added
    }

    /// Remove a node. Returns the removed record if it was tracked.
    pub async fn remove(&self, name: &str) -> Option<TrackedNode> {
        let mut nodes = self.inner.write().await;
        let removed = nodes.remove(name);
        if removed.is_some() {
            debug!(node = %name, "node removed from set");
        }
        removed
    }

    /// Apply a batch of removals and insertions under a single write lock.
    pub async fn apply(&self, remove: &[String], insert: Vec<TrackedNode>) {
        if remove.is_empty() && insert.is_empty() {
            return;
        }
        let mut nodes = self.inner.write().await;
        for name in remove {
            nodes.remove(name);
        }
        for node in insert {
            nodes.insert(node.name.clone(), node);
        }
        debug!(
            removed = remove.len(),
            total = nodes.len(),
            "node set batch applied"
        );
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.inner.read().await.contains_key(name)
    }

    pub async fn get(&self, name: &str) -> Option<TrackedNode> {
        self.inner.read().await.get(name).cloned()
    }

    /// Number of tracked nodes.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Copy of every tracked node, sorted by name.
    pub async fn snapshot(&self) -> Vec<TrackedNode> {
        let mut nodes: Vec<TrackedNode> = {
            let guard = self.inner.read().await;
            guard.values().cloned().collect()
        };
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }

    /// Names of every tracked node, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = {
            let guard = self.inner.read().await;
            guard.keys().cloned().collect()
        };
        names.sort();
        names
    }
}
