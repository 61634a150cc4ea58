//! File-backed metric source.
//!
//! Usage is read from a JSON object keyed by node name:
//!
//! ```json
//! { "node-1": { "cpu": "1500m", "memory": "3Gi" } }
//! ```
//!
//! The parsed file is cached for the configured expiry so one calculator
//! cycle reads it at most once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use nodescale_core::{MetricError, MetricSource, Quantity, Resource};

use crate::error::{InventoryError, InventoryResult};

/// Current usage of one node. Either dimension may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeUsage {
    pub cpu: Option<Quantity>,
    pub memory: Option<Quantity>,
}

impl NodeUsage {
    pub fn get(&self, resource: Resource) -> Option<Quantity> {
        match resource {
            Resource::Cpu => self.cpu,
            Resource::Memory => self.memory,
        }
    }
}

type UsageMap = HashMap<String, NodeUsage>;

struct CachedUsage {
    loaded_at: Instant,
    usage: Arc<UsageMap>,
}

pub struct FileMetricSource {
    path: PathBuf,
    expire: Duration,
    cache: Mutex<Option<CachedUsage>>,
}

impl FileMetricSource {
    pub fn new(path: impl Into<PathBuf>, expire: Duration) -> Self {
        Self {
            path: path.into(),
            expire,
            cache: Mutex::new(None),
        }
    }

    /// Cached usage, reloaded once the entry is older than the expiry.
    /// Failed loads are not cached.
    async fn usage(&self) -> InventoryResult<Arc<UsageMap>> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.loaded_at.elapsed() < self.expire {
                return Ok(cached.usage.clone());
            }
        }

        let usage = Arc::new(self.load().await?);
        debug!(path = %self.path.display(), nodes = usage.len(), "reloaded node usage");
        *cache = Some(CachedUsage {
            loaded_at: Instant::now(),
            usage: usage.clone(),
        });
        Ok(usage)
    }

    async fn load(&self) -> InventoryResult<UsageMap> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| InventoryError::Read {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| InventoryError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

#[async_trait]
impl MetricSource for FileMetricSource {
    async fn get_metric(&self, node: &str, resource: Resource) -> Result<Quantity, MetricError> {
        let usage = self
            .usage()
            .await
            .map_err(|e| MetricError::unavailable(node, resource, e.to_string()))?;

        let entry = usage
            .get(node)
            .ok_or_else(|| MetricError::unavailable(node, resource, "node not reported"))?;
        entry
            .get(resource)
            .ok_or_else(|| MetricError::unavailable(node, resource, "dimension not reported"))
    }
}
