//! Metric aggregation across the ready node set.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use nodescale_core::{MetricSource, NodeSet, Resource, TrackedNode};

use crate::error::{AutoscaleError, AutoscaleResult};

/// Average utilization over the nodes sampled in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilizationSample {
    pub cpu: f64,
    pub memory: f64,
    /// Nodes whose metrics were read successfully.
    pub sampled_nodes: usize,
    /// Nodes in the set when the cycle started.
    pub total_nodes: usize,
}

/// Reads usage for every tracked node and averages it.
pub struct MetricAggregator {
    nodes: NodeSet,
    source: Arc<dyn MetricSource>,
    /// Size of the node set at the last sample, used as the scale-up baseline.
    last_node_num: usize,
}

impl MetricAggregator {
    pub fn new(nodes: NodeSet, source: Arc<dyn MetricSource>) -> Self {
        Self {
            nodes,
            source,
            last_node_num: 0,
        }
    }

    /// Node count observed by the most recent [`sample`](Self::sample).
    pub fn last_node_num(&self) -> usize {
        self.last_node_num
    }

    /// Sample every tracked node.
    ///
    /// Nodes whose metrics cannot be read are left out of both the sum and
    /// the count. Fails with `NoSampledNodes` when nothing could be read.
    pub async fn sample(&mut self) -> AutoscaleResult<UtilizationSample> {
        // Copy under the read lock; metric reads happen without it.
        let nodes = self.nodes.snapshot().await;
        self.last_node_num = nodes.len();

        let mut cpu_sum = 0.0;
        let mut mem_sum = 0.0;
        let mut sampled = 0usize;

        for node in &nodes {
            let Some((cpu, mem)) = self.node_utilization(node).await else {
                continue;
            };
            cpu_sum += cpu;
            mem_sum += mem;
            sampled += 1;
        }

        if sampled == 0 {
            return Err(AutoscaleError::NoSampledNodes {
                total_nodes: nodes.len(),
            });
        }

        let sample = UtilizationSample {
            cpu: cpu_sum / sampled as f64,
            memory: mem_sum / sampled as f64,
            sampled_nodes: sampled,
            total_nodes: nodes.len(),
        };
        debug!(
            avg_cpu = sample.cpu,
            avg_memory = sample.memory,
            sampled = sample.sampled_nodes,
            total = sample.total_nodes,
            "utilization sampled"
        );
        Ok(sample)
    }

    async fn node_utilization(&self, node: &TrackedNode) -> Option<(f64, f64)> {
        let cpu = self.resource_utilization(node, Resource::Cpu).await?;
        let mem = self.resource_utilization(node, Resource::Memory).await?;
        trace!(node = %node.name, cpu, memory = mem, "node utilization");
        Some((cpu, mem))
    }

    async fn resource_utilization(&self, node: &TrackedNode, resource: Resource) -> Option<f64> {
        let usage = match self.source.get_metric(&node.name, resource).await {
            Ok(usage) => usage,
            Err(e) => {
                warn!(node = %node.name, %resource, error = %e, "failed to get metric, skipping node");
                return None;
            }
        };

        let capacity = node.capacity(resource);
        let ratio = usage.ratio_of(capacity);
        if ratio.is_none() {
            warn!(node = %node.name, %resource, "node reports zero capacity, skipping node");
        }
        ratio
    }
}
