//! Shared types used across nodescaler crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::quantity::Quantity;

/// A resource dimension the autoscaler measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Cpu,
    Memory,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Cpu => "cpu",
            Resource::Memory => "memory",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a resource name is neither `cpu` nor `memory`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource `{0}`")]
pub struct UnknownResource(pub String);

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Resource::Cpu),
            "memory" => Ok(Resource::Memory),
            _ => Err(UnknownResource(s.to_string())),
        }
    }
}

/// A ready node as seen by the autoscaler.
///
/// Owned by the node inventory; the decision engine only ever reads
/// copies of it out of the [`NodeSet`](crate::NodeSet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedNode {
    pub name: String,
    pub cpu_capacity: Quantity,
    pub memory_capacity: Quantity,
}

impl TrackedNode {
    pub fn new(name: impl Into<String>, cpu_capacity: Quantity, memory_capacity: Quantity) -> Self {
        Self {
            name: name.into(),
            cpu_capacity,
            memory_capacity,
        }
    }

    /// Capacity of the node in the given dimension.
    pub fn capacity(&self, resource: Resource) -> Quantity {
        match resource {
            Resource::Cpu => self.cpu_capacity,
            Resource::Memory => self.memory_capacity,
        }
    }
}
