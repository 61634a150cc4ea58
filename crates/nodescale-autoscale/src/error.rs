//! Autoscaler error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the decision engine.
///
/// Only `InvalidThresholdFormat` and `ZeroPeriod` escape to the caller (at
/// construction); the per-cycle variants are absorbed by the calculator and
/// logged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutoscaleError {
    #[error("invalid threshold format `{input}`: {reason}")]
    InvalidThresholdFormat { input: String, reason: String },

    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),

    #[error("no node could be sampled out of {total_nodes}")]
    NoSampledNodes { total_nodes: usize },

    #[error("scale up not observed within {0:?}")]
    ScaleUpTimeout(Duration),

    #[error("backend failure budget exceeded: {failures} consecutive scale-up failures (max {max})")]
    BackendFailureBudgetExceeded { failures: u32, max: u32 },
}

pub type AutoscaleResult<T> = Result<T, AutoscaleError>;
