//! Inventory error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid label selector entry {0:?}, expected key=value")]
    Selector(String),

    #[error("provisioner misconfigured: {0}")]
    Provisioner(String),
}

pub type InventoryResult<T> = Result<T, InventoryError>;
