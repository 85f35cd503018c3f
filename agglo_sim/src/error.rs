//! Error types for the simulation harness.

use agglo_core::OccupancyError;
use agglo_env::EnvError;
use thiserror::Error;

/// Errors raised while configuring or running an experiment.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid experiment or mobility parameters
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Snapshot assembly failed
    #[error(transparent)]
    Env(#[from] EnvError),

    /// Grid construction or update failed
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),

    /// Reading a config or writing an export failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result alias for the harness.
pub type Result<T> = std::result::Result<T, SimError>;
