//! Error types for the mobility interface.

use thiserror::Error;

/// Errors raised while assembling or pulling entity snapshots.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Two entries in one snapshot share an identifier
    #[error("Duplicate entity in snapshot: {0}")]
    DuplicateEntity(String),
    
    /// Accuracy must be a finite, non-negative radius
    #[error("Invalid accuracy {accuracy} for entity {id}")]
    InvalidAccuracy { id: String, accuracy: f64 },
    
    /// The source has no further steps to yield
    #[error("Snapshot source exhausted after step {0}")]
    SourceExhausted(u64),
    
    /// A mobility model stepped a different number of nodes than it reports
    #[error("Mobility model returned {got} positions for {expected} nodes")]
    PositionCount { expected: usize, got: usize },
}

impl EnvError {
    /// Creates a duplicate-entity error.
    pub fn duplicate(id: impl std::fmt::Display) -> Self {
        Self::DuplicateEntity(id.to_string())
    }
}
