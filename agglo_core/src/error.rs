//! Error taxonomy for the occupancy engine.

use thiserror::Error;

/// Errors raised by geometry, grid construction and updates.
#[derive(Debug, Error)]
pub enum OccupancyError {
    /// Negative/non-finite radius, non-finite position or a degenerate rectangle
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    
    /// Non-positive cell counts, or a quadtree grid that is not square with power-of-two sides
    #[error("Invalid grid shape: {0}")]
    InvalidGridShape(String),
    
    /// Cell access outside `[0, rows) x [0, columns)`
    #[error("Cell ({row}, {column}) out of range for {rows}x{columns} grid")]
    IndexOutOfRange {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },
    
    /// The disk intersects no cell of the grid
    #[error("Disk centred at ({x}, {y}) with radius {radius} covers no cell")]
    NoCoverage { x: f64, y: f64, radius: f64 },
    
    /// Dedicated worker pool could not be created
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl OccupancyError {
    /// Creates an invalid-geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }
    
    /// Creates an invalid-grid-shape error.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::InvalidGridShape(msg.into())
    }
    
    /// True for conditions an update absorbs instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoCoverage { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OccupancyError>;
