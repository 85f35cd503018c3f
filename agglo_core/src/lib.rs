//! Agglo Core - probabilistic occupancy and density over a regular grid
//!
//! Each tracked entity is modelled as a disk of unit probability mass
//! (centre = reported position, radius = accuracy). The engine computes how
//! much of that mass falls into each cell of a fixed grid:
//!
//! 1. **Geometry Kernel** ([`geometry`]): exact disk ∩ rectangle areas
//! 2. **Grid** ([`grid`]): cell layout, occupation matrix, derived density
//! 3. **Candidate Index** ([`index`], [`quadtree`]): which cells a disk can touch
//! 4. **Mass Redistributor** ([`redistribution`]): conserves mass at the borders
//! 5. **Aggregator** ([`aggregator`]): sequential or rayon map-reduce updates
//!
//! [`OccupancyEngine`] ties them together.
//!
//! ```ignore
//! use agglo_core::{GridConfig, OccupancyEngine};
//! use agglo_env::EntitySnapshot;
//!
//! let mut engine = OccupancyEngine::sequential(&GridConfig::new(6.0, 6.0, 6, 6))?;
//! engine.update(&[EntitySnapshot::new("a", [1.0, 1.0], 1.0)])?;
//! let hot = engine.check_density(|d| d > 0.2);
//! ```

pub mod aggregator;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod index;
pub mod quadtree;
pub mod redistribution;

// Re-export key types for convenience
pub use aggregator::{Aggregator, ExecutionMode, UpdateReport};
pub use engine::{EngineStats, OccupancyEngine};
pub use error::{OccupancyError, Result};
pub use geometry::{disk_area, intersection_area, intersects, Disk};
pub use grid::{Cell, Grid, GridConfig, GridLayout};
pub use index::{build_index, CandidateIndex, CellHit, IndexStrategy};
pub use quadtree::QuadtreeIndex;
pub use redistribution::{redistribute, CellShare, Contribution};
