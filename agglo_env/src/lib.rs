//! Agglo Environment Abstraction Layer
//!
//! This crate is the narrow seam between the occupancy engine and whatever
//! produces entity positions. The engine never simulates motion: it only
//! consumes one [`Snapshot`] per simulation step.
//!
//! # Data Flow
//!
//! ```text
//! MobilityModel ──positions──► SnapshotSource ──Snapshot──► OccupancyEngine
//!  (waypoints,                  (ids + accuracy)              (agglo_core)
//!   traces, ...)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use agglo_env::{SnapshotSource, Snapshot};
//!
//! fn drive<S: SnapshotSource>(source: &mut S) {
//!     while let Some(snapshot) = source.next_snapshot() {
//!         engine.update_snapshot(&snapshot)?;
//!     }
//! }
//! ```

mod error;
mod source;
mod types;

pub use error::EnvError;
pub use source::{MobilityModel, SnapshotSource};
pub use types::{EntityId, EntitySnapshot, Snapshot};
