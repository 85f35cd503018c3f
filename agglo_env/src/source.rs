//! Traits implemented by the external mobility collaborator.

use crate::types::Snapshot;

/// Produces raw positions for a fixed population of nodes.
///
/// # Implementations
///
/// - **Simulation**: `RandomWaypoint` in `agglo_sim`
/// - **Replay**: anything that reads recorded traces
///
/// Each call to [`step`](MobilityModel::step) advances the model by one
/// discrete time step and returns exactly `node_count()` positions, in a
/// stable node order.
pub trait MobilityModel {
    /// Number of nodes tracked by the model.
    fn node_count(&self) -> usize;
    
    /// Size of the area the model moves nodes within, as (width, height).
    fn dimensions(&self) -> (f64, f64);
    
    /// Advances one step and returns the new position of every node.
    fn step(&mut self) -> Vec<[f64; 2]>;
}

/// Pull-based sequence of entity snapshots, one per simulation step.
///
/// Identifiers must be unique within a step; accuracy must be non-negative.
/// Both are enforced by [`Snapshot::new`].
pub trait SnapshotSource {
    /// Returns the next snapshot, or `None` once the source is finished.
    fn next_snapshot(&mut self) -> Option<Snapshot>;
}
