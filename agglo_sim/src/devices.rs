//! Device generator - turns raw mobility positions into entity snapshots.
//!
//! Devices are named `"0"` through `"n-1"` in mobility-node order. Every
//! step each device reports its position with a freshly drawn accuracy,
//! uniform in `accuracy = (min, max)`.

use crate::error::{Result, SimError};
use agglo_env::{EntityId, EntitySnapshot, EnvError, MobilityModel, Snapshot, SnapshotSource};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use tracing::warn;

/// Accuracy range used when none is configured (meters).
pub const DEFAULT_ACCURACY: (f64, f64) = (0.0, 50.0);

/// Wraps a [`MobilityModel`] and yields one validated [`Snapshot`] per step.
pub struct DeviceGenerator<M: MobilityModel> {
    model: M,
    ids: Vec<EntityId>,
    accuracy: Uniform<f64>,
    rng: ChaCha8Rng,
    step: u64,
    limit: Option<u64>,
}

impl<M: MobilityModel> DeviceGenerator<M> {
    /// Creates a generator over `model`.
    ///
    /// The accuracy seed is kept separate from the mobility seed so that
    /// trajectories do not depend on the accuracy range.
    pub fn new(model: M, accuracy: (f64, f64), seed: u64) -> Result<Self> {
        let (min, max) = accuracy;
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
            return Err(SimError::config(format!(
                "accuracy range must satisfy 0 <= min <= max, got ({}, {})",
                min, max
            )));
        }

        let ids = (0..model.node_count() as u64).map(EntityId::from).collect();

        Ok(Self {
            model,
            ids,
            accuracy: Uniform::new_inclusive(min, max),
            rng: ChaCha8Rng::seed_from_u64(seed),
            step: 0,
            limit: None,
        })
    }

    /// Stop after `steps` snapshots.
    pub fn with_limit(mut self, steps: u64) -> Self {
        self.limit = Some(steps);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Number of snapshots produced so far.
    pub fn steps_taken(&self) -> u64 {
        self.step
    }

    /// Advance the model one step and assemble the snapshot.
    pub fn try_next(&mut self) -> Result<Snapshot> {
        if self.limit.is_some_and(|limit| self.step >= limit) {
            return Err(EnvError::SourceExhausted(self.step).into());
        }

        let positions = self.model.step();
        if positions.len() != self.ids.len() {
            return Err(EnvError::PositionCount {
                expected: self.ids.len(),
                got: positions.len(),
            }
            .into());
        }

        let entities = self
            .ids
            .iter()
            .zip(positions)
            .map(|(id, position)| {
                let accuracy = self.accuracy.sample(&mut self.rng);
                EntitySnapshot::new(id.clone(), position, accuracy)
            })
            .collect();

        let snapshot = Snapshot::new(self.step, entities)?;
        self.step += 1;
        Ok(snapshot)
    }
}

impl<M: MobilityModel> SnapshotSource for DeviceGenerator<M> {
    fn next_snapshot(&mut self) -> Option<Snapshot> {
        match self.try_next() {
            Ok(snapshot) => Some(snapshot),
            Err(SimError::Env(EnvError::SourceExhausted(_))) => None,
            Err(e) => {
                warn!("Device generator stopped at step {}: {}", self.step, e);
                None
            }
        }
    }
}

impl<M: MobilityModel> Iterator for DeviceGenerator<M> {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Snapshot> {
        self.next_snapshot()
    }
}
