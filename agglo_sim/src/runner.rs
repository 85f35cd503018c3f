//! Experiment runner - drives the engine with simulated devices and times it.

use crate::config::{ExperimentConfig, MobilityKind};
use crate::devices::DeviceGenerator;
use crate::error::Result;
use crate::mobility::{FixedPositions, RandomWaypoint};
use agglo_core::OccupancyEngine;
use agglo_env::{Snapshot, SnapshotSource};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Results from running an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// Seed used
    pub seed: u64,

    /// Completed updates
    pub iterations: u64,

    /// Mean wall-clock time per update
    pub avg_update_secs: f64,

    /// Accumulated wall-clock time over all updates
    pub total_update_secs: f64,

    /// Entities skipped for lack of coverage, over all updates
    pub no_coverage_total: u64,

    /// Largest |mass on grid - contributing entities| seen in any update
    pub max_mass_error: f64,

    /// Devices per unit area in the last update
    pub average_density: f64,
}

/// Runs one configured experiment.
pub struct ExperimentRunner {
    config: ExperimentConfig,
}

impl ExperimentRunner {
    /// Creates a runner, rejecting configs that cannot run.
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Runs the experiment to completion.
    pub fn run(&self) -> Result<ExperimentResult> {
        self.run_with(|_, _| {})
    }

    /// Runs the experiment, calling `on_update` after every update.
    pub fn run_with<F>(&self, mut on_update: F) -> Result<ExperimentResult>
    where
        F: FnMut(&Snapshot, &OccupancyEngine),
    {
        let config = &self.config;
        let mut engine = OccupancyEngine::new(&config.grid_config(), config.execution_mode())?;

        info!(
            "Starting experiment: {} devices, {}x{} area, {}x{} cells, index={}, mode={:?} (seed={})",
            config.device_count(),
            config.dimensions.0,
            config.dimensions.1,
            config.cells.0,
            config.cells.1,
            config.strategy,
            config.execution_mode(),
            config.seed
        );
        info!("Cell area: {:.3} m^2", engine.grid().cell_area());

        // Trajectories and accuracies draw from independent streams
        let accuracy_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);

        match &config.mobility {
            MobilityKind::RandomWaypoint => {
                let model = RandomWaypoint::new(
                    config.devices,
                    config.dimensions,
                    config.velocity,
                    config.max_pause_time,
                    config.seed,
                )?;
                let mut source = DeviceGenerator::new(model, config.accuracy, accuracy_seed)?;
                self.drive(&mut source, &mut engine, &mut on_update)
            }
            MobilityKind::Fixed { positions } => {
                let model = FixedPositions::new(positions.clone(), config.dimensions);
                let mut source = DeviceGenerator::new(model, config.accuracy, accuracy_seed)?;
                self.drive(&mut source, &mut engine, &mut on_update)
            }
        }
    }

    fn drive<S, F>(&self, source: &mut S, engine: &mut OccupancyEngine, on_update: &mut F) -> Result<ExperimentResult>
    where
        S: SnapshotSource,
        F: FnMut(&Snapshot, &OccupancyEngine),
    {
        let config = &self.config;
        let mut iterations = 0u64;
        let mut total_update_secs = 0.0;
        let mut max_mass_error: f64 = 0.0;

        while total_update_secs < config.sim_total_time
            && config.max_steps.map_or(true, |max| iterations < max)
        {
            let Some(snapshot) = source.next_snapshot() else {
                break;
            };

            let start = Instant::now();
            let report = engine.update_snapshot(&snapshot)?;
            let elapsed = start.elapsed().as_secs_f64();

            max_mass_error = max_mass_error.max((report.total_mass - report.contributed as f64).abs());
            total_update_secs += elapsed;
            iterations += 1;

            debug!(
                "  step={} | contributed={} | no_coverage={} | {:.4}s",
                snapshot.step(),
                report.contributed,
                report.no_coverage_count(),
                elapsed
            );

            on_update(&snapshot, engine);
        }

        let avg_update_secs = if iterations > 0 {
            total_update_secs / iterations as f64
        } else {
            0.0
        };

        info!(
            "✓ Experiment complete: {} iterations, avg update {:.4}s",
            iterations, avg_update_secs
        );

        Ok(ExperimentResult {
            seed: config.seed,
            iterations,
            avg_update_secs,
            total_update_secs,
            no_coverage_total: engine.stats().no_coverage_total,
            max_mass_error,
            average_density: engine.average_density(),
        })
    }
}
