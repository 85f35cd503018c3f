//! Experiment configuration.
//!
//! Loadable from JSON; every field has a default so a config file only
//! needs to name what it changes.

use crate::error::{Result, SimError};
use agglo_core::aggregator::DEFAULT_SHARD_SIZE;
use agglo_core::{ExecutionMode, GridConfig, IndexStrategy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How devices move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MobilityKind {
    /// Random waypoint over the tracked area
    RandomWaypoint,

    /// Devices pinned to the listed positions
    Fixed { positions: Vec<[f64; 2]> },
}

/// Parameters of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Master seed
    pub seed: u64,

    /// Number of simulated devices (ignored for fixed mobility)
    pub devices: usize,

    /// Tracked area as (width, height) in meters
    pub dimensions: (f64, f64),

    /// Device speed range in m/s
    pub velocity: (f64, f64),

    /// Reported accuracy range in meters
    pub accuracy: (f64, f64),

    /// Longest pause at a waypoint in seconds
    pub max_pause_time: f64,

    /// Grid cell counts as (rows, columns)
    pub cells: (usize, usize),

    /// Candidate index strategy
    pub strategy: IndexStrategy,

    /// Run updates on rayon
    pub parallel: bool,

    /// Dedicated worker count for parallel updates
    pub workers: Option<usize>,

    /// Entities per parallel shard
    pub shard_size: usize,

    /// Budget of accumulated update time in seconds
    pub sim_total_time: f64,

    /// Hard cap on the number of updates
    pub max_steps: Option<u64>,

    /// Device movement model
    pub mobility: MobilityKind,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            devices: 1000,
            dimensions: (138.0, 138.0),
            velocity: (0.1, 1.4),
            accuracy: (0.0, 3.0),
            max_pause_time: 10.0,
            cells: (6, 6),
            strategy: IndexStrategy::BoundingBox,
            parallel: true,
            workers: None,
            shard_size: DEFAULT_SHARD_SIZE,
            sim_total_time: 120.0,
            max_steps: None,
            mobility: MobilityKind::RandomWaypoint,
        }
    }
}

impl ExperimentConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the number of devices.
    pub fn with_devices(mut self, devices: usize) -> Self {
        self.devices = devices;
        self
    }

    /// Sets the grid cell counts.
    pub fn with_cells(mut self, rows: usize, columns: usize) -> Self {
        self.cells = (rows, columns);
        self
    }

    /// Sets the candidate index strategy.
    pub fn with_strategy(mut self, strategy: IndexStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Runs updates on a dedicated pool of `workers` threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.parallel = true;
        self.workers = Some(workers);
        self
    }

    /// Runs updates on the calling thread.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self.workers = None;
        self
    }

    /// Caps the number of updates.
    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Sets the update-time budget.
    pub fn with_time_budget(mut self, secs: f64) -> Self {
        self.sim_total_time = secs;
        self
    }

    /// Grid parameters for the engine.
    pub fn grid_config(&self) -> GridConfig {
        let (width, height) = self.dimensions;
        let (rows, columns) = self.cells;
        GridConfig::new(width, height, rows, columns).with_strategy(self.strategy)
    }

    /// Execution mode for the engine.
    pub fn execution_mode(&self) -> ExecutionMode {
        if self.parallel {
            ExecutionMode::Parallel {
                workers: self.workers,
                shard_size: self.shard_size,
            }
        } else {
            ExecutionMode::Sequential
        }
    }

    /// Number of devices the mobility model will produce.
    pub fn device_count(&self) -> usize {
        match &self.mobility {
            MobilityKind::RandomWaypoint => self.devices,
            MobilityKind::Fixed { positions } => positions.len(),
        }
    }

    /// Reject settings that cannot run at all.
    ///
    /// Grid and mobility parameters are checked again by the components
    /// that use them.
    pub fn validate(&self) -> Result<()> {
        if !self.sim_total_time.is_finite() || self.sim_total_time <= 0.0 {
            return Err(SimError::config(format!(
                "time budget must be positive, got {}",
                self.sim_total_time
            )));
        }
        if self.max_steps == Some(0) {
            return Err(SimError::config("max_steps must be positive"));
        }
        if self.shard_size == 0 {
            return Err(SimError::config("shard_size must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_experiment_preset() {
        let config = ExperimentConfig::default();
        assert_eq!(config.devices, 1000);
        assert_eq!(config.dimensions, (138.0, 138.0));
        assert_eq!(config.cells, (6, 6));
        assert_eq!(config.sim_total_time, 120.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "devices": 5, "cells": [8, 8], "strategy": "quadtree",
                        "mobility": { "kind": "fixed", "positions": [[1.0, 2.0]] } }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.devices, 5);
        assert_eq!(config.strategy, IndexStrategy::Quadtree);
        assert_eq!(config.velocity, (0.1, 1.4));
        assert_eq!(config.device_count(), 1);
        assert_eq!(config.grid_config().rows, 8);
    }

    #[test]
    fn test_execution_mode() {
        let config = ExperimentConfig::default().sequential();
        assert_eq!(config.execution_mode(), ExecutionMode::Sequential);

        let config = config.with_workers(3);
        assert_eq!(
            config.execution_mode(),
            ExecutionMode::Parallel { workers: Some(3), shard_size: DEFAULT_SHARD_SIZE }
        );
    }

    #[test]
    fn test_validate_rejects_bad_budget() {
        assert!(ExperimentConfig::default().with_time_budget(0.0).validate().is_err());
        let mut config = ExperimentConfig::default();
        config.max_steps = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!("agglo_config_{}.json", std::process::id()));
        let config = ExperimentConfig::default().with_devices(7).with_max_steps(3);
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = ExperimentConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);

        assert!(matches!(
            ExperimentConfig::from_json_file("/nonexistent/agglo.json"),
            Err(SimError::Io(_))
        ));
    }
}
