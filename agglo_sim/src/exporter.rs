//! JSON exporter for occupancy and density frames.
//!
//! Exports per-step matrices as nested row-major arrays so that plotting
//! scripts can render them as heat maps.

use crate::error::Result;
use agglo_core::OccupancyEngine;
use agglo_env::Snapshot;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single exported step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityFrame {
    /// Simulation step
    pub step: u64,

    /// Occupation rows
    pub occupation: Vec<Vec<f64>>,

    /// Density rows
    pub density: Vec<Vec<f64>>,

    /// Devices skipped in this step
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub no_coverage: Vec<String>,
}

impl DensityFrame {
    /// Captures the engine's current matrices.
    pub fn capture(snapshot: &Snapshot, engine: &OccupancyEngine) -> Self {
        let no_coverage = engine
            .stats()
            .last_report
            .as_ref()
            .map(|r| r.no_coverage.iter().map(|id| id.to_string()).collect())
            .unwrap_or_default();

        Self {
            step: snapshot.step(),
            occupation: engine.occupation_rows(),
            density: engine.density_rows(),
            no_coverage,
        }
    }
}

/// Complete density export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Grid shape
    pub rows: usize,
    pub columns: usize,

    /// Area of one cell
    pub cell_area: f64,

    /// All frames
    pub frames: Vec<DensityFrame>,
}

impl DensityExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, engine: &OccupancyEngine) -> Self {
        let grid = engine.grid();
        Self {
            scenario: scenario.to_string(),
            seed,
            rows: grid.rows(),
            columns: grid.columns(),
            cell_area: grid.cell_area(),
            frames: Vec::new(),
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: DensityFrame) {
        self.frames.push(frame);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
