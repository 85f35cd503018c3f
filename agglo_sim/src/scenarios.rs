//! Named experiment presets.

use crate::config::{ExperimentConfig, MobilityKind};
use agglo_core::IndexStrategy;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Small crowd on a coarse grid, watched step by step
    Agglo,

    /// Timed run: 1000 devices over ~19000 m², 120 s update budget
    Experiment,

    /// Fine quadtree grid for profiling the index
    Profile,

    /// One device on the corner of the area, three quarters of its disk outside
    WallClose,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Agglo,
            ScenarioId::Experiment,
            ScenarioId::Profile,
            ScenarioId::WallClose,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Agglo => "agglo",
            ScenarioId::Experiment => "experiment",
            ScenarioId::Profile => "profile",
            ScenarioId::WallClose => "wall_close",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Agglo => "20 devices, 100x100 m, 6x6 cells",
            ScenarioId::Experiment => "1000 devices, 138x138 m, 6x6 cells, 120 s budget",
            ScenarioId::Profile => "20 devices, 100x100 m, 256x256 quadtree cells, 10 updates",
            ScenarioId::WallClose => "1 device at (0, 0) with 1 m accuracy on a 6x6 m grid",
        }
    }

    /// Preset configuration for this scenario.
    pub fn config(&self, seed: u64) -> ExperimentConfig {
        let base = ExperimentConfig::default().with_seed(seed);

        match self {
            ScenarioId::Agglo => ExperimentConfig {
                devices: 20,
                dimensions: (100.0, 100.0),
                parallel: false,
                ..base
            }
            .with_max_steps(100),
            ScenarioId::Experiment => base,
            ScenarioId::Profile => ExperimentConfig {
                devices: 20,
                dimensions: (100.0, 100.0),
                cells: (256, 256),
                strategy: IndexStrategy::Quadtree,
                ..base
            }
            .with_max_steps(10),
            ScenarioId::WallClose => ExperimentConfig {
                dimensions: (6.0, 6.0),
                accuracy: (1.0, 1.0),
                parallel: false,
                mobility: MobilityKind::Fixed {
                    positions: vec![[0.0, 0.0]],
                },
                ..base
            }
            .with_max_steps(1),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "agglo" | "overcrowd" => Ok(ScenarioId::Agglo),
            "experiment" | "exp" => Ok(ScenarioId::Experiment),
            "profile" | "prof" => Ok(ScenarioId::Profile),
            "wall_close" | "wallclose" | "wall" => Ok(ScenarioId::WallClose),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
