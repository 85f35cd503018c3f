//! Agglo Simulation Harness
//!
//! Drives the occupancy engine with simulated crowds and times each update:
//!
//! ```text
//! RandomWaypoint ──positions──► DeviceGenerator ──Snapshot──► OccupancyEngine
//!   (mobility)                  (ids + accuracy)                   │
//!                                                                  ▼
//!                                      ExperimentRunner ◄── timing, mass checks
//!                                             │
//!                                             ▼
//!                                   ExperimentResult / DensityExport
//! ```
//!
//! All randomness derives from one 64-bit seed, so runs are reproducible.
//!
//! # Usage
//!
//! ```ignore
//! use agglo_sim::{ExperimentRunner, ScenarioId};
//!
//! let runner = ExperimentRunner::new(ScenarioId::Agglo.config(42))?;
//! let result = runner.run()?;
//! println!("avg update {:.4}s", result.avg_update_secs);
//! ```

mod config;
mod devices;
mod error;
mod exporter;
mod mobility;
mod runner;
pub mod scenarios;

pub use config::{ExperimentConfig, MobilityKind};
pub use devices::{DeviceGenerator, DEFAULT_ACCURACY};
pub use error::{Result, SimError};
pub use exporter::{DensityExport, DensityFrame};
pub use mobility::{FixedPositions, RandomWaypoint, STEP_SECS};
pub use runner::{ExperimentResult, ExperimentRunner};
pub use scenarios::ScenarioId;
