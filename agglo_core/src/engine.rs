//! OccupancyEngine - the public facade over grid and aggregator
//!
//! Holds one [`Grid`] for its whole lifetime and recomputes its occupation
//! once per snapshot. Consumers read the occupation or density matrix, or
//! query cells above a threshold.

use crate::aggregator::{Aggregator, ExecutionMode, UpdateReport};
use crate::error::Result;
use crate::grid::{Cell, Grid, GridConfig};
use agglo_env::{EntitySnapshot, Snapshot};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Running counters over the engine's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Completed updates
    pub updates: u64,

    /// Entities skipped for lack of coverage, summed over all updates
    pub no_coverage_total: u64,

    /// Report of the most recent successful update
    pub last_report: Option<UpdateReport>,
}

/// Occupancy and density estimation over a fixed grid.
#[derive(Debug)]
pub struct OccupancyEngine {
    grid: Grid,
    aggregator: Aggregator,
    stats: EngineStats,
}

impl OccupancyEngine {
    /// Build the grid, its index and the aggregator.
    pub fn new(config: &GridConfig, mode: ExecutionMode) -> Result<Self> {
        let grid = Grid::new(config)?;
        let aggregator = Aggregator::new(mode)?;
        debug!("Engine ready: {:?}", aggregator);

        Ok(Self {
            grid,
            aggregator,
            stats: EngineStats::default(),
        })
    }

    /// Sequential engine.
    pub fn sequential(config: &GridConfig) -> Result<Self> {
        Self::new(config, ExecutionMode::Sequential)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn mode(&self) -> ExecutionMode {
        self.aggregator.mode()
    }

    /// Recompute occupation for a set of entities.
    pub fn update(&mut self, entities: &[EntitySnapshot]) -> Result<&UpdateReport> {
        let report = self.aggregator.update(&mut self.grid, entities)?;

        self.stats.updates += 1;
        self.stats.no_coverage_total += report.no_coverage_count() as u64;
        let report: &UpdateReport = self.stats.last_report.insert(report);
        Ok(report)
    }

    /// Recompute occupation for one validated snapshot.
    pub fn update_snapshot(&mut self, snapshot: &Snapshot) -> Result<&UpdateReport> {
        self.update(snapshot.entities())
    }

    pub fn occupation_matrix(&self) -> &DMatrix<f64> {
        self.grid.occupation_matrix()
    }

    pub fn density_matrix(&self) -> DMatrix<f64> {
        self.grid.density_matrix()
    }

    /// Occupation as nested rows, row-major.
    pub fn occupation_rows(&self) -> Vec<Vec<f64>> {
        to_rows(self.grid.occupation_matrix())
    }

    /// Density as nested rows, row-major.
    pub fn density_rows(&self) -> Vec<Vec<f64>> {
        to_rows(&self.grid.density_matrix())
    }

    pub fn check_occupation<F>(&self, predicate: F) -> Vec<(usize, usize)>
    where
        F: Fn(f64) -> bool,
    {
        self.grid.check_occupation(predicate)
    }

    pub fn check_density<F>(&self, predicate: F) -> Vec<(usize, usize)>
    where
        F: Fn(f64) -> bool,
    {
        self.grid.check_density(predicate)
    }

    /// Entities per unit area in the last update (0 before any update).
    pub fn average_density(&self) -> f64 {
        self.stats
            .last_report
            .as_ref()
            .map_or(0.0, |r| r.entities as f64 / self.grid.area())
    }

    pub fn cell(&self, row: usize, column: usize) -> Result<Cell> {
        self.grid.cell(row, column)
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

fn to_rows(matrix: &DMatrix<f64>) -> Vec<Vec<f64>> {
    matrix
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OccupancyError;
    use crate::index::IndexStrategy;
    use approx::assert_relative_eq;

    fn scenario() -> Vec<EntitySnapshot> {
        vec![
            EntitySnapshot::new("a", [1.0, 1.0], 1.0),
            EntitySnapshot::new("b", [3.0, 3.0], 1.0),
            EntitySnapshot::new("c", [2.0, 2.0], 1.0),
            EntitySnapshot::new("d", [5.0, 5.0], 1.0),
        ]
    }

    #[rustfmt::skip]
    fn expected_matrix() -> DMatrix<f64> {
        DMatrix::from_row_slice(6, 6, &[
            0.25, 0.25, 0.0,  0.0,  0.0,  0.0,
            0.25, 0.50, 0.25, 0.0,  0.0,  0.0,
            0.0,  0.25, 0.50, 0.25, 0.0,  0.0,
            0.0,  0.0,  0.25, 0.25, 0.0,  0.0,
            0.0,  0.0,  0.0,  0.0,  0.25, 0.25,
            0.0,  0.0,  0.0,  0.0,  0.25, 0.25,
        ])
    }

    #[test]
    fn test_four_entity_scenario() {
        for strategy in [IndexStrategy::Scan, IndexStrategy::BoundingBox] {
            let config = GridConfig::new(6.0, 6.0, 6, 6).with_strategy(strategy);
            let mut engine = OccupancyEngine::sequential(&config).unwrap();
            engine.update(&scenario()).unwrap();

            let expected = expected_matrix();
            for row in 0..6 {
                for column in 0..6 {
                    assert_relative_eq!(
                        engine.occupation_matrix()[(row, column)],
                        expected[(row, column)],
                        epsilon = 1e-9
                    );
                }
            }

            assert_eq!(engine.check_density(|d| d > 0.3), vec![(1, 1), (2, 2)]);
            assert_eq!(engine.check_occupation(|o| o > 0.3), vec![(1, 1), (2, 2)]);
        }
    }

    #[test]
    fn test_rows_are_row_major() {
        let mut engine = OccupancyEngine::sequential(&GridConfig::new(12.0, 6.0, 6, 6)).unwrap();
        engine.update(&[EntitySnapshot::new(0u64, [11.0, 0.5], 0.0)]).unwrap();

        let rows = engine.occupation_rows();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0][5], 1.0);
        assert_eq!(engine.density_rows()[0][5], 0.5);
    }

    #[test]
    fn test_stats_accumulate() {
        let mut engine = OccupancyEngine::new(&GridConfig::new(6.0, 6.0, 6, 6), ExecutionMode::parallel()).unwrap();
        assert_eq!(engine.average_density(), 0.0);

        let mut entities = scenario();
        entities.push(EntitySnapshot::new("far", [40.0, 40.0], 2.0));

        engine.update(&entities).unwrap();
        let report = engine.update(&entities).unwrap();
        assert_eq!(report.contributed, 4);

        let stats = engine.stats();
        assert_eq!(stats.updates, 2);
        assert_eq!(stats.no_coverage_total, 2);
        assert_relative_eq!(engine.average_density(), 5.0 / 36.0);
    }

    #[test]
    fn test_failed_update_keeps_stats() {
        let mut engine = OccupancyEngine::sequential(&GridConfig::new(6.0, 6.0, 6, 6)).unwrap();
        engine.update(&scenario()).unwrap();

        let bad = [EntitySnapshot::new("nan", [f64::NAN, 1.0], 1.0)];
        assert!(matches!(engine.update(&bad), Err(OccupancyError::InvalidGeometry(_))));
        assert_eq!(engine.stats().updates, 1);
        assert_relative_eq!(engine.grid().total_occupation(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_update_snapshot() {
        let snapshot = Snapshot::new(3, scenario()).unwrap();
        let mut engine = OccupancyEngine::sequential(&GridConfig::new(6.0, 6.0, 6, 6)).unwrap();

        let report = engine.update_snapshot(&snapshot).unwrap();
        assert_eq!(report.entities, 4);
        assert_relative_eq!(engine.cell(1, 1).unwrap().occupation, 0.5, epsilon = 1e-9);
        assert!(engine.cell(6, 0).is_err());
    }
}
