//! The Aggregator - sums per-entity contributions into one occupancy matrix
//!
//! Every entity is independent: its disk is resolved against the grid's
//! read-only candidate index and redistributed without touching shared
//! state. Sequential mode writes straight into the grid. Parallel mode is a
//! map-reduce: entities are cut into shards, each shard accumulates into a
//! private matrix, and the partial matrices are summed elementwise.
//!
//! Shard order does not change the result beyond floating-point summation
//! order.

use crate::error::{OccupancyError, Result};
use crate::geometry::Disk;
use crate::grid::{add_shares, Grid};
use agglo_env::{EntityId, EntitySnapshot};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Default number of entities per parallel shard.
pub const DEFAULT_SHARD_SIZE: usize = 64;

/// How an update is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One thread, contributions written directly into the grid
    #[default]
    Sequential,

    /// Rayon map-reduce over shards of entities
    Parallel {
        /// Dedicated pool size; `None` uses the global rayon pool
        workers: Option<usize>,

        /// Entities per shard
        shard_size: usize,
    },
}

impl ExecutionMode {
    /// Parallel mode on the global rayon pool.
    pub fn parallel() -> Self {
        Self::Parallel {
            workers: None,
            shard_size: DEFAULT_SHARD_SIZE,
        }
    }

    /// Parallel mode on a dedicated pool of `workers` threads.
    pub fn with_workers(workers: usize) -> Self {
        Self::Parallel {
            workers: Some(workers),
            shard_size: DEFAULT_SHARD_SIZE,
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel { .. })
    }
}

/// Outcome of one update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Entities supplied to the update
    pub entities: usize,

    /// Entities whose mass landed on the grid
    pub contributed: usize,

    /// Entities skipped because their disk covered no cell
    pub no_coverage: Vec<EntityId>,

    /// Mass added to the grid
    pub total_mass: f64,
}

impl UpdateReport {
    fn record(&mut self, mass: f64) {
        self.entities += 1;
        self.contributed += 1;
        self.total_mass += mass;
    }

    fn skip(&mut self, id: &EntityId) {
        self.entities += 1;
        self.no_coverage.push(id.clone());
    }

    /// Combine two partial reports; associative, keeps entity order.
    pub fn merge(mut self, other: UpdateReport) -> UpdateReport {
        self.entities += other.entities;
        self.contributed += other.contributed;
        self.no_coverage.extend(other.no_coverage);
        self.total_mass += other.total_mass;
        self
    }

    pub fn no_coverage_count(&self) -> usize {
        self.no_coverage.len()
    }
}

/// Runs updates in the configured [`ExecutionMode`].
pub struct Aggregator {
    mode: ExecutionMode,
    pool: Option<rayon::ThreadPool>,
}

impl Aggregator {
    /// Create an aggregator, building a dedicated thread pool when the
    /// mode names an explicit worker count.
    pub fn new(mode: ExecutionMode) -> Result<Self> {
        let pool = match mode {
            ExecutionMode::Parallel {
                workers: Some(workers),
                ..
            } => {
                if workers == 0 {
                    return Err(OccupancyError::WorkerPool(
                        "worker count must be positive".to_string(),
                    ));
                }
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("agglo-worker-{}", i))
                    .build()
                    .map_err(|e| OccupancyError::WorkerPool(e.to_string()))?;
                Some(pool)
            }
            _ => None,
        };

        Ok(Self { mode, pool })
    }

    /// Single-threaded aggregator.
    pub fn sequential() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            pool: None,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Recompute the grid's occupation from scratch for one snapshot.
    ///
    /// Every entity's geometry is validated before the grid is reset, so an
    /// `InvalidGeometry` error leaves the previous occupation untouched.
    /// Entities whose disk covers no cell are skipped and listed in the
    /// returned report.
    pub fn update(&self, grid: &mut Grid, entities: &[EntitySnapshot]) -> Result<UpdateReport> {
        let disks = entities
            .iter()
            .map(Disk::from_entity)
            .collect::<Result<Vec<_>>>()?;

        let report = match self.mode {
            ExecutionMode::Sequential => update_sequential(grid, entities, &disks)?,
            ExecutionMode::Parallel { shard_size, .. } => {
                let shard_size = shard_size.max(1);
                let shared: &Grid = grid;
                let (matrix, report) = match &self.pool {
                    Some(pool) => pool.install(|| map_reduce(shared, entities, &disks, shard_size))?,
                    None => map_reduce(shared, entities, &disks, shard_size)?,
                };
                grid.set_occupation(matrix);
                report
            }
        };

        trace!(
            "Update: {} entities, {} contributed, {} without coverage, mass {:.6}",
            report.entities,
            report.contributed,
            report.no_coverage_count(),
            report.total_mass
        );

        Ok(report)
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("mode", &self.mode)
            .field("dedicated_pool", &self.pool.is_some())
            .finish()
    }
}

fn update_sequential(grid: &mut Grid, entities: &[EntitySnapshot], disks: &[Disk]) -> Result<UpdateReport> {
    grid.reset_occupation();

    let mut report = UpdateReport::default();
    for (entity, disk) in entities.iter().zip(disks) {
        match grid.contribution(disk) {
            Ok(contribution) => {
                grid.apply(&contribution);
                report.record(contribution.total_mass());
            }
            Err(e) if e.is_recoverable() => {
                warn!("Entity {} skipped: {}", entity.id, e);
                report.skip(&entity.id);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

fn map_reduce(
    grid: &Grid,
    entities: &[EntitySnapshot],
    disks: &[Disk],
    shard_size: usize,
) -> Result<(DMatrix<f64>, UpdateReport)> {
    let (rows, columns) = grid.shape();
    let layout = grid.layout();

    entities
        .par_chunks(shard_size)
        .zip(disks.par_chunks(shard_size))
        .map(|(shard, shard_disks)| {
            let mut matrix = DMatrix::zeros(rows, columns);
            let mut report = UpdateReport::default();

            for (entity, disk) in shard.iter().zip(shard_disks) {
                match grid.contribution(disk) {
                    Ok(contribution) => {
                        add_shares(&mut matrix, layout, &contribution.shares);
                        report.record(contribution.total_mass());
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!("Entity {} skipped: {}", entity.id, e);
                        report.skip(&entity.id);
                    }
                    Err(e) => return Err(e),
                }
            }

            Ok((matrix, report))
        })
        .try_reduce(
            || (DMatrix::zeros(rows, columns), UpdateReport::default()),
            |(m1, r1), (m2, r2)| Ok((m1 + m2, r1.merge(r2))),
        )
}
