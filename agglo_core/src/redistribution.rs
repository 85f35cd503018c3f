//! The Mass Redistributor
//!
//! Turns the raw intersection areas of one disk into a conserved split of
//! its unit probability mass.
//!
//! # Formula
//! ```text
//! T        = Σ area_i                       (area of the disk inside the grid)
//! missing  = clamp(1 - T / A, 0, 1)         (A = π·r², the full disk area)
//! share_i  = area_i / A  +  (area_i / T) · missing
//!          = (area_i / T) · (1 - missing)  +  (area_i / T) · missing
//! ```
//!
//! Mass that falls inside a cell is assigned directly. Mass that falls
//! outside the tracked area is handed back to the touched cells in
//! proportion to what each already received, so `Σ share_i = 1` whenever
//! `T > 0`.
//!
//! Both terms are weighted by `area_i / T`, never divided by `A` alone:
//! `A` overflows to infinity for radii above ~1e154 while `T` stays
//! bounded by the grid area.

use crate::error::{OccupancyError, Result};
use crate::geometry::Disk;
use crate::index::CellHit;

/// Mass assigned to one cell by one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellShare {
    /// Row-major flat cell index
    pub cell: usize,

    /// Probability mass in `(0, 1]`
    pub mass: f64,
}

/// The full contribution of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    /// Per-cell mass, sorted by cell index
    pub shares: Vec<CellShare>,

    /// Fraction of the disk's geometric area that lies inside the grid
    pub retained_fraction: f64,
}

impl Contribution {
    /// Whole unit mass on a single cell (point-mass entity).
    pub fn point(cell: usize) -> Self {
        Self {
            shares: vec![CellShare { cell, mass: 1.0 }],
            retained_fraction: 1.0,
        }
    }

    /// Sum of all shares; 1.0 up to rounding.
    pub fn total_mass(&self) -> f64 {
        self.shares.iter().map(|s| s.mass).sum()
    }

    /// True when part of the disk lay outside the grid and was redistributed.
    pub fn was_redistributed(&self) -> bool {
        self.retained_fraction < 1.0
    }
}

/// Split one disk's unit mass over the cells it intersects.
///
/// `hits` must hold only non-empty intersections. Fails with `NoCoverage`
/// when the disk covers no area of the grid.
pub fn redistribute(disk: &Disk, hits: &[CellHit]) -> Result<Contribution> {
    let total_common: f64 = hits.iter().map(|h| h.area).sum();
    let disk_area = disk.area();

    if total_common <= 0.0 {
        let center = disk.center();
        return Err(OccupancyError::NoCoverage {
            x: center.x,
            y: center.y,
            radius: disk.radius(),
        });
    }

    // Slightly negative at full containment due to rounding
    let missing = (1.0 - total_common / disk_area).clamp(0.0, 1.0);
    let retained = 1.0 - missing;

    let shares = hits
        .iter()
        .map(|h| {
            let weight = h.area / total_common;
            CellShare {
                cell: h.cell,
                mass: weight * retained + weight * missing,
            }
        })
        .collect();

    Ok(Contribution {
        shares,
        retained_fraction: retained,
    })
}
