//! The Grid - fixed partition of the tracked area into equal cells
//!
//! Cells are laid out row-major: row `i` spans `y ∈ [i·h, (i+1)·h]` and
//! column `j` spans `x ∈ [j·w, (j+1)·w]`, with `(w, h) = (width/columns,
//! height/rows)`. The layout and the candidate index are built once at
//! construction and stay read-only for the grid's lifetime; only the
//! occupation matrix changes between updates.

use crate::error::{OccupancyError, Result};
use crate::geometry::{rect_area, Disk};
use crate::index::{build_index, CandidateIndex, IndexStrategy};
use crate::redistribution::{redistribute, CellShare, Contribution};
use geo::{Coord, Rect};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Construction parameters for a [`Grid`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Width of the tracked area (x extent)
    pub width: f64,

    /// Height of the tracked area (y extent)
    pub height: f64,

    /// Number of cell rows (along y)
    pub rows: usize,

    /// Number of cell columns (along x)
    pub columns: usize,

    /// Candidate index used to find the cells a disk touches
    #[serde(default)]
    pub strategy: IndexStrategy,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
            rows: 12,
            columns: 12,
            strategy: IndexStrategy::BoundingBox,
        }
    }
}

impl GridConfig {
    /// Create a config for a `width x height` area split into `rows x columns` cells.
    pub fn new(width: f64, height: f64, rows: usize, columns: usize) -> Self {
        Self {
            width,
            height,
            rows,
            columns,
            ..Default::default()
        }
    }

    /// Sets the candidate index strategy.
    pub fn with_strategy(mut self, strategy: IndexStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the cell counts.
    pub fn with_cells(mut self, rows: usize, columns: usize) -> Self {
        self.rows = rows;
        self.columns = columns;
        self
    }
}

/// Immutable geometry of a grid: area, cell counts and cell bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    width: f64,
    height: f64,
    rows: usize,
    columns: usize,
    cell_width: f64,
    cell_height: f64,
}

impl GridLayout {
    /// Validate dimensions and cell counts.
    pub fn new(width: f64, height: f64, rows: usize, columns: usize) -> Result<Self> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(OccupancyError::geometry(format!(
                "degenerate tracked area {} x {}",
                width, height
            )));
        }
        if rows == 0 || columns == 0 {
            return Err(OccupancyError::shape(format!(
                "cell counts must be positive, got {} x {}",
                rows, columns
            )));
        }

        Ok(Self {
            width,
            height,
            rows,
            columns,
            cell_width: width / columns as f64,
            cell_height: height / rows as f64,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.columns
    }

    /// Cell size as (width, height).
    pub fn cell_size(&self) -> (f64, f64) {
        (self.cell_width, self.cell_height)
    }

    pub fn cell_area(&self) -> f64 {
        self.cell_width * self.cell_height
    }

    /// Total tracked area.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Bounds of the whole tracked area.
    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            Coord { x: 0.0, y: 0.0 },
            Coord { x: self.width, y: self.height },
        )
    }

    /// Row-major flat index of a cell.
    pub fn flat_index(&self, row: usize, column: usize) -> usize {
        row * self.columns + column
    }

    /// Inverse of [`flat_index`](Self::flat_index).
    pub fn position(&self, index: usize) -> (usize, usize) {
        (index / self.columns, index % self.columns)
    }

    /// Bounds of a single cell.
    pub fn cell_bounds(&self, row: usize, column: usize) -> Rect<f64> {
        self.block_bounds(row, column, 1, 1)
    }

    /// Bounds of a block of `span_rows x span_columns` cells starting at (row, column).
    ///
    /// Edges are computed from integer cell boundaries so that a block and
    /// the cells it covers share exactly the same coordinates.
    pub fn block_bounds(&self, row: usize, column: usize, span_rows: usize, span_columns: usize) -> Rect<f64> {
        Rect::new(
            Coord { x: self.x_edge(column), y: self.y_edge(row) },
            Coord {
                x: self.x_edge(column + span_columns),
                y: self.y_edge(row + span_rows),
            },
        )
    }

    /// Cell containing a point.
    ///
    /// Cells are half-open `[min, max)` except along the far edges of the
    /// area, which belong to the last row/column.
    pub fn locate(&self, point: Coord<f64>) -> Option<usize> {
        if !(0.0..=self.width).contains(&point.x) || !(0.0..=self.height).contains(&point.y) {
            return None;
        }

        let column = ((point.x / self.cell_width).floor() as usize).min(self.columns - 1);
        let row = ((point.y / self.cell_height).floor() as usize).min(self.rows - 1);

        Some(self.flat_index(row, column))
    }

    fn x_edge(&self, column: usize) -> f64 {
        if column >= self.columns {
            self.width
        } else {
            column as f64 * self.cell_width
        }
    }

    fn y_edge(&self, row: usize) -> f64 {
        if row >= self.rows {
            self.height
        } else {
            row as f64 * self.cell_height
        }
    }
}

/// Read-only view of one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Zero-based row index
    pub row: usize,

    /// Zero-based column index
    pub column: usize,

    /// Cell bounds in area coordinates
    pub bounds: Rect<f64>,

    /// Accumulated probability mass
    pub occupation: f64,
}

impl Cell {
    pub fn area(&self) -> f64 {
        rect_area(&self.bounds)
    }

    /// Occupation per unit area.
    pub fn density(&self) -> f64 {
        self.occupation / self.area()
    }
}

/// The occupancy grid.
///
/// Owns the layout, the candidate index and the occupation matrix. The
/// index is built exactly once here and reused by every update.
pub struct Grid {
    layout: GridLayout,
    index: Box<dyn CandidateIndex>,
    occupation: DMatrix<f64>,
}

impl Grid {
    /// Build a grid and its candidate index.
    ///
    /// Fails with `InvalidGridShape` for non-positive counts, or for a
    /// quadtree strategy on a grid that is not square with power-of-two sides.
    pub fn new(config: &GridConfig) -> Result<Self> {
        let layout = GridLayout::new(config.width, config.height, config.rows, config.columns)?;
        let index = build_index(&layout, config.strategy)?;

        debug!(
            "Grid {}x{} over {}x{} area, cell area {:.4}, index={}",
            layout.rows(),
            layout.columns(),
            layout.width(),
            layout.height(),
            layout.cell_area(),
            config.strategy
        );

        let occupation = DMatrix::zeros(layout.rows(), layout.columns());

        Ok(Self {
            layout,
            index,
            occupation,
        })
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn rows(&self) -> usize {
        self.layout.rows()
    }

    pub fn columns(&self) -> usize {
        self.layout.columns()
    }

    /// Shape as (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        (self.layout.rows(), self.layout.columns())
    }

    pub fn cell_area(&self) -> f64 {
        self.layout.cell_area()
    }

    pub fn area(&self) -> f64 {
        self.layout.area()
    }

    pub fn strategy(&self) -> IndexStrategy {
        self.index.strategy()
    }

    pub fn index(&self) -> &dyn CandidateIndex {
        self.index.as_ref()
    }

    /// Access one cell; out-of-range access is a contract violation.
    pub fn cell(&self, row: usize, column: usize) -> Result<Cell> {
        if row >= self.rows() || column >= self.columns() {
            return Err(OccupancyError::IndexOutOfRange {
                row,
                column,
                rows: self.rows(),
                columns: self.columns(),
            });
        }

        Ok(Cell {
            row,
            column,
            bounds: self.layout.cell_bounds(row, column),
            occupation: self.occupation[(row, column)],
        })
    }

    /// Zero every cell's occupation.
    pub fn reset_occupation(&mut self) {
        self.occupation.fill(0.0);
    }

    /// Occupation matrix, shape (rows, columns).
    pub fn occupation_matrix(&self) -> &DMatrix<f64> {
        &self.occupation
    }

    /// Density matrix, derived on read as `occupation / cell_area`.
    pub fn density_matrix(&self) -> DMatrix<f64> {
        let cell_area = self.cell_area();
        self.occupation.map(|v| v / cell_area)
    }

    /// Sum of all occupation.
    pub fn total_occupation(&self) -> f64 {
        self.occupation.sum()
    }

    /// Cells whose occupation satisfies `predicate`, in row-major order.
    pub fn check_occupation<F>(&self, predicate: F) -> Vec<(usize, usize)>
    where
        F: Fn(f64) -> bool,
    {
        scan_matrix(&self.occupation, predicate)
    }

    /// Cells whose density satisfies `predicate`, in row-major order.
    pub fn check_density<F>(&self, predicate: F) -> Vec<(usize, usize)>
    where
        F: Fn(f64) -> bool,
    {
        let cell_area = self.cell_area();
        scan_matrix(&self.occupation, |v| predicate(v / cell_area))
    }

    /// Probability mass one disk contributes to each cell.
    ///
    /// A point mass goes entirely to the cell containing it. So does a disk
    /// too small to register any intersection area while its centre lies
    /// on the grid. Returns `NoCoverage` when the disk touches no cell.
    pub fn contribution(&self, disk: &Disk) -> Result<Contribution> {
        if !disk.is_point() {
            let hits = self.index.candidates(disk);
            if !hits.is_empty() {
                return redistribute(disk, &hits);
            }
        }

        let center = disk.center();
        match self.layout.locate(center) {
            Some(cell) => Ok(Contribution::point(cell)),
            None => Err(OccupancyError::NoCoverage {
                x: center.x,
                y: center.y,
                radius: disk.radius(),
            }),
        }
    }

    /// Add a contribution into this grid's occupation.
    pub fn apply(&mut self, contribution: &Contribution) {
        add_shares(&mut self.occupation, &self.layout, &contribution.shares);
    }

    /// Replace the occupation with a fully reduced matrix.
    pub(crate) fn set_occupation(&mut self, matrix: DMatrix<f64>) {
        debug_assert_eq!(matrix.shape(), self.shape());
        self.occupation = matrix;
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("layout", &self.layout)
            .field("strategy", &self.strategy())
            .field("total_occupation", &self.total_occupation())
            .finish()
    }
}

/// Accumulate cell shares into a (rows, columns) matrix.
pub(crate) fn add_shares(matrix: &mut DMatrix<f64>, layout: &GridLayout, shares: &[CellShare]) {
    for share in shares {
        let (row, column) = layout.position(share.cell);
        matrix[(row, column)] += share.mass;
    }
}

fn scan_matrix<F>(matrix: &DMatrix<f64>, predicate: F) -> Vec<(usize, usize)>
where
    F: Fn(f64) -> bool,
{
    let mut indices = Vec::new();
    for row in 0..matrix.nrows() {
        for column in 0..matrix.ncols() {
            if predicate(matrix[(row, column)]) {
                indices.push((row, column));
            }
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_creation() {
        let grid = Grid::new(&GridConfig::new(250.0, 100.0, 100, 100)).unwrap();

        assert_eq!(grid.rows(), 100);
        assert_eq!(grid.columns(), 100);
        assert_eq!(grid.layout().cell_size(), (2.5, 1.0));
        assert_relative_eq!(grid.cell_area(), 2.5);
        assert_relative_eq!(grid.area(), 25_000.0);

        for row in 0..grid.rows() {
            for column in 0..grid.columns() {
                let cell = grid.cell(row, column).unwrap();
                assert_eq!(cell.occupation, 0.0);
                assert_eq!(cell.density(), 0.0);
            }
        }
    }

    #[test]
    fn test_rejects_non_positive_counts() {
        let err = Grid::new(&GridConfig::new(10.0, 10.0, 0, 4)).unwrap_err();
        assert!(matches!(err, OccupancyError::InvalidGridShape(_)));

        let err = Grid::new(&GridConfig::new(10.0, 10.0, 4, 0)).unwrap_err();
        assert!(matches!(err, OccupancyError::InvalidGridShape(_)));
    }

    #[test]
    fn test_rejects_degenerate_area() {
        let err = Grid::new(&GridConfig::new(0.0, 10.0, 4, 4)).unwrap_err();
        assert!(matches!(err, OccupancyError::InvalidGeometry(_)));

        let err = Grid::new(&GridConfig::new(10.0, f64::NAN, 4, 4)).unwrap_err();
        assert!(matches!(err, OccupancyError::InvalidGeometry(_)));
    }

    #[test]
    fn test_cell_out_of_range() {
        let grid = Grid::new(&GridConfig::new(6.0, 6.0, 6, 6)).unwrap();

        assert!(grid.cell(5, 5).is_ok());
        assert!(matches!(
            grid.cell(6, 0),
            Err(OccupancyError::IndexOutOfRange { row: 6, column: 0, rows: 6, columns: 6 })
        ));
        assert!(grid.cell(0, 6).is_err());
    }

    #[test]
    fn test_cell_bounds_follow_rows_and_columns() {
        let layout = GridLayout::new(8.0, 4.0, 2, 4).unwrap();
        let bounds = layout.cell_bounds(1, 3);

        assert_eq!(bounds.min(), Coord { x: 6.0, y: 2.0 });
        assert_eq!(bounds.max(), Coord { x: 8.0, y: 4.0 });
        assert_eq!(layout.block_bounds(0, 0, 2, 4), layout.bounds());
    }

    #[test]
    fn test_flat_index_roundtrip() {
        let layout = GridLayout::new(10.0, 10.0, 3, 7).unwrap();
        for index in 0..layout.cell_count() {
            let (row, column) = layout.position(index);
            assert_eq!(layout.flat_index(row, column), index);
        }
    }

    #[test]
    fn test_locate_point() {
        let layout = GridLayout::new(6.0, 6.0, 6, 6).unwrap();

        assert_eq!(layout.locate(Coord { x: 0.5, y: 0.5 }), Some(0));
        assert_eq!(layout.locate(Coord { x: 1.0, y: 2.0 }), Some(layout.flat_index(2, 1)));
        // Far edges belong to the last row/column
        assert_eq!(layout.locate(Coord { x: 6.0, y: 6.0 }), Some(35));
        assert_eq!(layout.locate(Coord { x: -0.1, y: 1.0 }), None);
        assert_eq!(layout.locate(Coord { x: 1.0, y: 6.1 }), None);
    }

    #[test]
    fn test_density_is_occupation_over_cell_area() {
        let mut grid = Grid::new(&GridConfig::new(10.0, 5.0, 2, 2)).unwrap();
        let disk = Disk::new(Coord { x: 2.5, y: 1.25 }, 1.0).unwrap();
        let contribution = grid.contribution(&disk).unwrap();
        grid.apply(&contribution);

        let occupation = grid.occupation_matrix().clone();
        let density = grid.density_matrix();
        for row in 0..2 {
            for column in 0..2 {
                assert_eq!(density[(row, column)], occupation[(row, column)] / grid.cell_area());
            }
        }
        assert_relative_eq!(grid.total_occupation(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reset_occupation() {
        let mut grid = Grid::new(&GridConfig::new(4.0, 4.0, 4, 4)).unwrap();
        let disk = Disk::new(Coord { x: 2.0, y: 2.0 }, 1.0).unwrap();
        let contribution = grid.contribution(&disk).unwrap();
        grid.apply(&contribution);
        assert!(grid.total_occupation() > 0.0);

        grid.reset_occupation();
        assert_eq!(grid.total_occupation(), 0.0);
    }

    #[test]
    fn test_point_mass_contribution() {
        let grid = Grid::new(&GridConfig::new(6.0, 6.0, 6, 6)).unwrap();

        let inside = Disk::new(Coord { x: 2.5, y: 4.5 }, 0.0).unwrap();
        let contribution = grid.contribution(&inside).unwrap();
        assert_eq!(contribution.shares, vec![CellShare { cell: 4 * 6 + 2, mass: 1.0 }]);

        let outside = Disk::new(Coord { x: 7.0, y: 1.0 }, 0.0).unwrap();
        assert!(matches!(
            grid.contribution(&outside),
            Err(OccupancyError::NoCoverage { .. })
        ));
    }

    #[test]
    fn test_vanishing_disk_is_point_mass() {
        for strategy in [IndexStrategy::Scan, IndexStrategy::BoundingBox] {
            let grid = Grid::new(&GridConfig::new(6.0, 6.0, 6, 6).with_strategy(strategy)).unwrap();

            let tiny = Disk::new(Coord { x: 2.5, y: 2.5 }, 1e-170).unwrap();
            let contribution = grid.contribution(&tiny).unwrap();
            assert_eq!(contribution.shares, vec![CellShare { cell: 2 * 6 + 2, mass: 1.0 }]);

            let tiny_outside = Disk::new(Coord { x: -3.0, y: 2.5 }, 1e-170).unwrap();
            assert!(matches!(
                grid.contribution(&tiny_outside),
                Err(OccupancyError::NoCoverage { radius, .. }) if radius == 1e-170
            ));
        }
    }

    #[test]
    fn test_check_scans_row_major() {
        let mut grid = Grid::new(&GridConfig::new(2.0, 2.0, 2, 2)).unwrap();
        grid.set_occupation(DMatrix::from_row_slice(2, 2, &[0.5, 0.0, 0.7, 0.9]));

        assert_eq!(grid.check_occupation(|v| v > 0.3), vec![(0, 0), (1, 0), (1, 1)]);
        assert_eq!(grid.check_density(|v| v > 0.8), vec![(1, 1)]);
    }
}
