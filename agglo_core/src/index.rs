//! The Candidate Index - which cells can a disk touch?
//!
//! Testing every entity against every cell is `O(entities × cells)`. The
//! strategies here narrow the search:
//! - **Scan**: tests every cell (reference implementation)
//! - **BoundingBox**: R-tree over cell bounds, queried with the disk's bounding box
//! - **Quadtree**: top-down traversal of a cached quadtree, see [`crate::quadtree`]
//!
//! All strategies return the same set of `(cell, exact area)` pairs for a
//! given disk, sorted by row-major cell index, with empty intersections
//! dropped.

use crate::error::{OccupancyError, Result};
use crate::geometry::{intersection_area, intersects, Disk};
use crate::grid::GridLayout;
use crate::quadtree::QuadtreeIndex;
use geo::{Coord, Rect};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Available candidate index strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStrategy {
    /// Test every cell
    Scan,

    /// R-tree over cell bounds
    #[default]
    BoundingBox,

    /// Quadtree decomposition (square, power-of-two grids only)
    Quadtree,
}

impl IndexStrategy {
    /// Returns all strategies.
    pub fn all() -> Vec<IndexStrategy> {
        vec![
            IndexStrategy::Scan,
            IndexStrategy::BoundingBox,
            IndexStrategy::Quadtree,
        ]
    }

    /// Returns the strategy name.
    pub fn name(&self) -> &'static str {
        match self {
            IndexStrategy::Scan => "scan",
            IndexStrategy::BoundingBox => "bounding_box",
            IndexStrategy::Quadtree => "quadtree",
        }
    }
}

impl std::fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for IndexStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scan" | "naive" => Ok(IndexStrategy::Scan),
            "bounding_box" | "boundingbox" | "bbox" | "rtree" => Ok(IndexStrategy::BoundingBox),
            "quadtree" | "quad" => Ok(IndexStrategy::Quadtree),
            _ => Err(format!("Unknown index strategy: {}", s)),
        }
    }
}

/// A cell touched by a disk, with the exact intersection area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellHit {
    /// Row-major flat cell index
    pub cell: usize,

    /// Area of `disk ∩ cell`, always > 0
    pub area: f64,
}

/// Narrows, for a query disk, the set of cells that must be checked.
///
/// Built once per grid and shared read-only between aggregation workers.
pub trait CandidateIndex: Send + Sync {
    /// Cells with a non-empty intersection, sorted by cell index.
    fn candidates(&self, disk: &Disk) -> Vec<CellHit>;

    /// The strategy this index implements.
    fn strategy(&self) -> IndexStrategy;
}

/// Build the index for `strategy` over a layout.
pub fn build_index(layout: &GridLayout, strategy: IndexStrategy) -> Result<Box<dyn CandidateIndex>> {
    let index: Box<dyn CandidateIndex> = match strategy {
        IndexStrategy::Scan => Box::new(ScanIndex::new(layout)),
        IndexStrategy::BoundingBox => Box::new(BoundingBoxIndex::new(layout)),
        IndexStrategy::Quadtree => Box::new(QuadtreeIndex::new(layout)?),
    };
    Ok(index)
}

/// Exact hit for one cell, or `None` when the intersection is empty.
pub(crate) fn hit(disk: &Disk, cell: usize, bounds: &Rect<f64>) -> Option<CellHit> {
    if !intersects(disk, bounds) {
        return None;
    }
    let area = intersection_area(disk, bounds);
    (area > 0.0).then_some(CellHit { cell, area })
}

// ============================================================================
// SCAN
// ============================================================================

/// Tests the disk against every cell.
#[derive(Debug, Clone)]
pub struct ScanIndex {
    cells: Vec<Rect<f64>>,
}

impl ScanIndex {
    pub fn new(layout: &GridLayout) -> Self {
        let cells = (0..layout.cell_count())
            .map(|i| {
                let (row, column) = layout.position(i);
                layout.cell_bounds(row, column)
            })
            .collect();
        Self { cells }
    }
}

impl CandidateIndex for ScanIndex {
    fn candidates(&self, disk: &Disk) -> Vec<CellHit> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, bounds)| hit(disk, i, bounds))
            .collect()
    }

    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::Scan
    }
}

// ============================================================================
// BOUNDING BOX (R-TREE)
// ============================================================================

/// A cell stored in the R-tree.
#[derive(Debug, Clone)]
pub struct IndexedCell {
    /// Row-major flat cell index
    pub index: usize,

    /// Cell bounds
    pub bounds: Rect<f64>,
}

impl RTreeObject for IndexedCell {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        to_aabb(&self.bounds)
    }
}

fn to_aabb(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    let Coord { x: min_x, y: min_y } = rect.min();
    let Coord { x: max_x, y: max_y } = rect.max();
    AABB::from_corners([min_x, min_y], [max_x, max_y])
}

/// R-tree over every cell's bounds, bulk-loaded once.
pub struct BoundingBoxIndex {
    tree: RTree<IndexedCell>,
}

impl BoundingBoxIndex {
    pub fn new(layout: &GridLayout) -> Self {
        let cells: Vec<IndexedCell> = (0..layout.cell_count())
            .map(|index| {
                let (row, column) = layout.position(index);
                IndexedCell {
                    index,
                    bounds: layout.cell_bounds(row, column),
                }
            })
            .collect();

        debug!("Bulk-loading R-tree with {} cells", cells.len());

        Self {
            tree: RTree::bulk_load(cells),
        }
    }

    /// Number of indexed cells.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl CandidateIndex for BoundingBoxIndex {
    fn candidates(&self, disk: &Disk) -> Vec<CellHit> {
        let query = to_aabb(&disk.bounding_rect());

        let mut hits: Vec<CellHit> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .filter_map(|cell| hit(disk, cell.index, &cell.bounds))
            .collect();

        hits.sort_unstable_by_key(|h| h.cell);
        hits
    }

    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::BoundingBox
    }
}

/// Quadtree construction errors surface as `InvalidGridShape`.
pub(crate) fn require_quadtree_shape(layout: &GridLayout) -> Result<u32> {
    let (rows, columns) = (layout.rows(), layout.columns());
    if rows != columns {
        return Err(OccupancyError::shape(format!(
            "quadtree requires a square grid, got {} x {}",
            rows, columns
        )));
    }
    if !rows.is_power_of_two() {
        return Err(OccupancyError::shape(format!(
            "quadtree requires power-of-two sides, got {}",
            rows
        )));
    }
    Ok(rows.trailing_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn disk(x: f64, y: f64, r: f64) -> Disk {
        Disk::new(Coord { x, y }, r).unwrap()
    }

    #[test]
    fn test_strategy_parse_and_display() {
        assert_eq!("bbox".parse::<IndexStrategy>().unwrap(), IndexStrategy::BoundingBox);
        assert_eq!("RTREE".parse::<IndexStrategy>().unwrap(), IndexStrategy::BoundingBox);
        assert_eq!("naive".parse::<IndexStrategy>().unwrap(), IndexStrategy::Scan);
        assert_eq!("quad".parse::<IndexStrategy>().unwrap(), IndexStrategy::Quadtree);
        assert!("octree".parse::<IndexStrategy>().is_err());

        for strategy in IndexStrategy::all() {
            assert_eq!(strategy.to_string().parse::<IndexStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_scan_finds_four_quadrants() {
        let layout = GridLayout::new(6.0, 6.0, 6, 6).unwrap();
        let index = ScanIndex::new(&layout);

        let hits = index.candidates(&disk(1.0, 1.0, 1.0));
        let cells: Vec<usize> = hits.iter().map(|h| h.cell).collect();

        assert_eq!(cells, vec![0, 1, 6, 7]);
        for h in hits {
            assert_relative_eq!(h.area, std::f64::consts::PI / 4.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bounding_box_matches_scan() {
        let layout = GridLayout::new(10.0, 7.0, 7, 10).unwrap();
        let scan = ScanIndex::new(&layout);
        let rtree = BoundingBoxIndex::new(&layout);
        assert_eq!(rtree.len(), 70);

        for d in [disk(3.3, 2.1, 1.7), disk(0.0, 0.0, 2.0), disk(9.9, 6.5, 0.4), disk(5.0, 3.5, 20.0)] {
            let expected = scan.candidates(&d);
            let actual = rtree.candidates(&d);

            assert_eq!(expected.len(), actual.len());
            for (e, a) in expected.iter().zip(&actual) {
                assert_eq!(e.cell, a.cell);
                assert_relative_eq!(e.area, a.area, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_disk_outside_area_has_no_candidates() {
        let layout = GridLayout::new(8.0, 8.0, 8, 8).unwrap();
        for strategy in IndexStrategy::all() {
            let index = build_index(&layout, strategy).unwrap();
            assert!(index.candidates(&disk(20.0, 20.0, 1.0)).is_empty());
            assert_eq!(index.strategy(), strategy);
        }
    }

    #[test]
    fn test_quadtree_shape_requirements() {
        let rect = GridLayout::new(6.0, 6.0, 6, 6).unwrap();
        assert!(matches!(
            build_index(&rect, IndexStrategy::Quadtree),
            Err(OccupancyError::InvalidGridShape(_))
        ));

        let non_square = GridLayout::new(6.0, 6.0, 4, 8).unwrap();
        assert!(matches!(
            build_index(&non_square, IndexStrategy::Quadtree),
            Err(OccupancyError::InvalidGridShape(_))
        ));

        let ok = GridLayout::new(6.0, 6.0, 8, 8).unwrap();
        assert_eq!(require_quadtree_shape(&ok).unwrap(), 3);
        assert!(build_index(&non_square, IndexStrategy::BoundingBox).is_ok());
    }
}
