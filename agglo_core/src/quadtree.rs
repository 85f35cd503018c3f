//! Quadtree candidate index
//!
//! For a `2^k x 2^k` grid the tracked rectangle is split recursively into
//! four quadrants down to depth `k`, where every node is exactly one cell.
//! The boxes of all levels are precomputed once and stored in an arena:
//! `levels[d][code]`, where `code` is the quadrant path from the root packed
//! two bits per level.
//!
//! # Quadrant Numbering
//!
//! ```text
//!          column →
//!        ┌─────┬─────┐
//!  row   │  0  │  1  │   0 → (0, 0)   1 → (0, 1)
//!   ↓    ├─────┼─────┤   2 → (1, 0)   3 → (1, 1)
//!        │  2  │  3  │
//!        └─────┴─────┘
//! ```
//!
//! A leaf's path maps to (row, column) by accumulating the quadrant offsets,
//! each scaled by `2^(remaining depth)`.
//!
//! Queries walk the tree with an explicit stack, pruning every subtree whose
//! box the disk does not reach.

use crate::error::Result;
use crate::geometry::{intersects, Disk};
use crate::grid::GridLayout;
use crate::index::{hit, require_quadtree_shape, CandidateIndex, CellHit, IndexStrategy};
use geo::Rect;
use tracing::debug;

/// Cached quadtree over a square, power-of-two grid.
#[derive(Debug, Clone)]
pub struct QuadtreeIndex {
    /// Leaf depth (`log2` of the grid side)
    depth: u32,

    /// Node boxes per level, indexed by quadrant path
    levels: Vec<Vec<Rect<f64>>>,

    /// Row-major cell index of every leaf, indexed by quadrant path
    leaf_cells: Vec<usize>,
}

impl QuadtreeIndex {
    /// Precompute every level of the tree.
    ///
    /// Fails with `InvalidGridShape` unless rows == columns == 2^k.
    pub fn new(layout: &GridLayout) -> Result<Self> {
        let depth = require_quadtree_shape(layout)?;

        let mut levels = Vec::with_capacity(depth as usize + 1);
        for level in 0..=depth {
            let span = 1usize << (depth - level);
            let nodes = 1usize << (2 * level);

            let boxes = (0..nodes)
                .map(|code| {
                    let (row, column) = decode_path(code, level);
                    layout.block_bounds(row * span, column * span, span, span)
                })
                .collect();
            levels.push(boxes);
        }

        let leaf_cells = (0..1usize << (2 * depth))
            .map(|code| {
                let (row, column) = decode_path(code, depth);
                layout.flat_index(row, column)
            })
            .collect();

        let index = Self {
            depth,
            levels,
            leaf_cells,
        };
        debug!("Quadtree depth {} with {} nodes", depth, index.node_count());

        Ok(index)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Total number of cached nodes over all levels.
    pub fn node_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Box of the node at `level` reached by quadrant path `code`.
    pub fn node_bounds(&self, level: u32, code: usize) -> Option<&Rect<f64>> {
        self.levels.get(level as usize)?.get(code)
    }
}

impl CandidateIndex for QuadtreeIndex {
    fn candidates(&self, disk: &Disk) -> Vec<CellHit> {
        let mut hits = Vec::new();
        let mut stack: Vec<(u32, usize)> = Vec::with_capacity(3 * self.depth as usize + 1);
        stack.push((0, 0));

        while let Some((level, code)) = stack.pop() {
            let bounds = &self.levels[level as usize][code];

            if level == self.depth {
                if let Some(h) = hit(disk, self.leaf_cells[code], bounds) {
                    hits.push(h);
                }
                continue;
            }

            if !intersects(disk, bounds) {
                continue;
            }

            for quadrant in (0..4).rev() {
                stack.push((level + 1, code * 4 + quadrant));
            }
        }

        hits.sort_unstable_by_key(|h| h.cell);
        hits
    }

    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::Quadtree
    }
}

/// (row, column) of a node within its level's `2^level x 2^level` grid.
fn decode_path(code: usize, level: u32) -> (usize, usize) {
    let mut row = 0;
    let mut column = 0;
    for l in (0..level).rev() {
        let quadrant = (code >> (2 * l)) & 3;
        row = (row << 1) | (quadrant >> 1);
        column = (column << 1) | (quadrant & 1);
    }
    (row, column)
}
