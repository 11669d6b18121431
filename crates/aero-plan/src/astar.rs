//! A* search over the occupancy grid.
//!
//! 8-connected moves: cardinals cost 1.0, diagonals sqrt(2). The
//! heuristic is Euclidean distance to the goal, which is admissible
//! and consistent for this cost model, so the first time the goal is
//! finalized its cost is optimal. Bookkeeping (g-scores, predecessors,
//! closed set) lives in flat arrays keyed by cell index; the frontier
//! is a binary heap of (f, h, index) with deterministic tie-breaking.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, trace};

use crate::error::PlanError;
use crate::grid::{GridCell, OccupancyGrid};

const SQRT_2: f64 = std::f64::consts::SQRT_2;

/// (d_row, d_col, step cost) for the 8-connected neighborhood.
const MOVES: [(isize, isize, f64); 8] = [
    (-1, 0, 1.0),
    (1, 0, 1.0),
    (0, -1, 1.0),
    (0, 1, 1.0),
    (-1, -1, SQRT_2),
    (-1, 1, SQRT_2),
    (1, -1, SQRT_2),
    (1, 1, SQRT_2),
];

/// A raw start-to-goal path plus its total move cost.
#[derive(Debug, Clone)]
pub struct GridPath {
    pub cells: Vec<GridCell>,
    pub cost: f64,
}

/// Frontier entry. Ordered so the heap pops the lowest f first; ties
/// break on lower h, then lower cell index, keeping expansion order
/// reproducible on identical input.
struct Frontier {
    f: f64,
    h: f64,
    idx: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior on a max-heap.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.h.partial_cmp(&self.h).unwrap_or(Ordering::Equal))
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn heuristic(a: GridCell, b: GridCell) -> f64 {
    let dr = a.row as f64 - b.row as f64;
    let dc = a.col as f64 - b.col as f64;
    (dr * dr + dc * dc).sqrt()
}

fn check_endpoint(grid: &OccupancyGrid, cell: GridCell, which: &'static str) -> Result<(), PlanError> {
    if !grid.in_bounds(cell) {
        return Err(PlanError::InvalidEndpoint {
            which,
            reason: format!(
                "cell ({}, {}) outside {}x{} grid",
                cell.row,
                cell.col,
                grid.height(),
                grid.width()
            ),
        });
    }
    if grid.is_blocked(cell) {
        return Err(PlanError::InvalidEndpoint {
            which,
            reason: format!("cell ({}, {}) is blocked", cell.row, cell.col),
        });
    }
    Ok(())
}

/// Search for a minimum-cost path from `start` to `goal`.
///
/// Endpoints must be in bounds and unblocked
/// ([`PlanError::InvalidEndpoint`]); an unreachable goal reports
/// [`PlanError::NoPath`], which callers treat as an expected outcome.
pub fn search(grid: &OccupancyGrid, start: GridCell, goal: GridCell) -> Result<GridPath, PlanError> {
    check_endpoint(grid, start, "start")?;
    check_endpoint(grid, goal, "goal")?;

    let n = grid.cell_count();
    let mut g = vec![f64::INFINITY; n];
    let mut came_from = vec![usize::MAX; n];
    let mut closed = vec![false; n];
    let mut open = BinaryHeap::new();

    let start_idx = grid.index(start);
    let goal_idx = grid.index(goal);

    g[start_idx] = 0.0;
    let h0 = heuristic(start, goal);
    open.push(Frontier { f: h0, h: h0, idx: start_idx });

    let mut expanded = 0usize;

    while let Some(Frontier { idx, .. }) = open.pop() {
        if closed[idx] {
            continue;
        }
        closed[idx] = true;
        expanded += 1;

        if idx == goal_idx {
            trace!("a*: goal reached, cost {:.2}, {} cells expanded", g[idx], expanded);
            return Ok(reconstruct(grid, &came_from, start_idx, goal_idx, g[goal_idx]));
        }

        let cell = grid.cell_of(idx);
        for (dr, dc, step) in MOVES {
            let row = cell.row as isize + dr;
            let col = cell.col as isize + dc;
            if row < 0 || col < 0 {
                continue;
            }
            let next = GridCell { row: row as usize, col: col as usize };
            if !grid.in_bounds(next) || grid.is_blocked(next) {
                continue;
            }

            let next_idx = grid.index(next);
            if closed[next_idx] {
                continue;
            }

            let tentative = g[idx] + step;
            if tentative < g[next_idx] {
                g[next_idx] = tentative;
                came_from[next_idx] = idx;
                let h = heuristic(next, goal);
                open.push(Frontier { f: tentative + h, h, idx: next_idx });
            }
        }
    }

    debug!("a*: frontier exhausted after {} cells, goal unreachable", expanded);
    Err(PlanError::NoPath)
}

fn reconstruct(
    grid: &OccupancyGrid,
    came_from: &[usize],
    start_idx: usize,
    goal_idx: usize,
    cost: f64,
) -> GridPath {
    let mut cells = Vec::new();
    let mut idx = goal_idx;
    while idx != start_idx {
        cells.push(grid.cell_of(idx));
        idx = came_from[idx];
    }
    cells.push(grid.cell_of(start_idx));
    cells.reverse();
    GridPath { cells, cost }
}
