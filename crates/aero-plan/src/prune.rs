//! Line-of-sight path pruning.
//!
//! A* over an 8-connected grid emits one cell per step; most of them
//! are redundant once a straight segment between two non-adjacent
//! cells is known to be obstacle-free. Pruning keeps an anchor cell
//! and greedily jumps to the farthest cell the anchor can see through
//! a Bresenham-rasterized segment.

use crate::grid::{GridCell, OccupancyGrid};

/// Enumerate the cells of the straight segment from `a` to `b`,
/// inclusive of both endpoints, via Bresenham's line algorithm.
pub fn bresenham(a: GridCell, b: GridCell) -> Vec<GridCell> {
    let mut x = a.row as i64;
    let mut y = a.col as i64;
    let x1 = b.row as i64;
    let y1 = b.col as i64;

    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut cells = Vec::with_capacity((dx - dy) as usize + 1);
    loop {
        cells.push(GridCell { row: x as usize, col: y as usize });
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    cells
}

/// True when the rasterized segment between `a` and `b` touches no
/// blocked cell.
pub fn segment_clear(grid: &OccupancyGrid, a: GridCell, b: GridCell) -> bool {
    bresenham(a, b).into_iter().all(|c| !grid.is_blocked(c))
}

/// Reduce `path` to the minimal subsequence whose consecutive pairs
/// are all segment-clear. The result always shares both endpoints
/// with the input; pruning is advisory, so callers fall back to the
/// raw path when the result is degenerate (< 2 cells).
pub fn prune(grid: &OccupancyGrid, path: &[GridCell]) -> Vec<GridCell> {
    if path.len() < 3 {
        return path.to_vec();
    }

    let mut out = vec![path[0]];
    let mut anchor = 0;

    while anchor < path.len() - 1 {
        // Farthest visible cell, scanning from the end backward. The
        // next cell in the path is always reachable, so this loop
        // always advances.
        let mut next = anchor + 1;
        for j in (anchor + 1..path.len()).rev() {
            if segment_clear(grid, path[anchor], path[j]) {
                next = j;
                break;
            }
        }
        out.push(path[next]);
        anchor = next;
    }

    out
}
