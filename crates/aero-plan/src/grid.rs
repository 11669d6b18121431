//! Occupancy grid construction.
//!
//! The grid discretizes the obstacle field at 1 m resolution for a
//! single target altitude. Cells are stored as a flat `Vec<bool>`
//! indexed by `row * width + col`; a cell is blocked when an obstacle
//! tall enough to matter at the target altitude covers it once its
//! footprint is inflated by the safety margin.

use tracing::debug;

use crate::error::PlanError;
use crate::survey::ObstacleRecord;

/// Integer (row, col) grid coordinate. Row 0 is the minimum-north edge
/// of the grid, col 0 the minimum-east edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

impl GridCell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    /// Minimum north coordinate covered by the grid (row 0).
    north_offset: f64,
    /// Minimum east coordinate covered by the grid (col 0).
    east_offset: f64,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// Build the grid from obstacle records for one target altitude
    /// and safety margin. The grid spans the bounding box of all
    /// footprints inflated by the margin.
    pub fn build(
        records: &[ObstacleRecord],
        target_alt: f64,
        safety_margin: f64,
    ) -> Result<Self, PlanError> {
        if records.is_empty() {
            return Err(PlanError::MapConstruction("empty obstacle list".into()));
        }
        if !(target_alt.is_finite() && target_alt > 0.0) {
            return Err(PlanError::MapConstruction(format!(
                "target altitude must be > 0, got {}",
                target_alt
            )));
        }
        if !(safety_margin.is_finite() && safety_margin >= 0.0) {
            return Err(PlanError::MapConstruction(format!(
                "safety margin must be >= 0, got {}",
                safety_margin
            )));
        }

        let mut n_min = f64::INFINITY;
        let mut n_max = f64::NEG_INFINITY;
        let mut e_min = f64::INFINITY;
        let mut e_max = f64::NEG_INFINITY;

        for r in records {
            let finite = [r.north, r.east, r.alt, r.half_north, r.half_east, r.half_alt]
                .iter()
                .all(|v| v.is_finite());
            if !finite {
                return Err(PlanError::MapConstruction(format!(
                    "non-finite obstacle record: {:?}",
                    r
                )));
            }
            n_min = n_min.min(r.north - r.half_north - safety_margin);
            n_max = n_max.max(r.north + r.half_north + safety_margin);
            e_min = e_min.min(r.east - r.half_east - safety_margin);
            e_max = e_max.max(r.east + r.half_east + safety_margin);
        }

        let north_offset = n_min.floor();
        let east_offset = e_min.floor();
        let height = (n_max.ceil() - north_offset).max(1.0) as usize;
        let width = (e_max.ceil() - east_offset).max(1.0) as usize;

        let mut grid = Self {
            width,
            height,
            north_offset,
            east_offset,
            cells: vec![false; width * height],
        };

        for r in records {
            // Obstacles below the flight level (even margin-inflated)
            // never block a cell.
            if r.top() + safety_margin < target_alt {
                continue;
            }

            let r0 = grid.clamp_row(r.north - r.half_north - safety_margin);
            let r1 = grid.clamp_row(r.north + r.half_north + safety_margin);
            let c0 = grid.clamp_col(r.east - r.half_east - safety_margin);
            let c1 = grid.clamp_col(r.east + r.half_east + safety_margin);

            for row in r0..=r1 {
                for col in c0..=c1 {
                    grid.cells[row * width + col] = true;
                }
            }
        }

        debug!(
            "grid built: {}x{} cells, {} blocked, north_offset={}, east_offset={}",
            width,
            height,
            grid.cells.iter().filter(|b| **b).count(),
            north_offset,
            east_offset
        );
        Ok(grid)
    }

    /// An all-free grid with zero offsets, for synthetic maps.
    pub fn open(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            north_offset: 0.0,
            east_offset: 0.0,
            cells: vec![false; width * height],
        }
    }

    /// Mark a cell blocked/free on a synthetic map.
    pub fn set_blocked(&mut self, cell: GridCell, blocked: bool) {
        let idx = self.index(cell);
        self.cells[idx] = blocked;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn north_offset(&self) -> f64 {
        self.north_offset
    }

    pub fn east_offset(&self) -> f64 {
        self.east_offset
    }

    pub fn in_bounds(&self, cell: GridCell) -> bool {
        cell.row < self.height && cell.col < self.width
    }

    /// Flat index of a cell. Caller guarantees bounds.
    pub fn index(&self, cell: GridCell) -> usize {
        debug_assert!(self.in_bounds(cell));
        cell.row * self.width + cell.col
    }

    pub fn cell_of(&self, index: usize) -> GridCell {
        GridCell { row: index / self.width, col: index % self.width }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_blocked(&self, cell: GridCell) -> bool {
        self.cells[self.index(cell)]
    }

    /// Grid cell containing a local (north, east) position, or `None`
    /// when the position falls outside the grid.
    pub fn cell_at(&self, north: f64, east: f64) -> Option<GridCell> {
        let row = (north - self.north_offset).floor();
        let col = (east - self.east_offset).floor();
        if row < 0.0 || col < 0.0 {
            return None;
        }
        let cell = GridCell { row: row as usize, col: col as usize };
        self.in_bounds(cell).then_some(cell)
    }

    /// Local (north, east) coordinates of a cell.
    pub fn local_at(&self, cell: GridCell) -> (f64, f64) {
        (
            self.north_offset + cell.row as f64,
            self.east_offset + cell.col as f64,
        )
    }

    /// Cell closest to the grid center; the fallback goal when no goal
    /// position is configured.
    pub fn center(&self) -> GridCell {
        GridCell { row: self.height / 2, col: self.width / 2 }
    }

    fn clamp_row(&self, north: f64) -> usize {
        (north - self.north_offset)
            .floor()
            .clamp(0.0, (self.height - 1) as f64) as usize
    }

    fn clamp_col(&self, east: f64) -> usize {
        (east - self.east_offset)
            .floor()
            .clamp(0.0, (self.width - 1) as f64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(north: f64, east: f64, alt: f64, hn: f64, he: f64, ha: f64) -> ObstacleRecord {
        ObstacleRecord { north, east, alt, half_north: hn, half_east: he, half_alt: ha }
    }

    #[test]
    fn test_offsets_and_size() {
        let recs = vec![
            record(10.0, 10.0, 5.0, 2.0, 2.0, 5.0),
            record(20.0, 30.0, 5.0, 2.0, 2.0, 5.0),
        ];
        let g = OccupancyGrid::build(&recs, 5.0, 1.0).unwrap();

        assert_eq!(g.north_offset(), 7.0); // 10 - 2 - 1
        assert_eq!(g.east_offset(), 7.0);
        assert_eq!(g.height(), 16); // 23 - 7
        assert_eq!(g.width(), 26); // 33 - 7
    }

    #[test]
    fn test_tall_obstacle_blocks_inflated_footprint() {
        let recs = vec![record(5.0, 5.0, 10.0, 1.0, 1.0, 10.0)];
        let g = OccupancyGrid::build(&recs, 5.0, 2.0).unwrap();

        // Center cell blocked.
        let center = g.cell_at(5.0, 5.0).unwrap();
        assert!(g.is_blocked(center));
        // Margin-inflated edge blocked too.
        let edge = g.cell_at(5.0 + 1.0 + 1.5, 5.0).unwrap();
        assert!(g.is_blocked(edge));
    }

    #[test]
    fn test_short_obstacle_does_not_block() {
        // Top at 4 + margin 0 < target 50: free airspace.
        let recs = vec![record(5.0, 5.0, 2.0, 3.0, 3.0, 2.0)];
        let g = OccupancyGrid::build(&recs, 50.0, 0.0).unwrap();

        for row in 0..g.height() {
            for col in 0..g.width() {
                assert!(!g.is_blocked(GridCell::new(row, col)));
            }
        }
    }

    #[test]
    fn test_overlapping_obstacles_union() {
        let recs = vec![
            record(5.0, 5.0, 10.0, 2.0, 2.0, 10.0),
            record(6.0, 5.0, 10.0, 2.0, 2.0, 10.0),
        ];
        let g = OccupancyGrid::build(&recs, 5.0, 0.0).unwrap();
        assert!(g.is_blocked(g.cell_at(5.5, 5.0).unwrap()));
    }

    #[test]
    fn test_empty_records_rejected() {
        assert!(matches!(
            OccupancyGrid::build(&[], 5.0, 0.0),
            Err(PlanError::MapConstruction(_))
        ));
    }

    #[test]
    fn test_bad_parameters_rejected() {
        let recs = vec![record(0.0, 0.0, 5.0, 1.0, 1.0, 5.0)];
        assert!(OccupancyGrid::build(&recs, 0.0, 0.0).is_err());
        assert!(OccupancyGrid::build(&recs, 5.0, -1.0).is_err());

        let nan = vec![record(f64::NAN, 0.0, 5.0, 1.0, 1.0, 5.0)];
        assert!(OccupancyGrid::build(&nan, 5.0, 0.0).is_err());
    }

    #[test]
    fn test_cell_local_round_trip() {
        let recs = vec![record(10.0, 10.0, 50.0, 5.0, 5.0, 50.0)];
        let g = OccupancyGrid::build(&recs, 5.0, 0.0).unwrap();

        let cell = g.cell_at(8.0, 12.0).unwrap();
        let (n, e) = g.local_at(cell);
        assert_eq!(g.cell_at(n, e).unwrap(), cell);
    }

    #[test]
    fn test_cell_at_outside_grid() {
        let g = OccupancyGrid::open(10, 10);
        assert!(g.cell_at(-1.0, 0.0).is_none());
        assert!(g.cell_at(0.0, 10.5).is_none());
        assert!(g.cell_at(3.0, 4.0).is_some());
    }
}
