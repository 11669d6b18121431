//! Route planning orchestration.
//!
//! Runs once at mission start: build the occupancy grid from the
//! survey, resolve start and goal cells through the frame conversion,
//! search, prune, and convert the result to waypoints for the mission
//! machine.

use std::time::Instant;

use serde::Deserialize;
use tracing::info;

use aero_proto::waypoint::Waypoint;

use crate::astar;
use crate::error::PlanError;
use crate::frame::{self, GlobalPosition};
use crate::grid::{GridCell, OccupancyGrid};
use crate::prune;
use crate::survey::Survey;

/// `[flight]` config section.
#[derive(Debug, Clone, Deserialize)]
pub struct FlightConfig {
    /// Target flight altitude, meters above home. Must be > 0.
    pub target_alt: f64,
    /// Margin kept around every obstacle, meters. Must be >= 0.
    pub safety_margin: f64,
}

/// `[goal]` config section. Resolved to a grid cell through the frame
/// conversion; when absent the grid center is used.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GoalConfig {
    pub lat: f64,
    pub lon: f64,
}

/// A finished plan: the waypoint sequence the mission machine will
/// consume, plus figures for logging and inspection.
#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub waypoints: Vec<Waypoint>,
    pub cost: f64,
    pub raw_len: usize,
    pub pruned_len: usize,
}

/// Plan the route for one mission.
///
/// `vehicle` is the vehicle's current global position (start of the
/// route). Fails fast on unusable input; an unreachable goal surfaces
/// as [`PlanError::NoPath`].
pub fn plan_route(
    survey: &Survey,
    flight: &FlightConfig,
    goal: Option<GoalConfig>,
    vehicle: GlobalPosition,
) -> Result<RoutePlan, PlanError> {
    let t0 = Instant::now();

    let grid = OccupancyGrid::build(&survey.obstacles, flight.target_alt, flight.safety_margin)?;
    info!(
        "grid: {}x{} cells, north_offset={:.1}, east_offset={:.1}",
        grid.height(),
        grid.width(),
        grid.north_offset(),
        grid.east_offset()
    );

    let start = resolve_cell(&grid, survey.home, vehicle, "start")?;
    let goal_cell = match goal {
        Some(g) => {
            let global = GlobalPosition { lat: g.lat, lon: g.lon, alt: flight.target_alt };
            resolve_cell(&grid, survey.home, global, "goal")?
        }
        None => grid.center(),
    };
    info!(
        "start cell ({}, {}), goal cell ({}, {})",
        start.row, start.col, goal_cell.row, goal_cell.col
    );

    let path = astar::search(&grid, start, goal_cell)?;
    info!("raw path: {} cells, cost {:.2}", path.cells.len(), path.cost);

    let pruned = prune::prune(&grid, &path.cells);
    // Pruning is advisory; keep the raw path if it came back degenerate.
    let cells = if pruned.len() >= 2 || path.cells.len() < 2 {
        pruned
    } else {
        path.cells.clone()
    };
    info!("pruned path: {} waypoints", cells.len());

    let waypoints: Vec<Waypoint> = cells
        .iter()
        .map(|c| {
            let (north, east) = grid.local_at(*c);
            Waypoint::new(north, east, flight.target_alt, 0.0)
        })
        .collect();

    info!(
        "planning complete in {:.0?}: {} waypoints, cost {:.2}",
        t0.elapsed(),
        waypoints.len(),
        path.cost
    );

    Ok(RoutePlan {
        waypoints,
        cost: path.cost,
        raw_len: path.cells.len(),
        pruned_len: cells.len(),
    })
}

fn resolve_cell(
    grid: &OccupancyGrid,
    home: GlobalPosition,
    global: GlobalPosition,
    which: &'static str,
) -> Result<GridCell, PlanError> {
    let local = frame::to_local(global, home)?;
    grid.cell_at(local.north, local.east)
        .ok_or_else(|| PlanError::InvalidEndpoint {
            which,
            reason: format!(
                "local ({:.1}, {:.1}) falls outside the obstacle grid",
                local.north, local.east
            ),
        })
}
