use anyhow::{Context, Result};
use tracing::info;

use crate::route::{FlightConfig, GoalConfig};
use crate::survey;

pub fn check_flight(flight: &FlightConfig) -> Result<()> {
    anyhow::ensure!(
        flight.target_alt.is_finite() && flight.target_alt > 0.0,
        "flight.target_alt must be > 0"
    );
    anyhow::ensure!(
        flight.safety_margin.is_finite() && flight.safety_margin >= 0.0,
        "flight.safety_margin must be >= 0"
    );
    Ok(())
}

pub fn check_goal(goal: &GoalConfig) -> Result<()> {
    anyhow::ensure!(
        goal.lat.abs() <= 90.0 && goal.lon.abs() <= 180.0,
        "goal coordinates invalid"
    );
    Ok(())
}

/// Parse the survey file and report basic figures.
pub fn check_survey(path: &str) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read survey {}", path))?;
    let s = survey::parse_survey(&text)?;
    anyhow::ensure!(!s.obstacles.is_empty(), "survey has no obstacle records");
    info!(
        "survey: home ({:.6}, {:.6}), {} obstacles",
        s.home.lat,
        s.home.lon,
        s.obstacles.len()
    );
    Ok(())
}
