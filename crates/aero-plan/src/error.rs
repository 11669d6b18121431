use thiserror::Error;

/// Planning failures.
///
/// Everything except [`PlanError::NoPath`] is fatal to the mission:
/// the survey or configuration is unusable and planning cannot start.
/// `NoPath` is an expected outcome (the goal is simply unreachable at
/// this altitude/margin) and the caller aborts the mission cleanly
/// instead of treating it as a crash.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("survey parse error at line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("geodetic coordinate out of range: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("cannot build obstacle map: {0}")]
    MapConstruction(String),

    #[error("invalid {which} endpoint: {reason}")]
    InvalidEndpoint { which: &'static str, reason: String },

    #[error("no path between start and goal")]
    NoPath,
}
