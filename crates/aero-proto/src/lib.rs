pub mod telemetry;
pub mod waypoint;
