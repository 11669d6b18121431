use serde::{Deserialize, Serialize};

/// Telemetry delivered by the vehicle link.
///
/// Events are ephemeral: the link produces them as messages arrive and
/// the mission machine consumes each one immediately, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// Local NED position relative to home. `alt` is the geodetic
    /// altitude the vehicle reported alongside (used by the landing
    /// check against the home altitude).
    LocalPosition {
        north: f64,
        east: f64,
        down: f64,
        alt: f64,
    },
    /// Local NED velocity, m/s.
    Velocity { north: f64, east: f64, down: f64 },
    /// Armed/guided status from the vehicle heartbeat.
    ArmedState { armed: bool, guided: bool },
}
