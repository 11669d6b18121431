pub mod link;
pub mod mav;
pub mod mission;

use serde::Deserialize;

/// `[link]` config section for the MAVLink vehicle connection.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// Vehicle/simulator host, e.g. "127.0.0.1".
    pub host: String,
    pub port: u16,

    /// MAVLink ids we use (companion side).
    pub sys_id: u8,
    pub comp_id: u8,

    /// Target system/component (vehicle side). 1/1 is common.
    pub target_sys: u8,
    pub target_comp: u8,

    /// Refuse commands until the vehicle's first heartbeat is seen.
    pub require_heartbeat: bool,

    /// Companion heartbeat send interval. Default 1 Hz.
    pub send_heartbeat_hz: Option<f32>,
}
