use anyhow::Result;

/// Command surface of the vehicle link.
///
/// The mission machine decides *what* to send; implementations decide
/// how it goes over the wire. All commands are fire-and-forget: a
/// returned error means the local send failed, and the core neither
/// retries nor waits for acknowledgment.
pub trait VehicleLink {
    fn arm(&mut self) -> Result<()>;
    fn disarm(&mut self) -> Result<()>;
    fn take_control(&mut self) -> Result<()>;
    fn release_control(&mut self) -> Result<()>;
    fn takeoff(&mut self, alt: f64) -> Result<()>;
    fn set_position(&mut self, north: f64, east: f64, alt: f64, heading: f64) -> Result<()>;
    fn land(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;

    /// Deliver the encoded waypoint list to the vehicle/simulator.
    fn send_waypoints(&mut self, blob: &[u8]) -> Result<()>;
}
