use serde::{Deserialize, Serialize};

/// A commanded target position in local NED coordinates plus heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub north: f64,
    pub east: f64,
    pub alt: f64,
    pub heading: f64,
}

impl Waypoint {
    pub fn new(north: f64, east: f64, alt: f64, heading: f64) -> Self {
        Self { north, east, alt, heading }
    }

    /// Horizontal distance to a local (north, east) position.
    pub fn horizontal_distance_to(&self, north: f64, east: f64) -> f64 {
        let dn = self.north - north;
        let de = self.east - east;
        (dn * dn + de * de).sqrt()
    }
}

/// Encode the finalized route as a msgpack array of
/// `[north, east, alt, heading]` 4-tuples, the layout the simulator
/// expects on its waypoint channel.
pub fn encode(waypoints: &[Waypoint]) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    let tuples: Vec<(f64, f64, f64, f64)> = waypoints
        .iter()
        .map(|w| (w.north, w.east, w.alt, w.heading))
        .collect();
    rmp_serde::to_vec(&tuples)
}

/// Decode a waypoint blob produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Vec<Waypoint>, rmp_serde::decode::Error> {
    let tuples: Vec<(f64, f64, f64, f64)> = rmp_serde::from_slice(bytes)?;
    Ok(tuples
        .into_iter()
        .map(|(north, east, alt, heading)| Waypoint { north, east, alt, heading })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_distance() {
        let wp = Waypoint::new(3.0, 4.0, 5.0, 0.0);
        assert!((wp.horizontal_distance_to(0.0, 0.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_wire_round_trip() {
        let wps = vec![
            Waypoint::new(0.0, 0.0, 5.0, 0.0),
            Waypoint::new(10.0, -3.0, 5.0, 0.0),
        ];

        let blob = encode(&wps).unwrap();
        let back = decode(&blob).unwrap();
        assert_eq!(back, wps);
    }

    #[test]
    fn test_wire_is_tuple_list() {
        let wps = vec![Waypoint::new(1.0, 2.0, 3.0, 4.0)];
        let blob = encode(&wps).unwrap();

        // The simulator side reads a plain list of 4-element lists.
        let raw: Vec<Vec<f64>> = rmp_serde::from_slice(&blob).unwrap();
        assert_eq!(raw, vec![vec![1.0, 2.0, 3.0, 4.0]]);
    }
}
