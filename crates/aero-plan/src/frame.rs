//! Geodetic to local tangent-plane conversion.
//!
//! Local coordinates are NED (north, east, down) meters relative to a
//! geodetic home reference. The projection is equirectangular, which
//! is accurate to well under a cell over the few kilometers a single
//! mission covers.

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Mean Earth radius, meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalPosition {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalPosition {
    pub north: f64,
    pub east: f64,
    pub down: f64,
}

fn validate(p: &GlobalPosition) -> Result<(), PlanError> {
    let finite = p.lat.is_finite() && p.lon.is_finite() && p.alt.is_finite();
    if !finite || p.lat.abs() > 90.0 || p.lon.abs() > 180.0 {
        return Err(PlanError::InvalidCoordinate { lat: p.lat, lon: p.lon });
    }
    Ok(())
}

/// Convert a geodetic position to local NED relative to `home`.
pub fn to_local(global: GlobalPosition, home: GlobalPosition) -> Result<LocalPosition, PlanError> {
    validate(&global)?;
    validate(&home)?;

    let north = (global.lat - home.lat).to_radians() * EARTH_RADIUS_M;
    let east = (global.lon - home.lon).to_radians() * EARTH_RADIUS_M * home.lat.to_radians().cos();
    let down = -(global.alt - home.alt);
    Ok(LocalPosition { north, east, down })
}

/// Inverse of [`to_local`].
pub fn to_global(local: LocalPosition, home: GlobalPosition) -> Result<GlobalPosition, PlanError> {
    validate(&home)?;

    let lat = home.lat + (local.north / EARTH_RADIUS_M).to_degrees();
    let lon = home.lon
        + (local.east / (EARTH_RADIUS_M * home.lat.to_radians().cos())).to_degrees();
    let alt = home.alt - local.down;
    Ok(GlobalPosition { lat, lon, alt })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: GlobalPosition = GlobalPosition { lat: 37.792480, lon: -122.397450, alt: 0.0 };

    #[test]
    fn test_home_maps_to_origin() {
        let l = to_local(HOME, HOME).unwrap();
        assert!(l.north.abs() < 1e-9);
        assert!(l.east.abs() < 1e-9);
        assert!(l.down.abs() < 1e-9);
    }

    #[test]
    fn test_north_axis_sign() {
        let p = GlobalPosition { lat: HOME.lat + 0.001, lon: HOME.lon, alt: 10.0 };
        let l = to_local(p, HOME).unwrap();
        assert!(l.north > 0.0);
        assert!(l.east.abs() < 1e-6);
        assert!((l.down + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip() {
        let p = GlobalPosition { lat: 37.7965, lon: -122.4005, alt: 23.5 };
        let back = to_global(to_local(p, HOME).unwrap(), HOME).unwrap();

        assert!((back.lat - p.lat).abs() < 1e-9);
        assert!((back.lon - p.lon).abs() < 1e-9);
        assert!((back.alt - p.alt).abs() < 1e-9);
    }

    #[test]
    fn test_local_round_trip() {
        let l = LocalPosition { north: 315.2, east: -120.8, down: -5.0 };
        let back = to_local(to_global(l, HOME).unwrap(), HOME).unwrap();

        assert!((back.north - l.north).abs() < 1e-6);
        assert!((back.east - l.east).abs() < 1e-6);
        assert!((back.down - l.down).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let bad = GlobalPosition { lat: 91.0, lon: 0.0, alt: 0.0 };
        assert!(matches!(
            to_local(bad, HOME),
            Err(PlanError::InvalidCoordinate { .. })
        ));

        let nan = GlobalPosition { lat: f64::NAN, lon: 0.0, alt: 0.0 };
        assert!(to_local(nan, HOME).is_err());
        assert!(to_local(HOME, GlobalPosition { lat: 0.0, lon: 200.0, alt: 0.0 }).is_err());
    }
}
