//! Coordinates, distances and bearings.
//!
//! Distances are haversine metres. Bearings follow the rhumb line, so the
//! bearing from B back to A is always the bearing from A to B plus 180°.

use geo::{HaversineDistance, Point, RhumbBearing};
use serde::{Deserialize, Serialize};

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// The provider reports `(0, 0)` for stations it has no position for.
    pub fn is_unset(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// Great-circle distance in metres.
pub fn distance(a: Coord, b: Coord) -> f64 {
    a.to_point().haversine_distance(&b.to_point())
}

/// Compass heading from `a` to `b` in degrees, in `[0, 360)`.
pub fn bearing(a: Coord, b: Coord) -> f64 {
    normalize_degrees(a.to_point().rhumb_bearing(b.to_point()))
}

/// Wrap any angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let mut d = degrees % 360.0;
    if d < 0.0 {
        d += 360.0;
    }
    // -1e-15 + 360.0 rounds up to 360.0
    if d >= 360.0 { 0.0 } else { d }
}

/// Signed difference `target - reference`, wrapped into `(-180, 180]`.
///
/// Positive values mean `target` lies clockwise of `reference`.
pub fn signed_angle_diff(target: f64, reference: f64) -> f64 {
    let diff = normalize_degrees(target - reference);
    if diff > 180.0 { diff - 360.0 } else { diff }
}
