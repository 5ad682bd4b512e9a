//! Real-time vehicle positions.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::geo::Coord;
use super::ids::RouteUid;
use super::route::Direction;

/// Last reported position of one bus on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusPosition {
    /// Licence plate, the provider's vehicle identifier.
    pub plate: String,
    pub route_uid: RouteUid,
    pub route_name: Option<String>,
    pub direction: Option<Direction>,
    pub position: Coord,
    /// km/h
    pub speed: Option<f64>,
    /// Heading in degrees clockwise from north.
    pub azimuth: Option<f64>,
    pub updated_at: Option<DateTime<FixedOffset>>,
}

impl BusPosition {
    /// Buses without a fix are reported at `(0, 0)`.
    pub fn has_fix(&self) -> bool {
        !self.position.is_unset()
    }
}
