//! Live arrival observations as reported by the provider.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::ids::{RouteUid, StationId, StopUid};
use super::route::Direction;

/// Operational status of a stop for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopStatus {
    Normal,
    NotDeparted,
    TrafficControl,
    LastBusGone,
    NotOperatingToday,
    Other(i64),
}

impl StopStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => StopStatus::Normal,
            1 => StopStatus::NotDeparted,
            2 => StopStatus::TrafficControl,
            3 => StopStatus::LastBusGone,
            4 => StopStatus::NotOperatingToday,
            other => StopStatus::Other(other),
        }
    }
}

/// One live prediction for a route at a stop.
///
/// At most one of `estimate_secs` and `next_bus_time` is meaningful; the
/// status code is consulted only when neither is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalObservation {
    pub route_uid: RouteUid,
    pub route_name: Option<String>,
    pub direction: Option<Direction>,
    pub stop_uid: Option<StopUid>,
    pub station_id: Option<StationId>,
    pub estimate_secs: Option<i64>,
    /// Raw ISO-8601 timestamp with offset, parsed lazily by the classifier.
    pub next_bus_time: Option<String>,
    pub stop_status: Option<StopStatus>,
    pub updated_at: Option<DateTime<FixedOffset>>,
}

impl ArrivalObservation {
    /// Bare observation for `route_uid`, with every optional field unset.
    pub fn new(route_uid: RouteUid) -> Self {
        Self {
            route_uid,
            route_name: None,
            direction: None,
            stop_uid: None,
            station_id: None,
            estimate_secs: None,
            next_bus_time: None,
            stop_status: None,
            updated_at: None,
        }
    }

    pub fn with_route_name(mut self, name: impl Into<String>) -> Self {
        self.route_name = Some(name.into());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_stop(mut self, stop_uid: StopUid) -> Self {
        self.stop_uid = Some(stop_uid);
        self
    }

    pub fn with_station(mut self, station_id: StationId) -> Self {
        self.station_id = Some(station_id);
        self
    }

    pub fn with_estimate(mut self, secs: i64) -> Self {
        self.estimate_secs = Some(secs);
        self
    }

    pub fn with_next_bus_time(mut self, iso: impl Into<String>) -> Self {
        self.next_bus_time = Some(iso.into());
        self
    }

    pub fn with_status(mut self, status: StopStatus) -> Self {
        self.stop_status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(StopStatus::from_code(0), StopStatus::Normal);
        assert_eq!(StopStatus::from_code(3), StopStatus::LastBusGone);
        assert_eq!(StopStatus::from_code(4), StopStatus::NotOperatingToday);
        assert_eq!(StopStatus::from_code(9), StopStatus::Other(9));
    }

    #[test]
    fn builder_sets_fields() {
        let obs = ArrivalObservation::new(RouteUid::new("TPE1"))
            .with_route_name("1")
            .with_direction(Direction::Inbound)
            .with_estimate(120);
        assert_eq!(obs.route_name.as_deref(), Some("1"));
        assert_eq!(obs.direction, Some(Direction::Inbound));
        assert_eq!(obs.estimate_secs, Some(120));
        assert!(obs.next_bus_time.is_none());
    }
}
