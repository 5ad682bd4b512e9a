//! Conversion from TDX DTOs to domain types.
//!
//! Missing fields degrade to neutral values instead of failing the whole
//! response; only the uid fields the domain cannot do without are required
//! by the DTOs themselves.

use chrono::{DateTime, FixedOffset};

use crate::domain::{
    ArrivalObservation, BusPosition, Coord, Direction, Route, RouteDirectionSequence, RouteStop,
    RouteUid, Station, StationId, StationStop, StopStatus, StopUid,
};

use super::types::{
    BusA1Data, BusRoute, BusStation, NameType, PointType, StationBusEstimateTime, StopOfRoute,
};

const UNKNOWN_ROUTE_NAME: &str = "未知路線";

fn zh_or_en(name: &NameType) -> Option<&str> {
    name.zh_tw.as_deref().or(name.en.as_deref())
}

fn coord(point: PointType) -> Coord {
    Coord::new(point.lat, point.lon)
}

fn parse_offset_time(s: Option<&str>) -> Option<DateTime<FixedOffset>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

pub fn convert_route(route: &BusRoute) -> Route {
    Route {
        uid: RouteUid::new(&route.route_uid),
        name: zh_or_en(&route.route_name)
            .unwrap_or(UNKNOWN_ROUTE_NAME)
            .to_string(),
        name_en: route.route_name.en.clone(),
    }
}

pub fn convert_stop_of_route(row: &StopOfRoute) -> RouteDirectionSequence {
    RouteDirectionSequence {
        route_uid: RouteUid::new(&row.route_uid),
        route_name: zh_or_en(&row.route_name)
            .unwrap_or(UNKNOWN_ROUTE_NAME)
            .to_string(),
        direction: row.direction.and_then(Direction::from_index),
        stops: row
            .stops
            .iter()
            .map(|s| RouteStop {
                uid: StopUid::new(&s.stop_uid),
                name: zh_or_en(&s.stop_name).unwrap_or_default().to_string(),
                position: coord(s.stop_position),
            })
            .collect(),
    }
}

pub fn convert_station(station: &BusStation) -> Station {
    Station {
        id: StationId::new(&station.station_id),
        uid: station.station_uid.clone(),
        name: station
            .station_name
            .zh_tw
            .clone()
            .unwrap_or_default(),
        position: coord(station.station_position),
        stops: station
            .stops
            .iter()
            .map(|s| StationStop {
                stop_uid: StopUid::new(&s.stop_uid),
                route_uid: RouteUid::new(&s.route_uid),
                route_name: zh_or_en(&s.route_name)
                    .unwrap_or(UNKNOWN_ROUTE_NAME)
                    .to_string(),
            })
            .collect(),
    }
}

/// Convert one estimate row. `queried` is the station the feed was asked
/// for, used when the row does not name its station.
pub fn convert_estimate(row: &StationBusEstimateTime, queried: &StationId) -> ArrivalObservation {
    let mut obs = convert_route_estimate(row);
    if obs.station_id.is_none() {
        obs.station_id = Some(queried.clone());
    }
    obs
}

/// Estimate row from the whole-route feed, where no station was queried.
pub fn convert_route_estimate(row: &StationBusEstimateTime) -> ArrivalObservation {
    ArrivalObservation {
        route_uid: RouteUid::new(&row.route_uid),
        route_name: row
            .route_name
            .as_ref()
            .and_then(|n| n.zh_tw.clone()),
        direction: row.direction.and_then(Direction::from_index),
        stop_uid: row.stop_uid.as_deref().map(StopUid::new),
        station_id: row.station_id.as_deref().map(StationId::new),
        estimate_secs: row.estimate_time,
        next_bus_time: row.next_bus_time.clone(),
        stop_status: row.stop_status.map(StopStatus::from_code),
        updated_at: parse_offset_time(row.src_update_time.as_deref())
            .or_else(|| parse_offset_time(row.update_time.as_deref())),
    }
}

/// `None` for rows that do not name their route.
pub fn convert_bus_position(row: &BusA1Data) -> Option<BusPosition> {
    Some(BusPosition {
        plate: row.plate_numb.clone(),
        route_uid: RouteUid::new(row.route_uid.as_deref()?),
        route_name: row.route_name.as_ref().and_then(|n| zh_or_en(n).map(str::to_string)),
        direction: row.direction.and_then(Direction::from_index),
        position: coord(row.bus_position),
        speed: row.speed,
        azimuth: row.azimuth,
        updated_at: parse_offset_time(row.gps_time.as_deref())
            .or_else(|| parse_offset_time(row.update_time.as_deref())),
    })
}
