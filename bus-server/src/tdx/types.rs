//! TDX API response types.
//!
//! These mirror the JSON the provider returns. Fields the provider is known
//! to omit are `Option` or `#[serde(default)]`; unknown fields are ignored.

use serde::Deserialize;

/// Bilingual name as the provider spells it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NameType {
    #[serde(rename = "Zh_tw")]
    pub zh_tw: Option<String>,
    #[serde(rename = "En")]
    pub en: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PointType {
    #[serde(rename = "PositionLat", default)]
    pub lat: f64,
    #[serde(rename = "PositionLon", default)]
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TokenResponse {
    #[serde(rename = "access_token")]
    pub access_token: String,
    #[serde(rename = "expires_in")]
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BusRoute {
    #[serde(rename = "RouteUID")]
    pub route_uid: String,
    #[serde(default)]
    pub route_name: NameType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BusStop {
    #[serde(rename = "StopUID")]
    pub stop_uid: String,
    #[serde(rename = "StopID")]
    pub stop_id: Option<String>,
    #[serde(default)]
    pub stop_name: NameType,
    #[serde(default)]
    pub stop_position: PointType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StopOfRoute {
    #[serde(rename = "RouteUID")]
    pub route_uid: String,
    #[serde(default)]
    pub route_name: NameType,
    pub direction: Option<i64>,
    #[serde(default)]
    pub stops: Vec<BusStop>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BusStationStop {
    #[serde(rename = "StopUID")]
    pub stop_uid: String,
    #[serde(rename = "StopID")]
    pub stop_id: Option<String>,
    #[serde(rename = "RouteUID")]
    pub route_uid: String,
    #[serde(rename = "RouteID")]
    pub route_id: Option<String>,
    #[serde(default)]
    pub route_name: NameType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BusStation {
    #[serde(rename = "StationUID")]
    pub station_uid: String,
    #[serde(rename = "StationID")]
    pub station_id: String,
    #[serde(default)]
    pub station_name: NameType,
    #[serde(default)]
    pub station_position: PointType,
    #[serde(default)]
    pub stops: Vec<BusStationStop>,
}

/// One row of the per-station arrival estimate feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StationBusEstimateTime {
    #[serde(rename = "StationUID")]
    pub station_uid: Option<String>,
    #[serde(rename = "StationID")]
    pub station_id: Option<String>,
    #[serde(rename = "StopUID")]
    pub stop_uid: Option<String>,
    #[serde(rename = "StopID")]
    pub stop_id: Option<String>,
    #[serde(rename = "RouteUID")]
    pub route_uid: String,
    pub route_name: Option<NameType>,
    pub direction: Option<i64>,
    pub estimate_time: Option<i64>,
    pub stop_status: Option<i64>,
    pub next_bus_time: Option<String>,
    pub src_update_time: Option<String>,
    pub update_time: Option<String>,
}

/// One row of the fixed-interval bus position feed (A1 data).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BusA1Data {
    pub plate_numb: String,
    #[serde(rename = "RouteUID")]
    pub route_uid: Option<String>,
    pub route_name: Option<NameType>,
    pub direction: Option<i64>,
    #[serde(default)]
    pub bus_position: PointType,
    pub speed: Option<f64>,
    pub azimuth: Option<f64>,
    #[serde(rename = "GPSTime")]
    pub gps_time: Option<String>,
    pub update_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_station() {
        let json = r#"{
            "StationUID": "TPE12345",
            "StationID": "12345",
            "StationName": {"Zh_tw": "公館", "En": "Gongguan"},
            "StationPosition": {"PositionLat": 25.0147, "PositionLon": 121.5343, "GeoHash": "wsqqm"},
            "Stops": [
                {"StopUID": "TPE100", "StopID": "100", "RouteUID": "TPE10132",
                 "RouteID": "10132", "RouteName": {"Zh_tw": "1", "En": "1"}}
            ],
            "UpdateTime": "2024-05-01T00:00:00+08:00"
        }"#;
        let station: BusStation = serde_json::from_str(json).unwrap();
        assert_eq!(station.station_id, "12345");
        assert_eq!(station.station_name.zh_tw.as_deref(), Some("公館"));
        assert_eq!(station.stops.len(), 1);
        assert!((station.station_position.lat - 25.0147).abs() < 1e-9);
    }

    #[test]
    fn parse_estimate_with_missing_fields() {
        let json = r#"[{"RouteUID": "TPE10132", "StopStatus": 1}]"#;
        let rows: Vec<StationBusEstimateTime> = serde_json::from_str(json).unwrap();
        assert_eq!(rows[0].route_uid, "TPE10132");
        assert_eq!(rows[0].stop_status, Some(1));
        assert!(rows[0].estimate_time.is_none());
        assert!(rows[0].route_name.is_none());
    }

    #[test]
    fn parse_stop_of_route() {
        let json = r#"[{
            "RouteUID": "TPE10132",
            "RouteName": {"Zh_tw": "1"},
            "Direction": 1,
            "Stops": [{"StopUID": "TPE1", "StopName": {"Zh_tw": "A"},
                       "StopPosition": {"PositionLat": 25.0, "PositionLon": 121.5}}]
        }]"#;
        let rows: Vec<StopOfRoute> = serde_json::from_str(json).unwrap();
        assert_eq!(rows[0].direction, Some(1));
        assert!(rows[0].stops[0].stop_id.is_none());
    }

    #[test]
    fn parse_bus_position() {
        let json = r#"[{
            "PlateNumb": "KKA-1234",
            "OperatorID": "100",
            "RouteUID": "TPE10132",
            "RouteName": {"Zh_tw": "1", "En": "1"},
            "Direction": 0,
            "BusPosition": {"PositionLat": 25.04, "PositionLon": 121.51},
            "Speed": 23.5,
            "Azimuth": 270.0,
            "DutyStatus": 0,
            "GPSTime": "2024-05-01T08:00:00+08:00"
        }, {"PlateNumb": "KKA-9999"}]"#;
        let rows: Vec<BusA1Data> = serde_json::from_str(json).unwrap();
        assert_eq!(rows[0].plate_numb, "KKA-1234");
        assert_eq!(rows[0].speed, Some(23.5));
        assert!((rows[0].bus_position.lon - 121.51).abs() < 1e-9);
        assert!(rows[1].route_uid.is_none());
        assert_eq!(rows[1].bus_position.lat, 0.0);
    }

    #[test]
    fn parse_token() {
        let json = r#"{"access_token": "abc", "expires_in": 86400, "token_type": "Bearer"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, 86400);
    }
}
