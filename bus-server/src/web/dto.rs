//! Data transfer objects for web requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alternatives::CandidateRoute;
use crate::arrivals::{ArrivalInfo, RouteLiveView, Snapshot};
use crate::domain::geo::distance;
use crate::domain::{City, Coord, Itinerary, Route, StationCluster, StationId};

/// Query for stations near a point.
#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,

    /// Browse radius in metres (defaults to the configured radius)
    pub radius_m: Option<f64>,
}

/// Query for alternative routes between two points.
#[derive(Debug, Deserialize)]
pub struct AlternativesQuery {
    pub from_lat: f64,
    pub from_lon: f64,
    pub to_lat: f64,
    pub to_lon: f64,
}

impl AlternativesQuery {
    pub fn from(&self) -> Coord {
        Coord::new(self.from_lat, self.from_lon)
    }

    pub fn to(&self) -> Coord {
        Coord::new(self.to_lat, self.to_lon)
    }
}

/// Query for the provider route behind a third-party line name.
#[derive(Debug, Deserialize)]
pub struct RouteMatchQuery {
    /// Line name as the directions provider spells it (e.g. "299V")
    pub line: String,
}

/// Query for a city's route list.
#[derive(Debug, Deserialize)]
pub struct RouteListQuery {
    /// Search text matched against route names
    pub q: Option<String>,

    /// Bypass the cached route list
    #[serde(default)]
    pub refresh: bool,
}

/// Request to re-time an itinerary around a chosen arrival.
#[derive(Debug, Deserialize)]
pub struct RetimeRequest {
    /// The skeleton from the directions provider
    pub itinerary: Itinerary,

    /// Index of the transit leg the arrival belongs to
    pub leg_index: usize,

    /// The arrival the user picked
    pub arrival: ArrivalInfo,
}

/// Request to start tracking alternatives between two points.
#[derive(Debug, Deserialize)]
pub struct TrackAlternativesRequest {
    /// Provider city name (e.g. "Taipei")
    pub city: String,
    pub from: Coord,
    pub to: Coord,
}

/// Request to start tracking a station board.
#[derive(Debug, Deserialize)]
pub struct TrackBoardRequest {
    pub city: String,
    pub lat: f64,
    pub lon: f64,

    /// Member station to show (defaults to the member nearest the point)
    pub station: Option<StationId>,
}

/// Request to start tracking one route.
#[derive(Debug, Deserialize)]
pub struct TrackRouteRequest {
    pub city: String,

    /// Chinese route name (e.g. "307")
    pub route: String,
}

/// Supported cities.
#[derive(Debug, Serialize)]
pub struct CitiesResponse {
    pub cities: Vec<City>,
}

/// A member station of a cluster.
#[derive(Debug, Serialize)]
pub struct StationResult {
    pub id: StationId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// A station cluster.
#[derive(Debug, Serialize)]
pub struct ClusterResult {
    pub name: String,

    /// Member nearest the query point
    pub closest: StationId,

    /// Distance from the query point to the closest member, in metres
    pub distance_m: f64,

    pub stations: Vec<StationResult>,
}

/// Station clusters near a point, nearest first.
#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    pub clusters: Vec<ClusterResult>,
}

/// Candidate routes between two points.
#[derive(Debug, Serialize)]
pub struct AlternativesResponse {
    pub candidates: Vec<CandidateRoute>,
}

/// The provider route a line name refers to.
#[derive(Debug, Serialize)]
pub struct RouteMatchResponse {
    pub line: String,
    pub route: Route,
}

/// Routes of a city in listing order.
#[derive(Debug, Serialize)]
pub struct RouteListResponse {
    pub routes: Vec<Route>,
}

/// A re-timed itinerary.
#[derive(Debug, Serialize)]
pub struct RetimeResponse {
    pub itinerary: Itinerary,

    /// Departure as HH:MM, or "--:--"
    pub departure: String,

    /// Arrival as HH:MM, or "--:--"
    pub arrival: String,
}

/// State of one tracker.
#[derive(Debug, Serialize)]
pub struct TrackerStatus {
    pub running: bool,
    pub has_target: bool,
}

/// State of every tracker.
#[derive(Debug, Serialize)]
pub struct TrackingStatusResponse {
    pub alternatives: TrackerStatus,
    pub board: TrackerStatus,
    pub route: TrackerStatus,
}

/// Latest result of a tracker.
#[derive(Debug, Serialize)]
pub struct TrackedResponse<T> {
    pub running: bool,

    /// When the results were fetched; absent before the first result
    pub updated_at: Option<DateTime<Utc>>,

    pub results: Vec<T>,
}

/// Latest live view of the tracked route.
#[derive(Debug, Serialize)]
pub struct TrackedRouteResponse {
    pub running: bool,
    pub updated_at: Option<DateTime<Utc>>,

    /// Absent before the first result
    pub view: Option<RouteLiveView>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

// Conversion implementations

impl ClusterResult {
    /// Create from a cluster resolved around `center`.
    pub fn from_cluster(cluster: &StationCluster, center: Coord) -> Self {
        let distance_m = cluster
            .closest_member()
            .map(|s| distance(center, s.position))
            .unwrap_or(f64::INFINITY);

        Self {
            name: cluster.name().to_string(),
            closest: cluster.closest().clone(),
            distance_m,
            stations: cluster
                .members()
                .iter()
                .map(|s| StationResult {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    lat: s.position.lat,
                    lon: s.position.lon,
                })
                .collect(),
        }
    }
}

impl<T: Clone> TrackedResponse<T> {
    /// Create from a tracker's latest snapshot.
    pub fn from_snapshot(running: bool, snapshot: Option<Snapshot<Vec<T>>>) -> Self {
        match snapshot {
            Some(s) => Self {
                running,
                updated_at: Some(s.updated_at),
                results: s.value,
            },
            None => Self {
                running,
                updated_at: None,
                results: Vec::new(),
            },
        }
    }
}

impl TrackedRouteResponse {
    pub fn from_snapshot(running: bool, snapshot: Option<Snapshot<RouteLiveView>>) -> Self {
        Self {
            running,
            updated_at: snapshot.as_ref().map(|s| s.updated_at),
            view: snapshot.map(|s| s.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Station;
    use crate::grouping::find_nearest_cluster;
    use chrono::TimeZone;

    fn station(id: &str, lon: f64) -> Station {
        Station {
            id: StationId::new(id),
            uid: format!("TPE{id}"),
            name: "公館".into(),
            position: Coord::new(25.0, lon),
            stops: vec![],
        }
    }

    #[test]
    fn cluster_result_from_cluster() {
        let stations = vec![station("1", 121.5), station("2", 121.501)];
        let center = Coord::new(25.0, 121.501);
        let cluster = find_nearest_cluster(center, &stations, 150.0).unwrap();

        let result = ClusterResult::from_cluster(&cluster, center);
        assert_eq!(result.name, "公館");
        assert_eq!(result.closest, StationId::new("2"));
        assert!(result.distance_m < 1.0);
        assert_eq!(result.stations.len(), 2);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["closest"], "2");
        assert_eq!(json["stations"][0]["id"], "1");
    }

    #[test]
    fn tracked_response_before_first_result() {
        let empty: TrackedResponse<u32> = TrackedResponse::from_snapshot(true, None);
        assert!(empty.running);
        assert!(empty.updated_at.is_none());
        assert!(empty.results.is_empty());

        let at = Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap();
        let full = TrackedResponse::from_snapshot(
            false,
            Some(Snapshot {
                value: vec![1, 2],
                updated_at: at,
            }),
        );
        assert_eq!(full.results, vec![1, 2]);
        assert_eq!(full.updated_at, Some(at));
    }

    #[test]
    fn route_list_query_defaults() {
        let query: RouteListQuery = serde_json::from_str("{}").unwrap();
        assert!(query.q.is_none());
        assert!(!query.refresh);
    }

    #[test]
    fn retime_request_parses() {
        let json = r#"{
            "itinerary": {"legs": [{
                "mode": {"kind": "transit", "line_name": "307", "headsign": null,
                         "departure_stop": "公館", "arrival_stop": "台北車站",
                         "stop_count": 9, "vehicle": "bus"},
                "start": {"lat": 25.01, "lon": 121.53},
                "end": {"lat": 25.04, "lon": 121.51},
                "duration_secs": 600,
                "departure": null,
                "arrival": null
            }]},
            "leg_index": 0,
            "arrival": {"status": "COMING", "sort_key": 120, "display": "2 分"}
        }"#;
        let req: RetimeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.itinerary.legs.len(), 1);
        assert!(req.itinerary.legs[0].polyline.is_empty());
        assert_eq!(req.arrival.sort_key, 120);
    }
}
