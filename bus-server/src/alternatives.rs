//! Alternative route discovery between two points.
//!
//! Given a departure and an arrival coordinate, finds every route that
//! serves the departure cluster and then, in one of its directions, reaches
//! the arrival cluster. Each network step degrades to an empty result on
//! failure, so a broken lookup for one station or route never hides the
//! routes found through the others.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::domain::{
    Coord, Direction, Route, RouteDirectionSequence, StationCluster, StopUid, prefer_route,
};
use crate::grouping::{DEFAULT_THRESHOLD_M, find_nearest_cluster};
use crate::source::TransitSource;

/// Configuration for alternative route discovery.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Clustering threshold used to resolve both endpoints, in metres.
    pub threshold_m: f64,

    /// Maximum number of provider requests issued at once.
    pub fan_out: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            threshold_m: DEFAULT_THRESHOLD_M,
            fan_out: 8,
        }
    }
}

impl FinderConfig {
    pub fn with_threshold(mut self, metres: f64) -> Self {
        self.threshold_m = metres;
        self
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out;
        self
    }

    fn concurrency(&self) -> usize {
        self.fan_out.max(1)
    }
}

/// A route and the direction proven to travel from departure to arrival.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRoute {
    pub route: Route,
    pub direction: Direction,
}

/// Departure and arrival indices if `sequence` visits a departure stop and
/// then, strictly later, an arrival stop.
///
/// The departure index is the first departure stop in the sequence; an
/// arrival stop appearing only before it does not count.
pub fn validate_direction(
    sequence: &RouteDirectionSequence,
    departure: &HashSet<StopUid>,
    arrival: &HashSet<StopUid>,
) -> Option<(usize, usize)> {
    let from = sequence.position_of(|uid| departure.contains(uid))?;
    let offset = sequence.stops[from + 1..]
        .iter()
        .position(|s| arrival.contains(&s.uid))?;
    Some((from, from + 1 + offset))
}

/// The first direction of a route that validates, in sequence order.
pub fn validate_route(
    sequences: &[RouteDirectionSequence],
    departure: &HashSet<StopUid>,
    arrival: &HashSet<StopUid>,
) -> Option<Direction> {
    sequences.iter().find_map(|sequence| {
        let direction = sequence.direction?;
        validate_direction(sequence, departure, arrival).map(|_| direction)
    })
}

/// Finds candidate routes between two clusters.
pub struct AlternativeRouteFinder<'a, S> {
    source: &'a S,
    config: &'a FinderConfig,
}

impl<'a, S: TransitSource> AlternativeRouteFinder<'a, S> {
    pub fn new(source: &'a S, config: &'a FinderConfig) -> Self {
        Self { source, config }
    }

    /// Candidate routes from the cluster nearest `departure` to the cluster
    /// nearest `arrival`.
    ///
    /// Empty if the stations cannot be loaded or either endpoint is not
    /// near a station.
    pub async fn find(&self, city: &str, departure: Coord, arrival: Coord) -> Vec<CandidateRoute> {
        let stations = match self.source.stations(city).await {
            Ok(stations) => stations,
            Err(e) => {
                warn!(city = %city, error = %e, "failed to load stations");
                return Vec::new();
            }
        };

        let Some(from) = find_nearest_cluster(departure, &stations, self.config.threshold_m) else {
            debug!(city = %city, lat = departure.lat, lon = departure.lon, "no departure cluster");
            return Vec::new();
        };
        let Some(to) = find_nearest_cluster(arrival, &stations, self.config.threshold_m) else {
            debug!(city = %city, lat = arrival.lat, lon = arrival.lon, "no arrival cluster");
            return Vec::new();
        };

        self.find_between(city, &from, &to).await
    }

    /// Candidate routes between two resolved clusters.
    pub async fn find_between(
        &self,
        city: &str,
        departure: &StationCluster,
        arrival: &StationCluster,
    ) -> Vec<CandidateRoute> {
        if departure.name() == arrival.name() {
            debug!(name = %departure.name(), "departure and arrival are the same station");
            return Vec::new();
        }

        let routes = self.routes_serving(city, departure).await;
        if routes.is_empty() {
            debug!(city = %city, station = %departure.name(), "no routes serve departure");
            return Vec::new();
        }

        let from_stops = departure.stop_uids();
        let to_stops = arrival.stop_uids();
        let mut candidates = Vec::new();

        // Results arrive in completion order; sort back to discovery order.
        let mut fetched: Vec<_> = stream::iter(routes.iter().cloned().enumerate())
            .map(|(i, route)| async move {
                let result = self.source.stop_sequences(city, &route.name).await;
                (i, route, result)
            })
            .buffer_unordered(self.config.concurrency())
            .collect()
            .await;
        fetched.sort_by_key(|(i, _, _)| *i);

        for (_, route, result) in fetched {
            let sequences = match result {
                Ok(sequences) => prefer_route(sequences, &route.uid),
                Err(e) => {
                    debug!(
                        route = %route.uid,
                        name = %route.name,
                        error = %e,
                        "Failed to fetch stop sequences, skipping route"
                    );
                    continue;
                }
            };

            match validate_route(&sequences, &from_stops, &to_stops) {
                Some(direction) => {
                    debug!(
                        route = %route.uid,
                        name = %route.name,
                        direction = direction.index(),
                        "route validated"
                    );
                    candidates.push(CandidateRoute { route, direction });
                }
                None => trace!(route = %route.uid, name = %route.name, "route rejected"),
            }
        }

        info!(
            city = %city,
            from = %departure.name(),
            to = %arrival.name(),
            examined = routes.len(),
            found = candidates.len(),
            "alternative routes found"
        );
        candidates
    }

    /// Distinct routes through any member of `cluster`, in discovery order.
    async fn routes_serving(&self, city: &str, cluster: &StationCluster) -> Vec<Route> {
        let mut fetched: Vec<_> = stream::iter(cluster.station_ids().into_iter().enumerate())
            .map(|(i, station)| async move {
                let result = self.source.routes_through_station(city, &station).await;
                (i, station, result)
            })
            .buffer_unordered(self.config.concurrency())
            .collect()
            .await;
        fetched.sort_by_key(|(i, _, _)| *i);

        let mut seen = HashSet::new();
        let mut routes = Vec::new();
        for (_, station, result) in fetched {
            match result {
                Ok(found) => {
                    routes.extend(found.into_iter().filter(|r| seen.insert(r.uid.clone())));
                }
                Err(e) => {
                    debug!(
                        station = %station,
                        error = %e,
                        "Failed to fetch routes through station, using empty"
                    );
                }
            }
        }

        routes
    }
}
