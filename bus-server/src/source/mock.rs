//! In-memory transit source for testing without API access.
//!
//! Serves canned data keyed by city (and station or route name), counts
//! calls per operation, and can be told to fail an operation outright or
//! for one key only. Calls can also be slowed down per key, and the time
//! each call started is recorded.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{
    ArrivalObservation, BusPosition, Route, RouteDirectionSequence, Station, StationId,
};
use crate::tdx::TdxError;

use super::TransitSource;

#[derive(Default)]
struct MockState {
    routes: HashMap<String, Vec<Route>>,
    station_routes: HashMap<(String, String), Vec<Route>>,
    sequences: HashMap<(String, String), Vec<RouteDirectionSequence>>,
    arrivals: HashMap<(String, String), Vec<ArrivalObservation>>,
    route_arrivals: HashMap<(String, String), Vec<ArrivalObservation>>,
    positions: HashMap<(String, String), Vec<BusPosition>>,
    stations: HashMap<String, Vec<Station>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: HashMap<&'static str, usize>,
    started: HashMap<&'static str, Vec<(String, Instant)>>,
}

/// Mock transit source.
#[derive(Default)]
pub struct MockTransitSource {
    state: Mutex<MockState>,
}

impl MockTransitSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_routes(self, city: &str, routes: Vec<Route>) -> Self {
        self.lock().routes.insert(city.to_string(), routes);
        self
    }

    pub fn with_station_routes(self, city: &str, station: &str, routes: Vec<Route>) -> Self {
        self.lock()
            .station_routes
            .insert((city.to_string(), station.to_string()), routes);
        self
    }

    pub fn with_sequences(
        self,
        city: &str,
        route_name: &str,
        sequences: Vec<RouteDirectionSequence>,
    ) -> Self {
        self.lock()
            .sequences
            .insert((city.to_string(), route_name.to_string()), sequences);
        self
    }

    pub fn with_arrivals(
        self,
        city: &str,
        station: &str,
        arrivals: Vec<ArrivalObservation>,
    ) -> Self {
        self.set_arrivals(city, station, arrivals);
        self
    }

    pub fn with_route_arrivals(
        self,
        city: &str,
        route_name: &str,
        arrivals: Vec<ArrivalObservation>,
    ) -> Self {
        self.lock()
            .route_arrivals
            .insert(key(city, route_name), arrivals);
        self
    }

    pub fn with_bus_positions(self, city: &str, route_name: &str, buses: Vec<BusPosition>) -> Self {
        self.lock().positions.insert(key(city, route_name), buses);
        self
    }

    pub fn with_stations(self, city: &str, stations: Vec<Station>) -> Self {
        self.lock().stations.insert(city.to_string(), stations);
        self
    }

    /// Replace the live arrivals served for a station.
    pub fn set_arrivals(&self, city: &str, station: &str, arrivals: Vec<ArrivalObservation>) {
        self.lock()
            .arrivals
            .insert((city.to_string(), station.to_string()), arrivals);
    }

    /// Make every call to `op` fail until [`recover`](Self::recover).
    pub fn fail(&self, op: &str) {
        self.lock().failing.insert(op.to_string());
    }

    /// Make calls to `op` fail for one station id or route name.
    pub fn fail_key(&self, op: &str, key: &str) {
        self.lock().failing.insert(format!("{op}:{key}"));
    }

    pub fn recover(&self, op: &str) {
        let prefix = format!("{op}:");
        self.lock()
            .failing
            .retain(|f| f != op && !f.starts_with(&prefix));
    }

    /// Make calls to `op` for one station id or route name take `delay`
    /// before answering.
    pub fn delay_key(&self, op: &str, key: &str, delay: Duration) {
        self.lock().delays.insert(format!("{op}:{key}"), delay);
    }

    /// Number of calls made to `op` so far.
    pub fn calls(&self, op: &str) -> usize {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Key and start time of every call to `op`, in call order.
    pub fn started(&self, op: &str) -> Vec<(String, Instant)> {
        self.lock().started.get(op).cloned().unwrap_or_default()
    }

    async fn enter(&self, op: &'static str, key: &str) {
        let delay = {
            let mut state = self.lock();
            state
                .started
                .entry(op)
                .or_default()
                .push((key.to_string(), Instant::now()));
            state.delays.get(&format!("{op}:{key}")).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn record(&self, op: &'static str, key: &str) -> Result<MutexGuard<'_, MockState>, TdxError> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        if state.failing.contains(op) || state.failing.contains(&format!("{op}:{key}")) {
            return Err(TdxError::Api {
                status: 503,
                message: format!("mock failure for {op}"),
            });
        }
        Ok(state)
    }
}

fn key(city: &str, k: &str) -> (String, String) {
    (city.to_string(), k.to_string())
}

impl TransitSource for MockTransitSource {
    async fn routes(&self, city: &str) -> Result<Vec<Route>, TdxError> {
        self.enter("routes", city).await;
        let state = self.record("routes", city)?;
        Ok(state.routes.get(city).cloned().unwrap_or_default())
    }

    async fn stop_sequences(
        &self,
        city: &str,
        route_name: &str,
    ) -> Result<Vec<RouteDirectionSequence>, TdxError> {
        self.enter("stop_sequences", route_name).await;
        let state = self.record("stop_sequences", route_name)?;
        Ok(state
            .sequences
            .get(&key(city, route_name))
            .cloned()
            .unwrap_or_default())
    }

    async fn routes_through_station(
        &self,
        city: &str,
        station: &StationId,
    ) -> Result<Vec<Route>, TdxError> {
        self.enter("routes_through_station", station.as_str()).await;
        let state = self.record("routes_through_station", station.as_str())?;
        Ok(state
            .station_routes
            .get(&key(city, station.as_str()))
            .cloned()
            .unwrap_or_default())
    }

    async fn live_arrivals(
        &self,
        city: &str,
        station: &StationId,
    ) -> Result<Vec<ArrivalObservation>, TdxError> {
        self.enter("live_arrivals", station.as_str()).await;
        let state = self.record("live_arrivals", station.as_str())?;
        Ok(state
            .arrivals
            .get(&key(city, station.as_str()))
            .cloned()
            .unwrap_or_default())
    }

    async fn route_arrivals(
        &self,
        city: &str,
        route_name: &str,
    ) -> Result<Vec<ArrivalObservation>, TdxError> {
        self.enter("route_arrivals", route_name).await;
        let state = self.record("route_arrivals", route_name)?;
        Ok(state
            .route_arrivals
            .get(&key(city, route_name))
            .cloned()
            .unwrap_or_default())
    }

    async fn bus_positions(&self, city: &str, route_name: &str) -> Result<Vec<BusPosition>, TdxError> {
        self.enter("bus_positions", route_name).await;
        let state = self.record("bus_positions", route_name)?;
        Ok(state
            .positions
            .get(&key(city, route_name))
            .cloned()
            .unwrap_or_default())
    }

    async fn stations(&self, city: &str) -> Result<Vec<Station>, TdxError> {
        self.enter("stations", city).await;
        let state = self.record("stations", city)?;
        Ok(state.stations.get(city).cloned().unwrap_or_default())
    }
}
