//! Transit data access.
//!
//! [`TransitSource`] is the seam between the route-resolution logic and the
//! provider. The live client, the caching wrapper and the in-memory mock
//! all implement it, so finders and pollers are generic over where their
//! data comes from.

mod cached;
mod mock;

use std::future::Future;

use crate::domain::{
    ArrivalObservation, BusPosition, Route, RouteDirectionSequence, Station, StationId,
};
use crate::tdx::TdxError;

pub use cached::CachedTransitSource;
pub use mock::MockTransitSource;

/// Provider of static and live bus data for a city.
///
/// `city` is the provider's city name (e.g. `"Taipei"`). Each call is one
/// unit of failure: a timeout, a non-success status and a malformed payload
/// all surface as a single `Err`.
pub trait TransitSource: Send + Sync {
    /// Every route in the city.
    fn routes(&self, city: &str) -> impl Future<Output = Result<Vec<Route>, TdxError>> + Send;

    /// Route list, optionally bypassing anything cached. Sources without a
    /// cache always fetch.
    fn routes_with(
        &self,
        city: &str,
        _force_refresh: bool,
    ) -> impl Future<Output = Result<Vec<Route>, TdxError>> + Send {
        self.routes(city)
    }

    /// Per-direction stop sequences of every route named `route_name`.
    fn stop_sequences(
        &self,
        city: &str,
        route_name: &str,
    ) -> impl Future<Output = Result<Vec<RouteDirectionSequence>, TdxError>> + Send;

    /// Routes serving a physical station.
    fn routes_through_station(
        &self,
        city: &str,
        station: &StationId,
    ) -> impl Future<Output = Result<Vec<Route>, TdxError>> + Send;

    /// Live arrival predictions at a physical station.
    fn live_arrivals(
        &self,
        city: &str,
        station: &StationId,
    ) -> impl Future<Output = Result<Vec<ArrivalObservation>, TdxError>> + Send;

    /// Live arrival predictions at every stop of the routes named `route_name`.
    fn route_arrivals(
        &self,
        city: &str,
        route_name: &str,
    ) -> impl Future<Output = Result<Vec<ArrivalObservation>, TdxError>> + Send;

    /// Last reported positions of the buses running routes named `route_name`.
    fn bus_positions(
        &self,
        city: &str,
        route_name: &str,
    ) -> impl Future<Output = Result<Vec<BusPosition>, TdxError>> + Send;

    /// Every station in the city, with the stops served at each.
    fn stations(&self, city: &str) -> impl Future<Output = Result<Vec<Station>, TdxError>> + Send;
}
