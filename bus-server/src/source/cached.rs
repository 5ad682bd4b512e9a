//! Caching wrapper around a transit source.

use crate::cache::{CacheConfig, TtlCache};
use crate::domain::{
    ArrivalObservation, BusPosition, Route, RouteDirectionSequence, Station, StationId,
};
use crate::tdx::TdxError;

use super::TransitSource;

/// Transit source with TTL caching of static data.
///
/// Wraps any `TransitSource` and caches route lists, stop sequences and
/// station lists. Live arrivals and bus positions always go to the wrapped
/// source.
pub struct CachedTransitSource<S> {
    source: S,
    cache: TtlCache,
}

impl<S: TransitSource> CachedTransitSource<S> {
    pub fn new(source: S, config: &CacheConfig) -> Self {
        Self {
            source,
            cache: TtlCache::new(config),
        }
    }

    /// Station list for `city`, optionally bypassing a fresh entry.
    pub async fn stations_with(
        &self,
        city: &str,
        force_refresh: bool,
    ) -> Result<Vec<Station>, TdxError> {
        self.cache
            .get(&format!("stations_city_{city}"), force_refresh, || {
                self.source.stations(city)
            })
            .await
    }

    /// Access the underlying source for operations that bypass cache.
    pub fn inner(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }
}

impl<S: TransitSource> TransitSource for CachedTransitSource<S> {
    async fn routes(&self, city: &str) -> Result<Vec<Route>, TdxError> {
        self.routes_with(city, false).await
    }

    async fn routes_with(&self, city: &str, force_refresh: bool) -> Result<Vec<Route>, TdxError> {
        self.cache
            .get(&format!("routes_{city}"), force_refresh, || {
                self.source.routes(city)
            })
            .await
    }

    async fn stop_sequences(
        &self,
        city: &str,
        route_name: &str,
    ) -> Result<Vec<RouteDirectionSequence>, TdxError> {
        self.cache
            .get(&format!("route_stops_{city}_{route_name}"), false, || {
                self.source.stop_sequences(city, route_name)
            })
            .await
    }

    async fn routes_through_station(
        &self,
        city: &str,
        station: &StationId,
    ) -> Result<Vec<Route>, TdxError> {
        self.cache
            .get(
                &format!("routes_passing_station_{city}_{station}"),
                false,
                || self.source.routes_through_station(city, station),
            )
            .await
    }

    async fn live_arrivals(
        &self,
        city: &str,
        station: &StationId,
    ) -> Result<Vec<ArrivalObservation>, TdxError> {
        self.source.live_arrivals(city, station).await
    }

    async fn route_arrivals(
        &self,
        city: &str,
        route_name: &str,
    ) -> Result<Vec<ArrivalObservation>, TdxError> {
        self.source.route_arrivals(city, route_name).await
    }

    async fn bus_positions(&self, city: &str, route_name: &str) -> Result<Vec<BusPosition>, TdxError> {
        self.source.bus_positions(city, route_name).await
    }

    async fn stations(&self, city: &str) -> Result<Vec<Station>, TdxError> {
        self.stations_with(city, false).await
    }
}
