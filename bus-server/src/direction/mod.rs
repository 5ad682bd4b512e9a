//! Direction disambiguation for two-pole station clusters.
//!
//! A route passing a two-member cluster stops at one pole per direction,
//! but the live feed sometimes reports both directions at both poles.
//! This module works out which pole serves which direction, first from a
//! persisted mapping, then from bearing geometry, and uses the answer to
//! re-attribute live observations.

mod attribution;
mod bearing;
mod mapping_cache;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{RouteDirectionSequence, RouteUid, StationCluster, prefer_route};
use crate::source::TransitSource;

pub use attribution::{AttributedArrival, attribute_arrivals};
pub use bearing::{DirectionAssignment, estimate_route_bearing, infer_mapping};
pub use mapping_cache::{
    DirectionMappingCache, DirectionStationMapping, MappingCacheConfig, MappingCacheError,
};

/// Resolves direction mappings for routes at one cluster.
pub struct DirectionResolver<'a, S> {
    source: &'a S,
    cache: &'a DirectionMappingCache,
}

impl<'a, S: TransitSource> DirectionResolver<'a, S> {
    pub fn new(source: &'a S, cache: &'a DirectionMappingCache) -> Self {
        Self { source, cache }
    }

    /// Mapping for `route_uid` at `cluster`, or `None` if it is unknown.
    ///
    /// Uses the cached mapping when it is live and fits the cluster;
    /// otherwise infers one from stop sequences and caches it.
    pub async fn resolve(
        &self,
        city: &str,
        route_uid: &RouteUid,
        route_name: &str,
        cluster: &StationCluster,
    ) -> Option<DirectionStationMapping> {
        if cluster.len() != 2 {
            debug!(
                cluster = %cluster.name(),
                members = cluster.len(),
                "direction mapping needs exactly two stations"
            );
            return None;
        }

        if let Some(mapping) = self.cache.lookup(route_uid, cluster).await {
            return Some(mapping);
        }

        let sequences = self.sequences_for(city, route_uid, route_name).await;
        let Some(assignment) = infer_mapping(&sequences, cluster) else {
            warn!(
                route = %route_uid,
                name = route_name,
                cluster = %cluster.name(),
                "could not infer direction mapping"
            );
            return None;
        };

        let mapping =
            DirectionStationMapping::from_assignment(route_uid.clone(), &assignment, Utc::now());
        info!(
            route = %route_uid,
            outbound = %assignment.outbound,
            inbound = %assignment.inbound,
            "inferred direction mapping"
        );
        self.cache.insert(mapping.clone()).await;
        Some(mapping)
    }

    /// Stop sequences for a route, empty if they cannot be fetched.
    pub async fn sequences_for(
        &self,
        city: &str,
        route_uid: &RouteUid,
        route_name: &str,
    ) -> Vec<RouteDirectionSequence> {
        match self.source.stop_sequences(city, route_name).await {
            Ok(sequences) => prefer_route(sequences, route_uid),
            Err(e) => {
                debug!(route = %route_uid, error = %e, "failed to fetch stop sequences");
                Vec::new()
            }
        }
    }
}
