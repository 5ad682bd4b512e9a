//! Re-attribution of live observations to the station that serves them.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::domain::{
    ArrivalObservation, Direction, RouteDirectionSequence, RouteUid, StationCluster, StationId,
    StopUid,
};
use crate::source::TransitSource;

use super::{DirectionResolver, DirectionStationMapping};

/// A live observation and the station it is shown at.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributedArrival {
    pub station: StationId,
    pub observation: ArrivalObservation,
}

impl AttributedArrival {
    pub fn new(station: StationId, observation: ArrivalObservation) -> Self {
        Self {
            station,
            observation,
        }
    }
}

/// Routes reported more than once with more than one direction.
fn conflicting_routes(observed: &[AttributedArrival]) -> HashSet<RouteUid> {
    let mut directions: HashMap<&RouteUid, (usize, HashSet<Direction>)> = HashMap::new();
    for a in observed {
        let entry = directions.entry(&a.observation.route_uid).or_default();
        entry.0 += 1;
        if let Some(d) = a.observation.direction {
            entry.1.insert(d);
        }
    }
    directions
        .into_iter()
        .filter(|(_, (count, dirs))| *count > 1 && dirs.len() > 1)
        .map(|(uid, _)| uid.clone())
        .collect()
}

fn sequence_contains(sequences: &[RouteDirectionSequence], direction: Direction, stop: &StopUid) -> bool {
    sequences
        .iter()
        .find(|s| s.direction == Some(direction))
        .is_some_and(|s| s.stops.iter().any(|st| &st.uid == stop))
}

/// Station for an observation by matching its stop uid against the route's
/// stop sequences. `None` means the observation does not belong here.
fn station_by_stop_uid(
    sequences: &[RouteDirectionSequence],
    cluster: &StationCluster,
    origin: &StationId,
    direction: Direction,
    stop: &StopUid,
) -> Option<StationId> {
    if sequence_contains(sequences, direction, stop) {
        return cluster
            .members()
            .iter()
            .find(|s| s.is_named_by(stop))
            .map(|s| s.id.clone());
    }

    let other = cluster.members().iter().find(|s| &s.id != origin)?;
    (sequence_contains(sequences, direction.opposite(), stop) && other.is_named_by(stop))
        .then(|| other.id.clone())
}

/// Move observations of conflicting routes to the station serving their
/// direction.
///
/// Only routes that are reported with more than one direction across the
/// cluster are touched. For those, the direction mapping decides; without
/// one, the stop uid is matched against the route's stop sequences; an
/// observation neither can place is dropped. Repeated copies of the same
/// observation are dropped too. Everything else stays at its origin.
pub async fn attribute_arrivals<S: TransitSource>(
    resolver: &DirectionResolver<'_, S>,
    city: &str,
    cluster: &StationCluster,
    observed: Vec<AttributedArrival>,
) -> Vec<AttributedArrival> {
    let conflicting = conflicting_routes(&observed);
    if conflicting.is_empty() {
        return observed;
    }

    let mut mappings: HashMap<RouteUid, Option<DirectionStationMapping>> = HashMap::new();
    let mut sequences: HashMap<RouteUid, Vec<RouteDirectionSequence>> = HashMap::new();
    let mut seen: HashSet<(RouteUid, Direction, StopUid, Option<i64>, Option<String>)> =
        HashSet::new();
    let mut out = Vec::with_capacity(observed.len());

    for arrival in observed {
        let obs = &arrival.observation;
        let (Some(direction), Some(route_name), Some(stop)) =
            (obs.direction, obs.route_name.clone(), obs.stop_uid.clone())
        else {
            out.push(arrival);
            continue;
        };

        if !conflicting.contains(&obs.route_uid) {
            out.push(arrival);
            continue;
        }

        let key = (
            obs.route_uid.clone(),
            direction,
            stop.clone(),
            obs.estimate_secs,
            obs.next_bus_time.clone(),
        );
        if !seen.insert(key) {
            trace!(route = %obs.route_uid, stop = %stop, "dropping repeated observation");
            continue;
        }

        let route_uid = obs.route_uid.clone();
        if !mappings.contains_key(&route_uid) {
            let mapping = resolver.resolve(city, &route_uid, &route_name, cluster).await;
            mappings.insert(route_uid.clone(), mapping);
        }

        let target = match mappings.get(&route_uid).and_then(Option::as_ref) {
            Some(mapping) => Some(
                mapping
                    .station_for(direction)
                    .cloned()
                    .unwrap_or_else(|| arrival.station.clone()),
            ),
            None => {
                if !sequences.contains_key(&route_uid) {
                    let fetched = resolver.sequences_for(city, &route_uid, &route_name).await;
                    sequences.insert(route_uid.clone(), fetched);
                }
                let seqs = sequences.get(&route_uid).map(Vec::as_slice).unwrap_or_default();
                station_by_stop_uid(seqs, cluster, &arrival.station, direction, &stop)
            }
        };

        match target {
            Some(station) => {
                if station != arrival.station {
                    debug!(
                        route = %route_uid,
                        direction = direction.index(),
                        from = %arrival.station,
                        to = %station,
                        "re-attributed observation"
                    );
                }
                out.push(AttributedArrival::new(station, arrival.observation));
            }
            None => {
                debug!(
                    route = %route_uid,
                    direction = direction.index(),
                    stop = %stop,
                    "observation does not belong to cluster, dropped"
                );
            }
        }
    }

    out
}
