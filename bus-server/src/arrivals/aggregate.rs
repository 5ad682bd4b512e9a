//! Fetching live observations for a cluster and picking the best per route.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::debug;

use crate::alternatives::CandidateRoute;
use crate::direction::AttributedArrival;
use crate::domain::{ArrivalObservation, RouteUid, StationCluster};
use crate::source::TransitSource;

use super::classify::{ArrivalInfo, classify};

/// Live observations at every member of `cluster`, tagged with the member
/// they were reported at.
///
/// A member whose fetch fails contributes nothing.
pub async fn fetch_cluster_arrivals<S: TransitSource>(
    source: &S,
    city: &str,
    cluster: &StationCluster,
    fan_out: usize,
) -> Vec<AttributedArrival> {
    let mut fetched: Vec<_> = stream::iter(cluster.station_ids().into_iter().enumerate())
        .map(|(i, station)| async move {
            let result = source.live_arrivals(city, &station).await;
            (i, station, result)
        })
        .buffer_unordered(fan_out.max(1))
        .collect()
        .await;
    fetched.sort_by_key(|(i, _, _)| *i);

    let mut observed = Vec::new();
    for (_, station, result) in fetched {
        match result {
            Ok(arrivals) => observed.extend(
                arrivals
                    .into_iter()
                    .map(|o| AttributedArrival::new(station.clone(), o)),
            ),
            Err(e) => {
                debug!(
                    station = %station,
                    error = %e,
                    "Failed to fetch live arrivals, using empty"
                );
            }
        }
    }

    observed
}

fn serves(candidate: &CandidateRoute, observation: &ArrivalObservation) -> bool {
    let same_route = observation.route_uid == candidate.route.uid
        || observation.route_name.as_deref() == Some(candidate.route.name.as_str());
    same_route && observation.direction == Some(candidate.direction)
}

/// Best arrival per candidate route.
///
/// Every candidate gets an entry; one without a matching observation gets
/// [`ArrivalInfo::no_data`].
pub fn best_arrivals(
    candidates: &[CandidateRoute],
    observations: &[ArrivalObservation],
    now: DateTime<Utc>,
) -> HashMap<RouteUid, ArrivalInfo> {
    candidates
        .iter()
        .map(|candidate| {
            let best = observations
                .iter()
                .filter(|o| serves(candidate, o))
                .map(|o| classify(o, now))
                .min()
                .unwrap_or_else(ArrivalInfo::no_data);
            (candidate.route.uid.clone(), best)
        })
        .collect()
}

/// A candidate route with its best live arrival.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateArrival {
    #[serde(flatten)]
    pub candidate: CandidateRoute,
    pub arrival: ArrivalInfo,
}

/// Candidates paired with their best arrival, soonest first.
pub fn rank_candidates(
    candidates: &[CandidateRoute],
    observations: &[ArrivalObservation],
    now: DateTime<Utc>,
) -> Vec<CandidateArrival> {
    let mut best = best_arrivals(candidates, observations, now);
    let mut ranked: Vec<CandidateArrival> = candidates
        .iter()
        .map(|candidate| CandidateArrival {
            arrival: best
                .remove(&candidate.route.uid)
                .unwrap_or_else(ArrivalInfo::no_data),
            candidate: candidate.clone(),
        })
        .collect();
    ranked.sort_by(|a, b| a.arrival.cmp(&b.arrival));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrivals::{ArrivalStatus, NO_DATA_SORT_KEY};
    use crate::domain::{Coord, Direction, Route, Station, StationId, StopStatus};
    use crate::source::MockTransitSource;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap()
    }

    fn candidate(uid: &str, name: &str, direction: Direction) -> CandidateRoute {
        CandidateRoute {
            route: Route {
                uid: RouteUid::new(uid),
                name: name.to_string(),
                name_en: None,
            },
            direction,
        }
    }

    fn obs(uid: &str, direction: Direction) -> ArrivalObservation {
        ArrivalObservation::new(RouteUid::new(uid)).with_direction(direction)
    }

    fn cluster(ids: &[&str]) -> StationCluster {
        StationCluster::new(
            "公館".into(),
            ids.iter()
                .map(|id| Station {
                    id: StationId::new(*id),
                    uid: id.to_string(),
                    name: "公館".into(),
                    position: Coord::new(25.0, 121.5),
                    stops: vec![],
                })
                .collect(),
            StationId::new(ids[0]),
        )
    }

    #[test]
    fn keeps_minimum_per_candidate() {
        let candidates = vec![candidate("R1", "1", Direction::Outbound)];
        let observations = vec![
            obs("R1", Direction::Outbound).with_estimate(400),
            obs("R1", Direction::Outbound).with_estimate(90),
            obs("R1", Direction::Inbound).with_estimate(10),
            obs("R1", Direction::Outbound).with_status(StopStatus::LastBusGone),
        ];
        let best = best_arrivals(&candidates, &observations, now());
        let info = &best[&RouteUid::new("R1")];
        assert_eq!(info.status, ArrivalStatus::Coming);
        assert_eq!(info.sort_key, 90);
    }

    #[test]
    fn matches_by_route_name_too() {
        let candidates = vec![candidate("R1", "307", Direction::Inbound)];
        let observations = vec![obs("OTHER", Direction::Inbound)
            .with_route_name("307")
            .with_estimate(200)];
        let best = best_arrivals(&candidates, &observations, now());
        assert_eq!(best[&RouteUid::new("R1")].display, "3 分");
    }

    #[test]
    fn missing_candidate_gets_no_data() {
        let candidates = vec![
            candidate("R1", "1", Direction::Outbound),
            candidate("R2", "2", Direction::Outbound),
        ];
        let observations = vec![obs("R1", Direction::Outbound).with_estimate(30)];
        let best = best_arrivals(&candidates, &observations, now());
        assert_eq!(best.len(), 2);
        assert_eq!(best[&RouteUid::new("R2")].sort_key, NO_DATA_SORT_KEY);
    }

    #[test]
    fn candidates_ranked_soonest_first() {
        let candidates = vec![
            candidate("R1", "1", Direction::Outbound),
            candidate("R2", "2", Direction::Outbound),
            candidate("R3", "3", Direction::Inbound),
        ];
        let observations = vec![
            obs("R1", Direction::Outbound).with_estimate(600),
            obs("R3", Direction::Inbound).with_estimate(120),
        ];
        let ranked = rank_candidates(&candidates, &observations, now());
        let order: Vec<_> = ranked.iter().map(|c| c.candidate.route.uid.as_str()).collect();
        assert_eq!(order, vec!["R3", "R1", "R2"]);
    }

    #[tokio::test]
    async fn failed_member_contributes_nothing() {
        let source = MockTransitSource::new()
            .with_arrivals("Taipei", "N", vec![obs("R1", Direction::Outbound).with_estimate(60)])
            .with_arrivals("Taipei", "S", vec![obs("R1", Direction::Inbound).with_estimate(90)]);
        source.fail_key("live_arrivals", "S");

        let observed = fetch_cluster_arrivals(&source, "Taipei", &cluster(&["N", "S"]), 1).await;
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].station, StationId::new("N"));
        assert_eq!(source.calls("live_arrivals"), 2);
    }

    #[tokio::test]
    async fn tags_observations_with_member() {
        let source = MockTransitSource::new()
            .with_arrivals("Taipei", "N", vec![obs("R1", Direction::Outbound)])
            .with_arrivals("Taipei", "S", vec![obs("R2", Direction::Inbound)]);

        let observed = fetch_cluster_arrivals(&source, "Taipei", &cluster(&["N", "S"]), 8).await;
        let tagged: Vec<_> = observed
            .iter()
            .map(|a| (a.station.as_str(), a.observation.route_uid.as_str()))
            .collect();
        assert_eq!(tagged, vec![("N", "R1"), ("S", "R2")]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_member_does_not_hold_back_the_rest() {
        let source = MockTransitSource::new()
            .with_arrivals("Taipei", "C", vec![obs("R3", Direction::Outbound)])
            .with_arrivals("Taipei", "slow", vec![obs("R0", Direction::Outbound)]);
        source.delay_key("live_arrivals", "slow", std::time::Duration::from_secs(20));
        let t0 = tokio::time::Instant::now();

        let observed =
            fetch_cluster_arrivals(&source, "Taipei", &cluster(&["slow", "A", "B", "C"]), 2).await;

        let started = source.started("live_arrivals");
        assert_eq!(started.len(), 4);
        assert!(started.iter().all(|(_, at)| *at == t0), "{started:?}");
        let tagged: Vec<_> = observed.iter().map(|a| a.station.as_str()).collect();
        assert_eq!(tagged, vec!["slow", "C"]);
    }
}
