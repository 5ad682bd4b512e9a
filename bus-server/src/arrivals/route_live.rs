//! Live view of a single route.
//!
//! Every stop of each direction is paired with its best arrival, and the
//! buses currently running the route are listed alongside.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::domain::{ArrivalObservation, BusPosition, Direction, RouteDirectionSequence, RouteStop};
use crate::source::TransitSource;

use super::classify::{ArrivalInfo, classify};
use super::tracker::PollTarget;

/// A stop in travel order with its best arrival.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopArrival {
    pub stop: RouteStop,
    pub arrival: ArrivalInfo,
}

/// One direction of a route, headed by its destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionBoard {
    pub direction: Direction,
    /// `往 <last stop>`, or `A向` / `B向` when the last stop has no name.
    pub destination: String,
    pub stops: Vec<StopArrival>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteLiveView {
    pub route_name: String,
    pub directions: Vec<DirectionBoard>,
    pub buses: Vec<BusPosition>,
}

/// Display label for where a direction is headed.
pub fn destination_label(sequence: &RouteDirectionSequence, direction: Direction) -> String {
    match sequence.stops.last().map(|s| s.name.trim()) {
        Some(name) if !name.is_empty() => format!("往 {name}"),
        _ => match direction {
            Direction::Outbound => "A向".to_string(),
            Direction::Inbound => "B向".to_string(),
        },
    }
}

fn best_at(
    stop: &RouteStop,
    direction: Direction,
    observations: &[ArrivalObservation],
    now: DateTime<Utc>,
) -> ArrivalInfo {
    observations
        .iter()
        .filter(|o| o.stop_uid.as_ref() == Some(&stop.uid))
        .filter(|o| o.direction.is_none_or(|d| d == direction))
        .map(|o| classify(o, now))
        .min()
        .unwrap_or_else(ArrivalInfo::no_data)
}

/// Assemble the view from static sequences and one round of live data.
///
/// The first sequence of each direction is used, outbound first. Stops are
/// matched to observations by stop uid; buses without a fix are left out.
pub fn build_route_view(
    route_name: &str,
    sequences: &[RouteDirectionSequence],
    observations: &[ArrivalObservation],
    mut buses: Vec<BusPosition>,
    now: DateTime<Utc>,
) -> RouteLiveView {
    let directions = [Direction::Outbound, Direction::Inbound]
        .into_iter()
        .filter_map(|direction| {
            let sequence = sequences.iter().find(|s| s.direction == Some(direction))?;
            Some(DirectionBoard {
                direction,
                destination: destination_label(sequence, direction),
                stops: sequence
                    .stops
                    .iter()
                    .map(|stop| StopArrival {
                        stop: stop.clone(),
                        arrival: best_at(stop, direction, observations, now),
                    })
                    .collect(),
            })
        })
        .collect();

    buses.retain(BusPosition::has_fix);
    buses.sort_by(|a, b| (a.direction, &a.plate).cmp(&(b.direction, &b.plate)));

    RouteLiveView {
        route_name: route_name.to_string(),
        directions,
        buses,
    }
}

/// Per-stop arrivals and bus positions along one route.
pub struct RouteTarget<S> {
    source: Arc<S>,
    city: String,
    route_name: String,
    sequences: Vec<RouteDirectionSequence>,
}

impl<S: TransitSource + 'static> RouteTarget<S> {
    /// `sequences` are the route's static stop sequences, fetched once by
    /// the caller.
    pub fn new(
        source: Arc<S>,
        city: impl Into<String>,
        route_name: impl Into<String>,
        sequences: Vec<RouteDirectionSequence>,
    ) -> Self {
        Self {
            source,
            city: city.into(),
            route_name: route_name.into(),
            sequences,
        }
    }

    pub fn route_name(&self) -> &str {
        &self.route_name
    }
}

impl<S: TransitSource + 'static> PollTarget for RouteTarget<S> {
    type Output = RouteLiveView;

    fn describe(&self) -> String {
        format!("route {} ({})", self.route_name, self.city)
    }

    async fn poll(&self) -> Option<RouteLiveView> {
        let (arrivals, buses) = tokio::join!(
            self.source.route_arrivals(&self.city, &self.route_name),
            self.source.bus_positions(&self.city, &self.route_name),
        );

        let arrivals = arrivals.unwrap_or_else(|e| {
            debug!(route = %self.route_name, error = %e, "Failed to fetch route arrivals, using empty");
            Vec::new()
        });
        let buses = buses.unwrap_or_else(|e| {
            debug!(route = %self.route_name, error = %e, "Failed to fetch bus positions, using empty");
            Vec::new()
        });
        if arrivals.is_empty() && buses.is_empty() {
            return None;
        }

        Some(build_route_view(
            &self.route_name,
            &self.sequences,
            &arrivals,
            buses,
            Utc::now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrivals::{ArrivalStatus, NO_DATA_SORT_KEY};
    use crate::domain::{Coord, RouteUid, StopUid};
    use crate::source::MockTransitSource;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap()
    }

    fn stop(uid: &str, name: &str) -> RouteStop {
        RouteStop {
            uid: StopUid::new(uid),
            name: name.to_string(),
            position: Coord::new(25.0, 121.5),
        }
    }

    fn sequences() -> Vec<RouteDirectionSequence> {
        let seq = |direction, stops| RouteDirectionSequence {
            route_uid: RouteUid::new("TPE307"),
            route_name: "307".into(),
            direction: Some(direction),
            stops,
        };
        vec![
            seq(Direction::Inbound, vec![stop("B1", "板橋"), stop("B2", "")]),
            seq(Direction::Outbound, vec![stop("A1", "撫遠街"), stop("A2", "板橋")]),
        ]
    }

    fn at(stop_uid: &str, direction: Direction) -> ArrivalObservation {
        ArrivalObservation::new(RouteUid::new("TPE307"))
            .with_stop(StopUid::new(stop_uid))
            .with_direction(direction)
    }

    fn bus(plate: &str, direction: Direction, lat: f64) -> BusPosition {
        BusPosition {
            plate: plate.to_string(),
            route_uid: RouteUid::new("TPE307"),
            route_name: Some("307".into()),
            direction: Some(direction),
            position: Coord::new(lat, 121.5),
            speed: None,
            azimuth: None,
            updated_at: None,
        }
    }

    #[test]
    fn destinations_name_last_stop() {
        let seqs = sequences();
        assert_eq!(destination_label(&seqs[1], Direction::Outbound), "往 板橋");
        assert_eq!(destination_label(&seqs[0], Direction::Inbound), "B向");
    }

    #[test]
    fn stops_pick_their_best_arrival() {
        let observations = vec![
            at("A1", Direction::Outbound).with_estimate(600),
            at("A1", Direction::Outbound).with_estimate(120),
            at("A2", Direction::Inbound).with_estimate(30),
            at("B1", Direction::Inbound).with_estimate(45),
        ];
        let view = build_route_view("307", &sequences(), &observations, vec![], now());

        assert_eq!(view.directions.len(), 2);
        let out = &view.directions[0];
        assert_eq!(out.direction, Direction::Outbound);
        assert_eq!(out.stops[0].arrival.sort_key, 120);
        // The only A2 row is for the other direction.
        assert_eq!(out.stops[1].arrival.sort_key, NO_DATA_SORT_KEY);

        let back = &view.directions[1];
        assert_eq!(back.stops[0].arrival.status, ArrivalStatus::Coming);
        assert_eq!(back.stops[1].arrival, ArrivalInfo::no_data());
    }

    #[test]
    fn buses_sorted_by_direction_without_unfixed() {
        let mut lost = bus("KKA-0", Direction::Outbound, 0.0);
        lost.position = Coord::new(0.0, 0.0);
        let buses = vec![
            bus("KKA-9", Direction::Inbound, 25.03),
            bus("KKA-2", Direction::Outbound, 25.01),
            lost,
            bus("KKA-1", Direction::Outbound, 25.02),
        ];

        let view = build_route_view("307", &sequences(), &[], buses, now());
        let plates: Vec<_> = view.buses.iter().map(|b| b.plate.as_str()).collect();
        assert_eq!(plates, vec!["KKA-1", "KKA-2", "KKA-9"]);
    }

    #[tokio::test]
    async fn poll_combines_arrivals_and_positions() {
        let source = MockTransitSource::new()
            .with_route_arrivals("Taipei", "307", vec![at("A1", Direction::Outbound).with_estimate(90)])
            .with_bus_positions("Taipei", "307", vec![bus("KKA-1", Direction::Outbound, 25.01)]);
        let target = RouteTarget::new(Arc::new(source), "Taipei", "307", sequences());

        let view = target.poll().await.unwrap();
        assert_eq!(view.directions[0].stops[0].arrival.display, "1 分");
        assert_eq!(view.buses.len(), 1);
    }

    #[tokio::test]
    async fn failed_positions_still_show_arrivals() {
        let source = MockTransitSource::new()
            .with_route_arrivals("Taipei", "307", vec![at("A1", Direction::Outbound).with_estimate(90)]);
        source.fail("bus_positions");
        let source = Arc::new(source);
        let target = RouteTarget::new(source.clone(), "Taipei", "307", sequences());

        let view = target.poll().await.unwrap();
        assert!(view.buses.is_empty());
        assert_eq!(source.calls("route_arrivals"), 1);
    }

    #[tokio::test]
    async fn nothing_observed_keeps_last_result() {
        let source = MockTransitSource::new();
        source.fail("route_arrivals");
        let target = RouteTarget::new(Arc::new(source), "Taipei", "307", sequences());
        assert!(target.poll().await.is_none());
    }
}
