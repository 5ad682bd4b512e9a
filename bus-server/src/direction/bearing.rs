//! Bearing-based inference of which station serves which direction.
//!
//! Traffic drives on the right, so a bus heading along bearing θ stops at
//! the pole on the right-hand side of the road. Given the two poles of a
//! cluster, the pole that lies clockwise of the travel bearing (as seen
//! from the other pole) serves that direction.

use tracing::debug;

use crate::domain::geo::{bearing, signed_angle_diff};
use crate::domain::{Coord, Direction, RouteDirectionSequence, RouteStop, StationCluster, StationId};

/// Which station of a two-member cluster serves each direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionAssignment {
    pub outbound: StationId,
    pub inbound: StationId,
}

impl DirectionAssignment {
    pub fn station_for(&self, direction: Direction) -> &StationId {
        match direction {
            Direction::Outbound => &self.outbound,
            Direction::Inbound => &self.inbound,
        }
    }
}

fn unusable(c: Coord) -> bool {
    c.lat == 0.0 || c.lon == 0.0
}

fn pair_bearing(a: &RouteStop, b: &RouteStop) -> Option<f64> {
    if unusable(a.position) || unusable(b.position) || a.position == b.position {
        return None;
    }
    Some(bearing(a.position, b.position))
}

/// Approximate travel bearing of one direction.
///
/// Uses the stop a third of the way along and the one after it, falling
/// back to the first two stops when that pair is degenerate.
pub fn estimate_route_bearing(stops: &[RouteStop]) -> Option<f64> {
    if stops.len() < 2 {
        return None;
    }

    let start = stops.len() / 3;
    let end = (start + 1).min(stops.len() - 1);
    let (a, b) = if start == end {
        (&stops[0], &stops[stops.len() - 1])
    } else {
        (&stops[start], &stops[end])
    };

    pair_bearing(a, b).or_else(|| pair_bearing(&stops[0], &stops[1]))
}

fn direction_bearing(sequences: &[RouteDirectionSequence], direction: Direction) -> Option<f64> {
    sequences
        .iter()
        .find(|s| s.direction == Some(direction))
        .and_then(|s| estimate_route_bearing(&s.stops))
}

/// Infer the direction to station mapping for a two-member cluster.
///
/// Returns `None` when the cluster does not have exactly two members, when
/// neither direction has a usable bearing, or when the right-hand test puts
/// both stations (or neither) on the right.
pub fn infer_mapping(
    sequences: &[RouteDirectionSequence],
    cluster: &StationCluster,
) -> Option<DirectionAssignment> {
    let [s1, s2] = cluster.members() else {
        return None;
    };

    // Prefer the outbound bearing; an inbound bearing answers the same
    // question with the roles swapped.
    let (reference, direction) = match direction_bearing(sequences, Direction::Outbound) {
        Some(b) => (b, Direction::Outbound),
        None => (direction_bearing(sequences, Direction::Inbound)?, Direction::Inbound),
    };

    if s1.position == s2.position {
        debug!(cluster = %cluster.name(), "co-located stations, no mapping");
        return None;
    }

    let s1_to_s2 = bearing(s1.position, s2.position);
    let s2_to_s1 = (s1_to_s2 + 180.0) % 360.0;

    // S1 is right of travel when it lies clockwise of the bearing as seen
    // from S2, and vice versa.
    let s1_right = signed_angle_diff(s2_to_s1, reference) > 0.0;
    let s2_right = signed_angle_diff(s1_to_s2, reference) > 0.0;

    let (serves, other) = match (s1_right, s2_right) {
        (true, false) => (s1, s2),
        (false, true) => (s2, s1),
        _ => {
            debug!(
                cluster = %cluster.name(),
                reference,
                "ambiguous right-side test, no mapping"
            );
            return None;
        }
    };

    let (outbound, inbound) = match direction {
        Direction::Outbound => (serves.id.clone(), other.id.clone()),
        Direction::Inbound => (other.id.clone(), serves.id.clone()),
    };

    Some(DirectionAssignment { outbound, inbound })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{RouteUid, Station, StopUid};
    use proptest::prelude::*;

    fn pole(id: &str, c: Coord) -> Station {
        Station {
            id: StationId::new(id),
            uid: id.to_string(),
            name: "X".into(),
            position: c,
            stops: vec![],
        }
    }

    fn heading_sequence(direction: Direction, heading_deg: f64) -> RouteDirectionSequence {
        let (dy, dx) = (heading_deg.to_radians().cos(), heading_deg.to_radians().sin());
        let stops = (0..6)
            .map(|i| RouteStop {
                uid: StopUid::new(format!("S{i}")),
                name: String::new(),
                position: Coord::new(25.0 + 0.002 * dy * f64::from(i), 121.5 + 0.002 * dx * f64::from(i)),
            })
            .collect();
        RouteDirectionSequence {
            route_uid: RouteUid::new("R"),
            route_name: "R".into(),
            direction: Some(direction),
            stops,
        }
    }

    proptest! {
        /// A mapping, when found, assigns the two distinct members
        #[test]
        fn mapping_uses_both_members(
            heading in 0.0f64..360.0,
            axis in 0.0f64..360.0,
        ) {
            let (dy, dx) = (axis.to_radians().cos(), axis.to_radians().sin());
            let a = Coord::new(25.0 + 0.0002 * dy, 121.5 + 0.0002 * dx);
            let b = Coord::new(25.0 - 0.0002 * dy, 121.5 - 0.0002 * dx);
            let cluster = StationCluster::new(
                "X".into(),
                vec![pole("A", a), pole("B", b)],
                StationId::new("A"),
            );
            let seqs = vec![heading_sequence(Direction::Outbound, heading)];
            if let Some(m) = infer_mapping(&seqs, &cluster) {
                prop_assert_ne!(&m.outbound, &m.inbound);
                prop_assert!(cluster.contains_station(&m.outbound));
                prop_assert!(cluster.contains_station(&m.inbound));
            }
        }

        /// Swapping member order does not change the answer
        #[test]
        fn member_order_irrelevant(heading in 0.0f64..360.0) {
            let a = pole("A", Coord::new(25.0002, 121.5));
            let b = pole("B", Coord::new(24.9998, 121.5));
            let seqs = vec![heading_sequence(Direction::Outbound, heading)];
            let ab = StationCluster::new("X".into(), vec![a.clone(), b.clone()], StationId::new("A"));
            let ba = StationCluster::new("X".into(), vec![b, a], StationId::new("A"));
            prop_assert_eq!(infer_mapping(&seqs, &ab), infer_mapping(&seqs, &ba));
        }
    }
}
