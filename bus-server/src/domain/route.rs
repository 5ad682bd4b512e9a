//! Routes, travel directions and per-direction stop sequences.

use serde::{Deserialize, Serialize};

use super::geo::Coord;
use super::ids::{RouteUid, StopUid};

/// A bus route as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub uid: RouteUid,
    /// Chinese display name, e.g. `"307"` or `"藍15"`.
    pub name: String,
    pub name_en: Option<String>,
}

/// One of the two canonical travel orientations along a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    /// Map a provider direction code. Anything other than 0 or 1 is unknown.
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Direction::Outbound),
            1 => Some(Direction::Inbound),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Direction::Outbound => 0,
            Direction::Inbound => 1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Outbound => Direction::Inbound,
            Direction::Inbound => Direction::Outbound,
        }
    }
}

impl From<Direction> for u8 {
    fn from(d: Direction) -> u8 {
        d.index()
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Direction::from_index(i64::from(value)).ok_or_else(|| format!("invalid direction {value}"))
    }
}

/// A stop as it appears in one direction's sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub uid: StopUid,
    pub name: String,
    pub position: Coord,
}

/// The ordered stops of a route in one direction.
///
/// Stops are in physical travel order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDirectionSequence {
    pub route_uid: RouteUid,
    pub route_name: String,
    /// `None` when the provider reported a direction other than 0 or 1.
    pub direction: Option<Direction>,
    pub stops: Vec<RouteStop>,
}

impl RouteDirectionSequence {
    /// Index of the first stop whose uid satisfies `pred`.
    pub fn position_of(&self, mut pred: impl FnMut(&StopUid) -> bool) -> Option<usize> {
        self.stops.iter().position(|s| pred(&s.uid))
    }
}

/// Keep the sequences of `route_uid`, or all of them if none match.
///
/// Sequences are looked up by route name, which can also match other routes
/// sharing that name.
pub fn prefer_route(
    sequences: Vec<RouteDirectionSequence>,
    route_uid: &RouteUid,
) -> Vec<RouteDirectionSequence> {
    if sequences.iter().any(|s| &s.route_uid == route_uid) {
        sequences
            .into_iter()
            .filter(|s| &s.route_uid == route_uid)
            .collect()
    } else {
        sequences
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_codes() {
        assert_eq!(Direction::from_index(0), Some(Direction::Outbound));
        assert_eq!(Direction::from_index(1), Some(Direction::Inbound));
        assert_eq!(Direction::from_index(2), None);
        assert_eq!(Direction::from_index(255), None);
        assert_eq!(Direction::Inbound.opposite(), Direction::Outbound);
    }

    #[test]
    fn direction_serializes_as_index() {
        assert_eq!(serde_json::to_string(&Direction::Inbound).unwrap(), "1");
        let d: Direction = serde_json::from_str("0").unwrap();
        assert_eq!(d, Direction::Outbound);
        assert!(serde_json::from_str::<Direction>("2").is_err());
    }

    #[test]
    fn position_of_first_match() {
        let stop = |uid: &str| RouteStop {
            uid: StopUid::new(uid),
            name: uid.to_string(),
            position: Coord::new(25.0, 121.5),
        };
        let seq = RouteDirectionSequence {
            route_uid: RouteUid::new("R1"),
            route_name: "1".into(),
            direction: Some(Direction::Outbound),
            stops: vec![stop("A"), stop("B"), stop("A")],
        };
        assert_eq!(seq.position_of(|u| u.as_str() == "A"), Some(0));
        assert_eq!(seq.position_of(|u| u.as_str() == "B"), Some(1));
        assert_eq!(seq.position_of(|u| u.as_str() == "Z"), None);
    }

    #[test]
    fn prefer_route_filters_only_when_matched() {
        let seq = |uid: &str| RouteDirectionSequence {
            route_uid: RouteUid::new(uid),
            route_name: "1".into(),
            direction: Some(Direction::Outbound),
            stops: vec![],
        };
        let kept = prefer_route(vec![seq("R1"), seq("R2")], &RouteUid::new("R2"));
        assert_eq!(kept, vec![seq("R2")]);

        let all = prefer_route(vec![seq("R1"), seq("R2")], &RouteUid::new("R9"));
        assert_eq!(all.len(), 2);
    }
}
