//! Physical stations and clusters of same-named stations.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::geo::Coord;
use super::ids::{RouteUid, StationId, StopUid};

/// A route-specific stop record served at a physical station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStop {
    pub stop_uid: StopUid,
    pub route_uid: RouteUid,
    pub route_name: String,
}

/// A physical station: one pole on one side of the street.
///
/// Two stations on opposite sides of a road usually share a display name;
/// grouping them is the job of [`crate::grouping`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub uid: String,
    pub name: String,
    pub position: Coord,
    pub stops: Vec<StationStop>,
}

impl Station {
    /// Whether this station can take part in grouping at all.
    pub fn is_groupable(&self) -> bool {
        !self.position.is_unset() && !self.name.trim().is_empty()
    }

    /// Whether `stop_uid` names this station, by uid or id.
    pub fn is_named_by(&self, stop_uid: &StopUid) -> bool {
        self.uid == stop_uid.as_str() || self.id.as_str() == stop_uid.as_str()
    }
}

/// Same-named stations within the clustering radius of a seed station.
///
/// Membership is chained from the seed: every member is within the radius of
/// the seed, but two members may be further apart than that from each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationCluster {
    name: String,
    members: Vec<Station>,
    closest: StationId,
}

impl StationCluster {
    pub(crate) fn new(name: String, members: Vec<Station>, closest: StationId) -> Self {
        Self {
            name,
            members,
            closest,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Station] {
        &self.members
    }

    /// Id of the member nearest to the point the cluster was resolved for.
    pub fn closest(&self) -> &StationId {
        &self.closest
    }

    pub fn closest_member(&self) -> Option<&Station> {
        self.members.iter().find(|s| s.id == self.closest)
    }

    /// Distinct member station ids, in member order.
    pub fn station_ids(&self) -> Vec<StationId> {
        let mut seen = HashSet::new();
        self.members
            .iter()
            .filter(|s| seen.insert(s.id.clone()))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn contains_station(&self, id: &StationId) -> bool {
        self.members.iter().any(|s| &s.id == id)
    }

    /// Union of the stop uids served by all members.
    pub fn stop_uids(&self) -> HashSet<StopUid> {
        self.members
            .iter()
            .flat_map(|s| s.stops.iter().map(|stop| stop.stop_uid.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str, stops: &[&str]) -> Station {
        Station {
            id: StationId::new(id),
            uid: format!("TPE{id}"),
            name: "公館".to_string(),
            position: Coord::new(25.01, 121.53),
            stops: stops
                .iter()
                .map(|s| StationStop {
                    stop_uid: StopUid::new(*s),
                    route_uid: RouteUid::new("TPE1"),
                    route_name: "1".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn groupable_requires_position_and_name() {
        let mut s = station("1", &[]);
        assert!(s.is_groupable());

        s.name = "  ".to_string();
        assert!(!s.is_groupable());

        let mut s = station("1", &[]);
        s.position = Coord::new(0.0, 0.0);
        assert!(!s.is_groupable());
    }

    #[test]
    fn cluster_accessors() {
        let a = station("1", &["S1", "S2"]);
        let b = station("2", &["S3"]);
        let dup = station("1", &["S2"]);
        let cluster =
            StationCluster::new("公館".into(), vec![a, b, dup], StationId::new("2"));

        assert_eq!(cluster.len(), 3);
        assert_eq!(
            cluster.station_ids(),
            vec![StationId::new("1"), StationId::new("2")]
        );
        assert_eq!(cluster.stop_uids().len(), 3);
        assert_eq!(cluster.closest_member().unwrap().id, StationId::new("2"));
        assert!(cluster.contains_station(&StationId::new("1")));
        assert!(!cluster.contains_station(&StationId::new("9")));
    }

    #[test]
    fn named_by_uid_or_id() {
        let s = station("42", &[]);
        assert!(s.is_named_by(&StopUid::new("TPE42")));
        assert!(s.is_named_by(&StopUid::new("42")));
        assert!(!s.is_named_by(&StopUid::new("43")));
    }
}
