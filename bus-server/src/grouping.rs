//! Grouping physical stations into named clusters.
//!
//! The provider models each pole separately, so the two sides of a street
//! are two stations with the same display name. A cluster collects the
//! same-named stations within a threshold of a seed station. Membership is
//! measured from the seed only, so two members can be up to twice the
//! threshold apart; direction inference relies on exactly this grouping.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::geo::distance;
use crate::domain::{Coord, Station, StationCluster};

/// Default clustering threshold in metres.
pub const DEFAULT_THRESHOLD_M: f64 = 150.0;

/// A target further than this multiple of the threshold from every station
/// is not near any station.
const NEAREST_CUTOFF_FACTOR: f64 = 1.5;

/// Label for stations the provider sent without a name.
const UNNAMED_STATION: &str = "未知站牌";

/// Configuration for station grouping.
#[derive(Debug, Clone)]
pub struct GroupingConfig {
    /// Maximum distance from the seed station for cluster membership.
    pub threshold_m: f64,

    /// Radius for browsing nearby stations.
    pub nearby_radius_m: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            threshold_m: DEFAULT_THRESHOLD_M,
            nearby_radius_m: 500.0,
        }
    }
}

impl GroupingConfig {
    pub fn with_threshold(mut self, metres: f64) -> Self {
        self.threshold_m = metres;
        self
    }

    pub fn with_nearby_radius(mut self, metres: f64) -> Self {
        self.nearby_radius_m = metres;
        self
    }
}

fn nearest<'a>(
    target: Coord,
    stations: impl IntoIterator<Item = &'a Station>,
) -> Option<(&'a Station, f64)> {
    stations
        .into_iter()
        .map(|s| (s, distance(target, s.position)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Group stations by display name.
///
/// Within each name, the member nearest `reference` is the seed, and only
/// stations within `threshold_m` of the seed are kept. Clusters are ordered
/// by the seed's distance from `reference`.
pub fn group_by_name(stations: &[Station], reference: Coord, threshold_m: f64) -> Vec<StationCluster> {
    let mut by_name: HashMap<&str, Vec<&Station>> = HashMap::new();
    for station in stations.iter().filter(|s| !s.position.is_unset()) {
        let name = match station.name.trim() {
            "" => UNNAMED_STATION,
            _ => station.name.as_str(),
        };
        by_name.entry(name).or_default().push(station);
    }

    let mut clusters: Vec<(f64, StationCluster)> = by_name
        .into_iter()
        .filter_map(|(name, group)| {
            let (seed, seed_distance) = nearest(reference, group.iter().copied())?;
            let members: Vec<Station> = group
                .iter()
                .filter(|s| distance(s.position, seed.position) <= threshold_m)
                .map(|s| (*s).clone())
                .collect();
            let closest = nearest(reference, members.iter())
                .map(|(s, _)| s.id.clone())
                .unwrap_or_else(|| seed.id.clone());
            Some((
                seed_distance,
                StationCluster::new(name.to_string(), members, closest),
            ))
        })
        .collect();

    clusters.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.name().cmp(b.1.name())));
    clusters.into_iter().map(|(_, c)| c).collect()
}

/// Resolve the cluster a coordinate refers to.
///
/// Stations at `(0, 0)` or without a name are ignored. Returns `None` when
/// the nearest station is more than 1.5 × `threshold_m` away.
pub fn find_nearest_cluster(
    target: Coord,
    stations: &[Station],
    threshold_m: f64,
) -> Option<StationCluster> {
    let candidates: Vec<&Station> = stations.iter().filter(|s| s.is_groupable()).collect();
    let (seed, seed_distance) = nearest(target, candidates.iter().copied())?;

    if seed_distance > threshold_m * NEAREST_CUTOFF_FACTOR {
        warn!(
            station = %seed.id,
            name = %seed.name,
            distance_m = seed_distance,
            "nearest station too far, no cluster"
        );
        return None;
    }

    let members: Vec<Station> = candidates
        .iter()
        .filter(|s| s.name == seed.name && distance(s.position, seed.position) <= threshold_m)
        .map(|s| (*s).clone())
        .collect();

    let closest = nearest(target, members.iter())
        .map(|(s, _)| s.id.clone())
        .unwrap_or_else(|| seed.id.clone());

    debug!(
        name = %seed.name,
        members = members.len(),
        closest = %closest,
        "resolved station cluster"
    );

    Some(StationCluster::new(seed.name.clone(), members, closest))
}

/// Stations within `radius_m` of `center`, nearest first.
pub fn stations_within(stations: &[Station], center: Coord, radius_m: f64) -> Vec<&Station> {
    let mut within: Vec<(&Station, f64)> = stations
        .iter()
        .map(|s| (s, distance(center, s.position)))
        .filter(|(_, d)| *d <= radius_m)
        .collect();
    within.sort_by(|a, b| a.1.total_cmp(&b.1));
    within.into_iter().map(|(s, _)| s).collect()
}

/// Clusters of the stations near `center`, nearest first.
///
/// Everything within the browse radius is already close together, so
/// stations are grouped by name alone.
pub fn nearby_clusters(
    stations: &[Station],
    center: Coord,
    config: &GroupingConfig,
) -> Vec<StationCluster> {
    let within: Vec<Station> = stations_within(stations, center, config.nearby_radius_m)
        .into_iter()
        .cloned()
        .collect();
    group_by_name(&within, center, f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StationId;

    fn station(id: &str, name: &str, lat: f64, lon: f64) -> Station {
        Station {
            id: StationId::new(id),
            uid: format!("TPE{id}"),
            name: name.to_string(),
            position: Coord::new(lat, lon),
            stops: vec![],
        }
    }

    /// 0.001° of longitude at 25°N is roughly 100 m; 0.01° is roughly 1 km.
    fn central_stations() -> Vec<Station> {
        vec![
            station("1", "Central Station", 25.0, 121.5),
            station("2", "Central Station", 25.0, 121.501),
            station("3", "Central Station", 25.0, 121.51),
        ]
    }

    #[test]
    fn groups_nearby_same_name_and_excludes_far() {
        let stations = central_stations();
        let cluster = find_nearest_cluster(Coord::new(25.0, 121.5), &stations, 150.0).unwrap();

        assert_eq!(cluster.name(), "Central Station");
        assert_eq!(
            cluster.station_ids(),
            vec![StationId::new("1"), StationId::new("2")]
        );
        assert_eq!(cluster.closest(), &StationId::new("1"));
    }

    #[test]
    fn closest_member_tracks_target() {
        let stations = central_stations();
        let cluster = find_nearest_cluster(Coord::new(25.0, 121.5009), &stations, 150.0).unwrap();
        assert_eq!(cluster.closest(), &StationId::new("2"));
        assert_eq!(cluster.len(), 2);
    }

    #[test]
    fn too_far_returns_none() {
        let stations = central_stations();
        // ~2 km north of everything
        assert!(find_nearest_cluster(Coord::new(25.02, 121.5), &stations, 150.0).is_none());
    }

    #[test]
    fn empty_input_returns_none() {
        assert!(find_nearest_cluster(Coord::new(25.0, 121.5), &[], 150.0).is_none());
    }

    #[test]
    fn ignores_unset_positions_and_blank_names() {
        let stations = vec![
            station("0", "Ghost", 0.0, 0.0),
            station("1", "  ", 25.0, 121.5),
            station("2", "Real", 25.0, 121.5005),
        ];
        let cluster = find_nearest_cluster(Coord::new(25.0, 121.5), &stations, 150.0).unwrap();
        assert_eq!(cluster.name(), "Real");
        assert_eq!(cluster.station_ids(), vec![StationId::new("2")]);
    }

    #[test]
    fn different_names_are_not_merged() {
        let stations = vec![
            station("1", "公館", 25.0, 121.5),
            station("2", "公館(羅斯福路)", 25.0, 121.5003),
        ];
        let cluster = find_nearest_cluster(Coord::new(25.0, 121.5), &stations, 150.0).unwrap();
        assert_eq!(cluster.len(), 1);
    }

    #[test]
    fn membership_is_chained_from_seed() {
        // Members on either side of the seed, ~140 m each way, ~280 m apart.
        let stations = vec![
            station("w", "Loop", 25.0, 121.4986),
            station("c", "Loop", 25.0, 121.5),
            station("e", "Loop", 25.0, 121.5014),
        ];
        let cluster = find_nearest_cluster(Coord::new(25.0, 121.5), &stations, 150.0).unwrap();
        assert_eq!(cluster.len(), 3);

        let w = &cluster.members()[0];
        let e = &cluster.members()[2];
        assert!(distance(w.position, e.position) > 150.0);
    }

    #[test]
    fn group_by_name_filters_from_seed() {
        let mut stations = central_stations();
        stations.push(station("4", "Market", 25.0, 121.5002));
        let clusters = group_by_name(&stations, Coord::new(25.0, 121.5), 150.0);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].name(), "Central Station");
        assert_eq!(clusters[0].len(), 2);
        assert_eq!(clusters[1].name(), "Market");
    }

    #[test]
    fn nearby_clusters_sorted_by_distance() {
        let stations = vec![
            station("1", "Far", 25.0, 121.504),
            station("2", "Near", 25.0, 121.5001),
            station("3", "Near", 25.0, 121.5003),
            station("4", "Outside", 25.0, 121.52),
        ];
        let clusters = nearby_clusters(&stations, Coord::new(25.0, 121.5), &GroupingConfig::default());
        let names: Vec<_> = clusters.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Near", "Far"]);
        assert_eq!(clusters[0].closest(), &StationId::new("2"));
    }

    #[test]
    fn stations_within_radius_sorted() {
        let stations = central_stations();
        let within = stations_within(&stations, Coord::new(25.0, 121.501), 200.0);
        let ids: Vec<_> = within.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }
}
