//! Persisted direction to station mappings.
//!
//! Bearing inference needs stop sequences, so its results are kept per
//! route in a small JSON file. A mapping is dropped once it is older than
//! the retention window, or as soon as it names a station outside the
//! cluster it is being used for.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{Direction, RouteUid, StationCluster, StationId};

use super::bearing::DirectionAssignment;

/// Default retention: 7 days.
const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Errors reading or writing the mapping file.
#[derive(Debug, thiserror::Error)]
pub enum MappingCacheError {
    #[error("mapping cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mapping cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for the mapping cache.
#[derive(Debug, Clone)]
pub struct MappingCacheConfig {
    /// JSON file path. `None` keeps mappings in memory only.
    pub path: Option<PathBuf>,
    /// How long an inferred mapping stays usable.
    pub retention: Duration,
}

impl Default for MappingCacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            retention: DEFAULT_RETENTION,
        }
    }
}

impl MappingCacheConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

/// Which station serves each direction of one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionStationMapping {
    pub route_uid: RouteUid,
    pub outbound: Option<StationId>,
    pub inbound: Option<StationId>,
    pub inferred_at: DateTime<Utc>,
}

impl DirectionStationMapping {
    pub fn from_assignment(
        route_uid: RouteUid,
        assignment: &DirectionAssignment,
        inferred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            route_uid,
            outbound: Some(assignment.outbound.clone()),
            inbound: Some(assignment.inbound.clone()),
            inferred_at,
        }
    }

    pub fn station_for(&self, direction: Direction) -> Option<&StationId> {
        match direction {
            Direction::Outbound => self.outbound.as_ref(),
            Direction::Inbound => self.inbound.as_ref(),
        }
    }

    /// Whether every mapped station is a member of `cluster`.
    pub fn fits(&self, cluster: &StationCluster) -> bool {
        [&self.outbound, &self.inbound]
            .into_iter()
            .flatten()
            .all(|id| cluster.contains_station(id))
    }
}

/// Mapping cache shared by every resolver.
pub struct DirectionMappingCache {
    path: Option<PathBuf>,
    retention: Duration,
    entries: RwLock<HashMap<RouteUid, DirectionStationMapping>>,
}

impl DirectionMappingCache {
    /// Empty cache; nothing is read from disk.
    pub fn new(config: &MappingCacheConfig) -> Self {
        Self {
            path: config.path.clone(),
            retention: config.retention,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Load mappings from the configured file.
    ///
    /// A missing or unreadable file yields an empty cache.
    pub async fn load(config: &MappingCacheConfig) -> Self {
        let cache = Self::new(config);
        let Some(path) = &cache.path else {
            return cache;
        };

        match tokio::fs::read_to_string(path).await {
            Ok(contents) => match serde_json::from_str::<Vec<DirectionStationMapping>>(&contents) {
                Ok(mappings) => {
                    let now = Utc::now();
                    let mut entries = cache.entries.write().await;
                    for mapping in mappings {
                        if cache.is_live(&mapping, now) {
                            entries.insert(mapping.route_uid.clone(), mapping);
                        }
                    }
                    info!(count = entries.len(), "loaded direction mappings");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring corrupt mapping file"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to read mapping file"),
        }

        cache
    }

    fn is_live(&self, mapping: &DirectionStationMapping, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(mapping.inferred_at);
        age.to_std().map(|age| age < self.retention).unwrap_or(true)
    }

    /// Mapping for `route_uid` usable with `cluster`.
    ///
    /// Expired mappings and mappings pointing outside `cluster` are removed.
    pub async fn lookup(
        &self,
        route_uid: &RouteUid,
        cluster: &StationCluster,
    ) -> Option<DirectionStationMapping> {
        {
            let entries = self.entries.read().await;
            let mapping = entries.get(route_uid)?;
            if self.is_live(mapping, Utc::now()) && mapping.fits(cluster) {
                return Some(mapping.clone());
            }
        }

        let mut entries = self.entries.write().await;
        // Another task may have stored a fresh mapping while no lock was held.
        let Some(mapping) = self.remove_unusable(&mut entries, route_uid, cluster, Utc::now()) else {
            return entries.get(route_uid).cloned();
        };
        if mapping.fits(cluster) {
            debug!(route = %route_uid, "direction mapping expired");
        } else {
            warn!(
                route = %route_uid,
                cluster = %cluster.name(),
                "direction mapping points outside cluster, invalidating"
            );
        }
        drop(entries);
        self.persist().await;
        None
    }

    /// Removes the entry for `route_uid` only if it is stale or does not fit
    /// `cluster`, returning what was removed.
    fn remove_unusable(
        &self,
        entries: &mut HashMap<RouteUid, DirectionStationMapping>,
        route_uid: &RouteUid,
        cluster: &StationCluster,
        now: DateTime<Utc>,
    ) -> Option<DirectionStationMapping> {
        let current = entries.get(route_uid)?;
        if self.is_live(current, now) && current.fits(cluster) {
            return None;
        }
        entries.remove(route_uid)
    }

    pub async fn insert(&self, mapping: DirectionStationMapping) {
        self.entries
            .write()
            .await
            .insert(mapping.route_uid.clone(), mapping);
        self.persist().await;
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Write all mappings to the configured file.
    pub async fn save(&self) -> Result<(), MappingCacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut mappings: Vec<DirectionStationMapping> =
            self.entries.read().await.values().cloned().collect();
        mappings.sort_by(|a, b| a.route_uid.cmp(&b.route_uid));

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&mappings)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    async fn persist(&self) {
        if let Err(e) = self.save().await {
            warn!(error = %e, "failed to save direction mappings");
        }
    }
}
