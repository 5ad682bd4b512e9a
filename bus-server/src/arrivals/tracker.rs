//! Background polling of live arrivals.
//!
//! A [`Tracker`] runs at most one poll loop at a time for one target.
//! Results are published on a `watch` channel; a poll that observes
//! nothing leaves the last published value in place.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::alternatives::CandidateRoute;
use crate::direction::{DirectionMappingCache, DirectionResolver, attribute_arrivals};
use crate::domain::{ArrivalObservation, StationCluster, StationId};
use crate::source::TransitSource;

use super::aggregate::{CandidateArrival, fetch_cluster_arrivals, rank_candidates};
use super::classify::{ArrivalInfo, rank_observations};

/// Configuration for poll loops.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Time between polls.
    pub interval: Duration,

    /// Maximum number of live-arrival requests issued at once.
    pub fan_out: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            fan_out: 8,
        }
    }
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out;
        self
    }
}

/// Something a [`Tracker`] can poll.
pub trait PollTarget: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Short description for logs.
    fn describe(&self) -> String;

    /// One poll. `None` means nothing was observed and the previous result
    /// should stay.
    fn poll(&self) -> impl Future<Output = Option<Self::Output>> + Send;
}

/// Best live arrival for each candidate route at a departure cluster.
pub struct AlternativesTarget<S> {
    source: Arc<S>,
    city: String,
    departure: StationCluster,
    candidates: Vec<CandidateRoute>,
    fan_out: usize,
}

impl<S: TransitSource + 'static> AlternativesTarget<S> {
    pub fn new(
        source: Arc<S>,
        city: impl Into<String>,
        departure: StationCluster,
        candidates: Vec<CandidateRoute>,
        config: &PollConfig,
    ) -> Self {
        Self {
            source,
            city: city.into(),
            departure,
            candidates,
            fan_out: config.fan_out,
        }
    }
}

impl<S: TransitSource + 'static> PollTarget for AlternativesTarget<S> {
    type Output = Vec<CandidateArrival>;

    fn describe(&self) -> String {
        format!("alternatives at {} ({})", self.departure.name(), self.city)
    }

    async fn poll(&self) -> Option<Vec<CandidateArrival>> {
        let observed =
            fetch_cluster_arrivals(&*self.source, &self.city, &self.departure, self.fan_out).await;
        if observed.is_empty() {
            return None;
        }
        let observations: Vec<ArrivalObservation> =
            observed.into_iter().map(|a| a.observation).collect();
        Some(rank_candidates(&self.candidates, &observations, Utc::now()))
    }
}

/// One row of a station board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardEntry {
    pub observation: ArrivalObservation,
    pub arrival: ArrivalInfo,
}

/// Ranked live arrivals at one member of a cluster, after moving
/// observations to the member that serves their direction.
pub struct StationBoardTarget<S> {
    source: Arc<S>,
    mappings: Arc<DirectionMappingCache>,
    city: String,
    cluster: StationCluster,
    station: StationId,
    fan_out: usize,
}

impl<S: TransitSource + 'static> StationBoardTarget<S> {
    pub fn new(
        source: Arc<S>,
        mappings: Arc<DirectionMappingCache>,
        city: impl Into<String>,
        cluster: StationCluster,
        station: StationId,
        config: &PollConfig,
    ) -> Self {
        Self {
            source,
            mappings,
            city: city.into(),
            cluster,
            station,
            fan_out: config.fan_out,
        }
    }
}

impl<S: TransitSource + 'static> PollTarget for StationBoardTarget<S> {
    type Output = Vec<BoardEntry>;

    fn describe(&self) -> String {
        format!("board {} at {} ({})", self.station, self.cluster.name(), self.city)
    }

    async fn poll(&self) -> Option<Vec<BoardEntry>> {
        let observed =
            fetch_cluster_arrivals(&*self.source, &self.city, &self.cluster, self.fan_out).await;
        if observed.is_empty() {
            return None;
        }

        let resolver = DirectionResolver::new(&*self.source, &self.mappings);
        let attributed = attribute_arrivals(&resolver, &self.city, &self.cluster, observed).await;
        let here: Vec<ArrivalObservation> = attributed
            .into_iter()
            .filter(|a| a.station == self.station)
            .map(|a| a.observation)
            .collect();

        Some(
            rank_observations(here, Utc::now())
                .into_iter()
                .map(|(observation, arrival)| BoardEntry {
                    observation,
                    arrival,
                })
                .collect(),
        )
    }
}

/// A published poll result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot<O> {
    pub value: O,
    pub updated_at: DateTime<Utc>,
}

struct Running {
    cancel: CancellationToken,
}

struct TrackerState<T> {
    target: Option<Arc<T>>,
    running: Option<Running>,
}

/// Runs a poll loop for the current target.
pub struct Tracker<T: PollTarget> {
    interval: Duration,
    tx: Arc<watch::Sender<Option<Snapshot<T::Output>>>>,
    last_update: Arc<Mutex<Option<Instant>>>,
    /// Bumped whenever a loop is retired; only a loop spawned in the
    /// current epoch may publish.
    epoch: Arc<AtomicU64>,
    state: Mutex<TrackerState<T>>,
}

fn lock<V>(m: &Mutex<V>) -> MutexGuard<'_, V> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl<T: PollTarget> Tracker<T> {
    pub fn new(config: &PollConfig) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            interval: config.interval,
            tx: Arc::new(tx),
            last_update: Arc::new(Mutex::new(None)),
            epoch: Arc::new(AtomicU64::new(0)),
            state: Mutex::new(TrackerState {
                target: None,
                running: None,
            }),
        }
    }

    /// Replace the target and start polling it now.
    ///
    /// The previous loop is cancelled and its last result cleared.
    pub fn start(&self, target: T) {
        let target = Arc::new(target);
        let mut state = lock(&self.state);
        self.retire(&mut state);
        *lock(&self.last_update) = None;
        self.tx.send_replace(None);

        info!(target = %target.describe(), "tracking started");
        state.running = Some(self.spawn(target.clone(), Duration::ZERO));
        state.target = Some(target);
    }

    /// Stop polling but keep the target and its last result.
    pub fn pause(&self) {
        let mut state = lock(&self.state);
        if self.retire(&mut state) {
            debug!("tracking paused");
        }
    }

    /// Continue polling the current target.
    ///
    /// Polls at once if the last result is older than the interval, else
    /// waits out the rest of it. Returns `false` without a target.
    pub fn resume(&self) -> bool {
        let mut state = lock(&self.state);
        let Some(target) = state.target.clone() else {
            return false;
        };
        if state.running.is_some() {
            return true;
        }

        let delay = match *lock(&self.last_update) {
            Some(at) => self.interval.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        };
        debug!(delay_ms = delay.as_millis() as u64, "tracking resumed");
        state.running = Some(self.spawn(target, delay));
        true
    }

    /// Stop polling and forget the target.
    pub fn stop(&self) {
        let mut state = lock(&self.state);
        self.retire(&mut state);
        if state.target.take().is_some() {
            info!("tracking stopped");
        }
        self.tx.send_replace(None);
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).running.is_some()
    }

    pub fn has_target(&self) -> bool {
        lock(&self.state).target.is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot<T::Output>>> {
        self.tx.subscribe()
    }

    /// The last published result.
    pub fn latest(&self) -> Option<Snapshot<T::Output>> {
        self.tx.borrow().clone()
    }

    /// Cancel the running loop, if any, and move to a new epoch so a poll
    /// it already has in flight is never published.
    fn retire(&self, state: &mut TrackerState<T>) -> bool {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        match state.running.take() {
            Some(running) => {
                running.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn spawn(&self, target: Arc<T>, initial_delay: Duration) -> Running {
        let cancel = CancellationToken::new();
        let publisher = Publisher {
            tx: self.tx.clone(),
            last_update: self.last_update.clone(),
            epoch: self.epoch.clone(),
            spawned_in: self.epoch.load(Ordering::SeqCst),
        };
        tokio::spawn(run(target, self.interval, initial_delay, cancel.clone(), publisher));
        Running { cancel }
    }
}

impl<T: PollTarget> Drop for Tracker<T> {
    fn drop(&mut self) {
        if let Some(running) = lock(&self.state).running.take() {
            running.cancel.cancel();
        }
    }
}

/// A loop's handle on the tracker's published state.
struct Publisher<O> {
    tx: Arc<watch::Sender<Option<Snapshot<O>>>>,
    last_update: Arc<Mutex<Option<Instant>>>,
    epoch: Arc<AtomicU64>,
    spawned_in: u64,
}

impl<O> Publisher<O> {
    /// Publish `value` unless the loop has been retired since it was spawned.
    ///
    /// The epoch is checked under the channel's lock, which `start` and
    /// `stop` also take to clear the value after bumping the epoch.
    fn publish(&self, value: O) -> bool {
        self.tx.send_if_modified(|slot| {
            if self.epoch.load(Ordering::SeqCst) != self.spawned_in {
                return false;
            }
            *lock(&self.last_update) = Some(Instant::now());
            *slot = Some(Snapshot {
                value,
                updated_at: Utc::now(),
            });
            true
        })
    }
}

async fn run<T: PollTarget>(
    target: Arc<T>,
    interval: Duration,
    initial_delay: Duration,
    cancel: CancellationToken,
    publisher: Publisher<T::Output>,
) {
    let label = target.describe();
    debug!(target = %label, "poll loop running");
    let mut delay = initial_delay;

    loop {
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            break;
        }

        let result = target.poll().await;
        if cancel.is_cancelled() {
            break;
        }

        match result {
            Some(value) => {
                if !publisher.publish(value) {
                    break;
                }
            }
            None => debug!(target = %label, "poll observed nothing, keeping last result"),
        }
        delay = interval;
    }

    debug!(target = %label, "poll loop exited");
}
