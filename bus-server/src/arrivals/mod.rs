//! Live arrival classification and polling.
//!
//! Observations are classified into [`ArrivalInfo`], ranked
//! COMING < SCHEDULED < NO_DATA and then by sort key, and the best one per
//! candidate route is kept. A [`Tracker`] repeats this on an interval for
//! one target at a time; [`RouteTarget`] does the same for every stop of a
//! single route.

mod aggregate;
mod classify;
mod route_live;
mod tracker;

pub use aggregate::{CandidateArrival, best_arrivals, fetch_cluster_arrivals, rank_candidates};
pub use classify::{
    ArrivalInfo, ArrivalStatus, LAST_BUS_SORT_KEY, NO_DATA_SORT_KEY, classify, rank_observations,
};
pub use route_live::{
    DirectionBoard, RouteLiveView, RouteTarget, StopArrival, build_route_view, destination_label,
};
pub use tracker::{
    AlternativesTarget, BoardEntry, PollConfig, PollTarget, Snapshot, StationBoardTarget, Tracker,
};
