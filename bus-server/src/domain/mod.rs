//! Domain types for the bus itinerary resolver.
//!
//! Plain data: stations and clusters, routes and their stop sequences, live
//! arrival observations and bus positions, and the itinerary skeleton whose
//! times are resolved against live data.

mod arrival;
mod city;
pub mod geo;
mod ids;
mod itinerary;
mod route;
mod station;
mod vehicle;

pub use arrival::{ArrivalObservation, StopStatus};
pub use city::{CITIES, City};
pub use self::geo::Coord;
pub use ids::{RouteUid, StationId, StopUid};
pub use itinerary::{Itinerary, Leg, LegMode, TransitDetails, VehicleKind, format_hhmm};
pub use route::{Direction, Route, RouteDirectionSequence, RouteStop, prefer_route};
pub use station::{Station, StationCluster, StationStop};
pub use vehicle::BusPosition;
