//! Bus itinerary resolver server.
//!
//! Resolves a bus itinerary against live Taiwanese bus data: groups the
//! stations around a point, finds every route between two clusters, works
//! out which side of the street serves which direction, ranks live arrivals
//! and re-times the itinerary around the bus the user picks.

pub mod alternatives;
pub mod arrivals;
pub mod cache;
pub mod direction;
pub mod domain;
pub mod grouping;
pub mod route_names;
pub mod source;
pub mod tdx;
pub mod timeline;
pub mod web;
