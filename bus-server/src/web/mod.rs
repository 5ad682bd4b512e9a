//! Web layer for the bus itinerary resolver.
//!
//! JSON endpoints for nearby stations, alternative routes, route listing
//! and line-name matching, itinerary re-timing, and live tracking of
//! alternatives, station boards and single routes.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, LiveSource};
