//! TDX (Transport Data eXchange) bus API client.
//!
//! Key characteristics of TDX:
//! - Every request needs a bearer token from the OAuth2 client-credentials
//!   endpoint; tokens last about a day
//! - Queries are OData: `$filter`, `$top` and `$format` parameters
//! - The free tier is rate limited, so static data should be cached hard
//! - "Station" is a physical pole; "Stop" is a route-specific record at a
//!   station, so one station carries many stop uids

mod client;
mod convert;
mod error;
pub mod types;

pub use client::{TdxClient, TdxConfig};
pub use convert::{
    convert_bus_position, convert_estimate, convert_route, convert_route_estimate, convert_station,
    convert_stop_of_route,
};
pub use error::TdxError;
