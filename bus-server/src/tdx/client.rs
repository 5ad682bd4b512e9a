//! TDX HTTP client.
//!
//! Provides async methods for querying the TDX bus API.
//! Handles OAuth2 client-credentials tokens, concurrency limiting, status
//! mapping and conversion to domain types.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::{
    ArrivalObservation, BusPosition, Route, RouteDirectionSequence, Station, StationId,
};
use crate::source::TransitSource;

use super::convert::{
    convert_bus_position, convert_estimate, convert_route, convert_route_estimate, convert_station,
    convert_stop_of_route,
};
use super::error::TdxError;
use super::types::{
    BusA1Data, BusRoute, BusStation, StationBusEstimateTime, StopOfRoute, TokenResponse,
};

/// Default base URL for the TDX API.
const DEFAULT_BASE_URL: &str = "https://tdx.transportdata.tw";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Tokens are refreshed this long before the provider says they expire.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(300);

/// Configuration for the TDX client.
#[derive(Debug, Clone)]
pub struct TdxConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Base URL for the API (defaults to production TDX)
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl TdxConfig {
    /// Create a new config with the given client credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

/// TDX bus API client.
///
/// Uses a semaphore to limit concurrent requests and avoid rate limiting.
/// Cloning is cheap and clones share the token and the semaphore.
#[derive(Debug, Clone)]
pub struct TdxClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    semaphore: Arc<Semaphore>,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl TdxClient {
    /// Create a new TDX client with the given configuration.
    pub fn new(config: TdxConfig) -> Result<Self, TdxError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id,
            client_secret: config.client_secret,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            token: Arc::new(Mutex::new(None)),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Return a valid bearer token, fetching a new one when needed.
    async fn access_token(&self) -> Result<String, TdxError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let url = self.endpoint("auth/realms/TDXConnect/protocol/openid-connect/token");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TdxError::Token(format!("status {}: {}", status.as_u16(), body)));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| TdxError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })?;

        let lifetime = Duration::from_secs(parsed.expires_in).saturating_sub(TOKEN_EXPIRY_BUFFER);
        info!(expires_in = parsed.expires_in, "obtained TDX access token");
        *guard = Some(AccessToken {
            value: parsed.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(parsed.access_token)
    }

    /// GET a JSON list from `path`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TdxError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| TdxError::Api {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let token = self.access_token().await?;
        let url = self.endpoint(path);
        debug!(url = %url, "TDX request");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Force a fresh token on the next request.
            *self.token.lock().await = None;
            return Err(TdxError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TdxError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TdxError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| TdxError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })
    }
}

/// Quote a string literal for an OData `$filter`.
fn odata_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn format_json() -> (&'static str, String) {
    ("$format", "JSON".to_string())
}

fn route_name_filter(route_name: &str) -> (&'static str, String) {
    (
        "$filter",
        format!("RouteName/Zh_tw eq {}", odata_literal(route_name)),
    )
}

impl TransitSource for TdxClient {
    async fn routes(&self, city: &str) -> Result<Vec<Route>, TdxError> {
        let rows: Vec<BusRoute> = self
            .get_json(
                &format!("api/basic/v2/Bus/Route/City/{city}"),
                &[
                    ("$filter", "RouteName/Zh_tw ne null".to_string()),
                    ("$top", "10000".to_string()),
                    format_json(),
                ],
            )
            .await?;
        Ok(rows.iter().map(convert_route).collect())
    }

    async fn stop_sequences(
        &self,
        city: &str,
        route_name: &str,
    ) -> Result<Vec<RouteDirectionSequence>, TdxError> {
        let rows: Vec<StopOfRoute> = self
            .get_json(
                &format!("api/basic/v2/Bus/StopOfRoute/City/{city}"),
                &[route_name_filter(route_name), format_json()],
            )
            .await?;
        Ok(rows.iter().map(convert_stop_of_route).collect())
    }

    async fn routes_through_station(
        &self,
        city: &str,
        station: &StationId,
    ) -> Result<Vec<Route>, TdxError> {
        let rows: Vec<BusRoute> = self
            .get_json(
                &format!("api/advanced/v2/Bus/Route/City/{city}/PassThrough/Station/{station}"),
                &[format_json()],
            )
            .await?;
        Ok(rows.iter().map(convert_route).collect())
    }

    async fn live_arrivals(
        &self,
        city: &str,
        station: &StationId,
    ) -> Result<Vec<ArrivalObservation>, TdxError> {
        let rows: Vec<StationBusEstimateTime> = self
            .get_json(
                &format!(
                    "api/advanced/v2/Bus/EstimatedTimeOfArrival/City/{city}/PassThrough/Station/{station}"
                ),
                &[("$top", "500".to_string()), format_json()],
            )
            .await?;
        Ok(rows.iter().map(|r| convert_estimate(r, station)).collect())
    }

    async fn route_arrivals(
        &self,
        city: &str,
        route_name: &str,
    ) -> Result<Vec<ArrivalObservation>, TdxError> {
        let rows: Vec<StationBusEstimateTime> = self
            .get_json(
                &format!("api/basic/v2/Bus/EstimatedTimeOfArrival/City/{city}/{route_name}"),
                // The path segment also matches longer names sharing the prefix.
                &[route_name_filter(route_name), format_json()],
            )
            .await?;
        Ok(rows.iter().map(convert_route_estimate).collect())
    }

    async fn bus_positions(&self, city: &str, route_name: &str) -> Result<Vec<BusPosition>, TdxError> {
        let rows: Vec<BusA1Data> = self
            .get_json(
                &format!("api/basic/v2/Bus/RealTimeByFrequency/City/{city}"),
                &[route_name_filter(route_name), format_json()],
            )
            .await?;
        let buses: Vec<BusPosition> = rows.iter().filter_map(convert_bus_position).collect();
        if buses.len() < rows.len() {
            debug!(
                route = route_name,
                dropped = rows.len() - buses.len(),
                "bus positions without a route uid"
            );
        }
        Ok(buses)
    }

    async fn stations(&self, city: &str) -> Result<Vec<Station>, TdxError> {
        let rows: Vec<BusStation> = self
            .get_json(
                &format!("api/basic/v2/Bus/Station/City/{city}"),
                &[("$top", "10000".to_string()), format_json()],
            )
            .await?;
        Ok(rows.iter().map(convert_station).collect())
    }
}
