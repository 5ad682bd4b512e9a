use std::net::SocketAddr;
use std::time::Duration;

use chrono::FixedOffset;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bus_server::arrivals::PollConfig;
use bus_server::cache::CacheConfig;
use bus_server::direction::{DirectionMappingCache, MappingCacheConfig};
use bus_server::source::CachedTransitSource;
use bus_server::tdx::{TdxClient, TdxConfig};
use bus_server::web::{AppState, create_router};

/// How often to refresh station lists of preloaded cities (24 hours).
const STATION_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bus_server=info,tower_http=info")),
        )
        .init();

    // Credentials from environment
    let client_id = std::env::var("TDX_CLIENT_ID").unwrap_or_else(|_| {
        warn!("TDX_CLIENT_ID not set. API calls will fail.");
        String::new()
    });
    let client_secret = std::env::var("TDX_CLIENT_SECRET").unwrap_or_else(|_| {
        warn!("TDX_CLIENT_SECRET not set. API calls will fail.");
        String::new()
    });

    let mut tdx_config = TdxConfig::new(client_id, client_secret);
    if let Ok(url) = std::env::var("TDX_BASE_URL") {
        tdx_config = tdx_config.with_base_url(url);
    }
    let client = TdxClient::new(tdx_config)?;

    let cache_dir = env_or("BUS_CACHE_DIR", "tdx_cache");
    let source = CachedTransitSource::new(client, &CacheConfig::default().with_dir(&cache_dir));

    let mapping_config =
        MappingCacheConfig::new(std::path::Path::new(&cache_dir).join("direction_mapping_cache.json"));
    let mappings = DirectionMappingCache::load(&mapping_config).await;

    let offset_hours: i32 = env_or("BUS_UTC_OFFSET_HOURS", "8").parse()?;
    let utc_offset =
        FixedOffset::east_opt(offset_hours * 3600).ok_or("BUS_UTC_OFFSET_HOURS out of range")?;

    let state = AppState::new(source, mappings, PollConfig::default(), utc_offset);

    // Refresh station lists of preloaded cities daily
    let preload: Vec<String> = env_or("BUS_PRELOAD_CITIES", "")
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if !preload.is_empty() {
        let refresh_source = state.source.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STATION_REFRESH_INTERVAL);
            loop {
                interval.tick().await;
                for city in &preload {
                    match refresh_source.stations_with(city, true).await {
                        Ok(stations) => info!(city = %city, count = stations.len(), "refreshed stations"),
                        Err(e) => warn!(city = %city, error = %e, "failed to refresh stations"),
                    }
                }
            }
        });
    }

    let mappings = state.mappings.clone();
    let app = create_router(state);

    let addr: SocketAddr = env_or("BUS_BIND_ADDR", "127.0.0.1:3000").parse()?;
    info!(%addr, "bus itinerary server listening");
    info!("API endpoints:");
    info!("  GET  /health");
    info!("  GET  /cities");
    info!("  GET  /cities/:city/nearby?lat=&lon=");
    info!("  GET  /cities/:city/alternatives?from_lat=&from_lon=&to_lat=&to_lon=");
    info!("  GET  /cities/:city/routes?q=&refresh=");
    info!("  GET  /cities/:city/routes/match?line=");
    info!("  POST /itinerary/retime");
    info!("  POST /tracking/alternatives, /tracking/board, /tracking/route");
    info!("  POST /tracking/pause, /tracking/resume");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    if let Err(e) = mappings.save().await {
        warn!(error = %e, "failed to save direction mappings");
    }
    info!("shut down");
    Ok(())
}
