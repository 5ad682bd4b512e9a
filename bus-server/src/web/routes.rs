//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::alternatives::AlternativeRouteFinder;
use crate::arrivals::{
    AlternativesTarget, BoardEntry, CandidateArrival, PollTarget, RouteLiveView, RouteTarget,
    StationBoardTarget, Tracker, build_route_view,
};
use crate::domain::{City, Coord, Station};
use crate::grouping::{find_nearest_cluster, nearby_clusters};
use crate::route_names::search_routes;
use crate::source::TransitSource;
use crate::timeline::{ItineraryError, apply_selected_arrival};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router<S: TransitSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cities", get(list_cities))
        .route("/cities/:city/nearby", get(nearby::<S>))
        .route("/cities/:city/alternatives", get(alternatives::<S>))
        .route("/cities/:city/routes", get(list_routes::<S>))
        .route("/cities/:city/routes/match", get(match_route::<S>))
        .route("/itinerary/retime", post(retime::<S>))
        .route(
            "/tracking/alternatives",
            post(track_alternatives::<S>).get(tracked_alternatives::<S>),
        )
        .route(
            "/tracking/board",
            post(track_board::<S>).get(tracked_board::<S>),
        )
        .route("/tracking/route", post(track_route::<S>).get(tracked_route::<S>))
        .route("/tracking/pause", post(pause_tracking::<S>))
        .route("/tracking/resume", post(resume_tracking::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// List supported cities.
async fn list_cities() -> Json<CitiesResponse> {
    Json(CitiesResponse {
        cities: City::all().to_vec(),
    })
}

/// Resolve a city from its provider name or its local name.
fn resolve_city(name: &str) -> Result<City, AppError> {
    City::find_by_tdx_name(name)
        .or_else(|| City::find_by_local_name(name))
        .ok_or_else(|| AppError::BadRequest {
            message: format!("Unknown city: {name}"),
        })
}

async fn load_stations<S: TransitSource + 'static>(
    state: &AppState<S>,
    city: &City,
) -> Result<Vec<Station>, AppError> {
    state.source.stations(city.tdx_name).await.map_err(|e| {
        warn!(city = city.tdx_name, error = %e, "failed to load stations");
        AppError::Internal {
            message: format!("Station data unavailable for {}", city.name),
        }
    })
}

fn routes_unavailable(city: &City, e: impl std::fmt::Display) -> AppError {
    warn!(city = city.tdx_name, error = %e, "failed to load routes");
    AppError::Internal {
        message: format!("Route data unavailable for {}", city.name),
    }
}

/// Station clusters near a point.
async fn nearby<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
    Path(city): Path<String>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<NearbyResponse>, AppError> {
    let city = resolve_city(&city)?;
    let stations = load_stations(&state, &city).await?;

    let mut config = (*state.grouping).clone();
    if let Some(radius) = query.radius_m {
        config = config.with_nearby_radius(radius.clamp(0.0, 5_000.0));
    }

    let center = Coord::new(query.lat, query.lon);
    let clusters = nearby_clusters(&stations, center, &config)
        .iter()
        .map(|c| ClusterResult::from_cluster(c, center))
        .collect();

    Ok(Json(NearbyResponse { clusters }))
}

/// Candidate routes between two points.
async fn alternatives<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
    Path(city): Path<String>,
    Query(query): Query<AlternativesQuery>,
) -> Result<Json<AlternativesResponse>, AppError> {
    let city = resolve_city(&city)?;
    let finder = AlternativeRouteFinder::new(&*state.source, &state.finder);
    let candidates = finder.find(city.tdx_name, query.from(), query.to()).await;
    Ok(Json(AlternativesResponse { candidates }))
}

/// A city's routes, optionally narrowed by search text, in listing order.
async fn list_routes<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
    Path(city): Path<String>,
    Query(query): Query<RouteListQuery>,
) -> Result<Json<RouteListResponse>, AppError> {
    let city = resolve_city(&city)?;
    let routes = state
        .source
        .routes_with(city.tdx_name, query.refresh)
        .await
        .map_err(|e| routes_unavailable(&city, e))?;

    let routes = search_routes(routes, query.q.as_deref().unwrap_or_default());
    Ok(Json(RouteListResponse { routes }))
}

/// Provider route for a third-party line name.
async fn match_route<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
    Path(city): Path<String>,
    Query(query): Query<RouteMatchQuery>,
) -> Result<Json<RouteMatchResponse>, AppError> {
    let city = resolve_city(&city)?;
    let routes = state
        .source
        .routes(city.tdx_name)
        .await
        .map_err(|e| routes_unavailable(&city, e))?;

    let route = state
        .matcher
        .resolve(&query.line, &routes)
        .cloned()
        .ok_or_else(|| AppError::NotFound {
            message: format!("No route matches line {}", query.line),
        })?;

    Ok(Json(RouteMatchResponse {
        line: query.line,
        route,
    }))
}

/// Re-time an itinerary around a chosen arrival.
async fn retime<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
    Json(req): Json<RetimeRequest>,
) -> Result<Json<RetimeResponse>, AppError> {
    let itinerary = apply_selected_arrival(&req.itinerary, req.leg_index, &req.arrival, Utc::now())?;

    Ok(Json(RetimeResponse {
        departure: itinerary.departure_display(state.utc_offset),
        arrival: itinerary.arrival_display(state.utc_offset),
        itinerary,
    }))
}

/// Find alternatives between two points and start tracking their arrivals.
async fn track_alternatives<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
    Json(req): Json<TrackAlternativesRequest>,
) -> Result<Json<AlternativesResponse>, AppError> {
    let city = resolve_city(&req.city)?;
    let stations = load_stations(&state, &city).await?;
    let threshold = state.finder.threshold_m;

    let departure =
        find_nearest_cluster(req.from, &stations, threshold).ok_or_else(|| AppError::NotFound {
            message: "No station near departure".to_string(),
        })?;
    let arrival =
        find_nearest_cluster(req.to, &stations, threshold).ok_or_else(|| AppError::NotFound {
            message: "No station near arrival".to_string(),
        })?;

    let finder = AlternativeRouteFinder::new(&*state.source, &state.finder);
    let candidates = finder.find_between(city.tdx_name, &departure, &arrival).await;

    if candidates.is_empty() {
        state.alternatives.stop();
    } else {
        let target = AlternativesTarget::new(
            state.source.clone(),
            city.tdx_name,
            departure,
            candidates.clone(),
            &state.poll,
        );
        state.alternatives.start(target);
    }

    Ok(Json(AlternativesResponse { candidates }))
}

/// Latest tracked alternatives.
async fn tracked_alternatives<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<TrackedResponse<CandidateArrival>> {
    Json(TrackedResponse::from_snapshot(
        state.alternatives.is_running(),
        state.alternatives.latest(),
    ))
}

/// Start tracking the live board of a station.
async fn track_board<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
    Json(req): Json<TrackBoardRequest>,
) -> Result<Json<ClusterResult>, AppError> {
    let city = resolve_city(&req.city)?;
    let stations = load_stations(&state, &city).await?;
    let center = Coord::new(req.lat, req.lon);

    let cluster = find_nearest_cluster(center, &stations, state.grouping.threshold_m)
        .ok_or_else(|| AppError::NotFound {
            message: "No station near the given point".to_string(),
        })?;

    let station = req.station.unwrap_or_else(|| cluster.closest().clone());
    if !cluster.contains_station(&station) {
        return Err(AppError::BadRequest {
            message: format!("Station {station} is not part of {}", cluster.name()),
        });
    }

    let result = ClusterResult::from_cluster(&cluster, center);
    let target = StationBoardTarget::new(
        state.source.clone(),
        state.mappings.clone(),
        city.tdx_name,
        cluster,
        station,
        &state.poll,
    );
    state.board.start(target);

    Ok(Json(result))
}

/// Latest tracked station board.
async fn tracked_board<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<TrackedResponse<BoardEntry>> {
    Json(TrackedResponse::from_snapshot(
        state.board.is_running(),
        state.board.latest(),
    ))
}

/// Start tracking every stop and bus of one route.
///
/// Responds with the route's stops before any live data has arrived.
async fn track_route<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
    Json(req): Json<TrackRouteRequest>,
) -> Result<Json<RouteLiveView>, AppError> {
    let city = resolve_city(&req.city)?;
    let route_name = req.route.trim();
    let sequences = state
        .source
        .stop_sequences(city.tdx_name, route_name)
        .await
        .map_err(|e| {
            warn!(city = city.tdx_name, route = route_name, error = %e, "failed to load route stops");
            AppError::Internal {
                message: format!("Stop data unavailable for route {route_name}"),
            }
        })?;

    if sequences.is_empty() {
        return Err(AppError::NotFound {
            message: format!("No route named {route_name} in {}", city.name),
        });
    }

    let skeleton = build_route_view(route_name, &sequences, &[], Vec::new(), Utc::now());
    let target = RouteTarget::new(state.source.clone(), city.tdx_name, route_name, sequences);
    state.route.start(target);

    Ok(Json(skeleton))
}

/// Latest live view of the tracked route.
async fn tracked_route<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<TrackedRouteResponse> {
    Json(TrackedRouteResponse::from_snapshot(
        state.route.is_running(),
        state.route.latest(),
    ))
}

fn status_of<T: PollTarget>(tracker: &Tracker<T>) -> TrackerStatus {
    TrackerStatus {
        running: tracker.is_running(),
        has_target: tracker.has_target(),
    }
}

fn tracking_status<S: TransitSource + 'static>(state: &AppState<S>) -> TrackingStatusResponse {
    TrackingStatusResponse {
        alternatives: status_of(&state.alternatives),
        board: status_of(&state.board),
        route: status_of(&state.route),
    }
}

/// Pause every tracker.
async fn pause_tracking<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<TrackingStatusResponse> {
    state.alternatives.pause();
    state.board.pause();
    state.route.pause();
    info!("tracking paused");
    Json(tracking_status(&state))
}

/// Resume every tracker that has a target.
async fn resume_tracking<S: TransitSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<TrackingStatusResponse> {
    state.alternatives.resume();
    state.board.resume();
    state.route.resume();
    Json(tracking_status(&state))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String },
}

impl From<ItineraryError> for AppError {
    fn from(e: ItineraryError) -> Self {
        match e {
            ItineraryError::LegOutOfRange { .. } | ItineraryError::NotTransit(_) => {
                AppError::BadRequest {
                    message: e.to_string(),
                }
            }
            ItineraryError::TimeOverflow => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message.clone()),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message.clone()),
        };

        if status.is_server_error() {
            error!(%status, error = %message, "request failed");
        } else {
            warn!(%status, error = %message, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
