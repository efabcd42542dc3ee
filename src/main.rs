use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

mod clock;
mod config;
mod coords;
mod error;
mod extract;
mod google;
mod persist;
mod search;

use config::Config;
use coords::Coordinate;
use error::AppError;
use google::{GoogleClient, LatLng};
use persist::{PersistedRouteBatch, RouteResult};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    google: GoogleClient,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = std::fs::create_dir_all(&config.routes_dir) {
        log::error!(
            "cannot create routes dir {}: {err}",
            config.routes_dir.display()
        );
        std::process::exit(1);
    }

    let google = match GoogleClient::new(config.google_maps_api_key.clone()) {
        Ok(google) => google,
        Err(err) => {
            log::error!("cannot build http client: {err}");
            std::process::exit(1);
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        google,
    };

    let app = Router::new()
        .route("/api/routes", get(get_routes))
        .route("/api/autocomplete", get(get_autocomplete))
        .route("/api/geocode", get(get_geocode))
        .layer(cors)
        .with_state(state);

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("cannot bind port {port}: {err}");
            std::process::exit(1);
        }
    };

    log::info!("Server is running on http://localhost:{port}");
    if let Err(err) = axum::serve(listener, app).await {
        log::error!("server error: {err}");
    }
}

#[derive(Debug, Deserialize)]
struct RoutesQuery {
    origin: Option<String>,
    destination: Option<String>,
    #[serde(rename = "arrivalTime")]
    arrival_time: Option<String>,
}

#[derive(Debug, Serialize)]
struct RoutesResponseBody {
    count: usize,
    routes: Vec<RouteResult>,
}

// GET /api/routes?origin=lat,lng&destination=lat,lng&arrivalTime=HH:MM
async fn get_routes(
    State(state): State<AppState>,
    Query(query): Query<RoutesQuery>,
) -> Result<Json<RoutesResponseBody>, AppError> {
    let origin_raw = query
        .origin
        .ok_or_else(|| AppError::InvalidInput("origin and destination required".to_owned()))?;
    let destination_raw = query
        .destination
        .ok_or_else(|| AppError::InvalidInput("origin and destination required".to_owned()))?;
    let origin = Coordinate::parse(&origin_raw)?;
    let destination = Coordinate::parse(&destination_raw)?;

    let now = Local::now();
    let target = match &query.arrival_time {
        Some(raw) => Some(
            clock::parse_hhmm_today(raw, now)
                .ok_or_else(|| AppError::InvalidInput(format!("invalid arrivalTime: \"{raw}\"")))?,
        ),
        None => None,
    };

    let found = search::find_routes(&state.google, origin, destination, target, now).await?;

    let routes: Vec<RouteResult> = found
        .iter()
        .map(|r| RouteResult {
            bus_number: r.bus_number.clone(),
            pickup_arrival_time: clock::format_hhmm(r.pickup_time),
            duration_min: r.duration_seconds.map(|s| (s as f64 / 60.0).round() as i64),
        })
        .collect();

    log::info!(
        "GET /api/routes origin={origin_raw} destination={destination_raw} arrivalTime={} -> {} routes",
        query.arrival_time.as_deref().unwrap_or("-"),
        routes.len()
    );

    // hand-off point for the display bridge; a failed write never fails the request
    let batch = PersistedRouteBatch {
        origin: origin_raw,
        destination: destination_raw,
        arrival_time: query.arrival_time,
        generated_at: now.to_rfc3339(),
        routes: routes.clone(),
    };
    if let Err(err) = persist::write_batch(&state.config.routes_dir, &batch, now) {
        log::warn!("failed to persist route batch: {err}");
    }

    Ok(Json(RoutesResponseBody {
        count: routes.len(),
        routes,
    }))
}

#[derive(Debug, Deserialize)]
struct AutocompleteQuery {
    input: Option<String>,
}

// GET /api/autocomplete?input=text, upstream predictions[] passed through
async fn get_autocomplete(
    State(state): State<AppState>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<Value>, AppError> {
    let input = query
        .input
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("input required".to_owned()))?;

    let payload = state.google.autocomplete(&input).await?;
    log::info!("GET /api/autocomplete input={input}");
    Ok(Json(payload))
}

#[derive(Debug, Deserialize)]
struct GeocodeQuery {
    address: Option<String>,
}

// GET /api/geocode?address=text -> { lat, lng }
async fn get_geocode(
    State(state): State<AppState>,
    Query(query): Query<GeocodeQuery>,
) -> Result<Json<LatLng>, AppError> {
    let address = query
        .address
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("address required".to_owned()))?;

    let location = state.google.geocode(&address).await?;
    log::info!("GET /api/geocode address={address}");
    Ok(Json(location))
}
