//! JSON API for the Vue frontend. Every endpoint answers with the
//! `{success, data|error}` envelope; the sync trigger stays unauthenticated
//! for now and can move behind auth later.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use regex::Regex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::read_model::MetroDataService;
use crate::utils::extract_first_station_code;

static LINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Z]{2}$").expect("valid regex"));

#[derive(Clone)]
pub struct AppState {
    service: Arc<MetroDataService>,
    predictions_refresh_interval_secs: u32,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.message,
        }));

        (self.status, body).into_response()
    }
}

fn ok_envelope(data: Value) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data,
    }))
}

pub async fn serve(service: Arc<MetroDataService>, config: &AppConfig) -> Result<()> {
    let state = AppState {
        service,
        predictions_refresh_interval_secs: config.wmata.predictions_refresh_interval_secs,
    };

    let origins = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {origin}");
                None
            }
        })
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/api/metro/lines", get(get_lines))
        .route("/api/metro/stations/{line_code}", get(get_stations_for_line))
        .route("/api/metro/predictions/{station_code}", get(get_train_predictions))
        .route("/api/metro/path/{line_code}", get(get_line_path))
        .route("/api/metro/sync", post(sync_data))
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("couldn't bind {}", config.bind_addr))?;
    info!("serving on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
        info!("received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn get_lines(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let mut lines = state
        .service
        .cached_lines()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load lines: {e:#}")))?;

    // An empty table means the first sync never ran; do it now.
    if lines.is_empty() {
        state.service.sync().await;
        lines = state
            .service
            .cached_lines()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to load lines: {e:#}")))?;
    }

    Ok(ok_envelope(json!(lines)))
}

async fn get_stations_for_line(
    State(state): State<AppState>,
    Path(line_code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    validate_line_code(&state, &line_code).await?;

    let stations = state
        .service
        .ordered_stations_for_line(&line_code)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load stations: {e:#}")))?;

    let total_stations = stations.len();

    Ok(Json(json!({
        "success": true,
        "data": stations,
        "meta": {
            "line_code": line_code,
            "total_stations": total_stations,
            "ordered": true,
        },
    })))
}

async fn get_train_predictions(
    State(state): State<AppState>,
    Path(station_code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let predictions = state
        .service
        .train_predictions(&station_code)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get predictions: {e:#}")))?;

    let station = state
        .service
        .find_station(extract_first_station_code(&station_code))
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get predictions: {e:#}")))?
        .ok_or_else(|| ApiError::not_found("Station not found"))?;

    let predictions = predictions
        .iter()
        .map(|prediction| prediction.to_frontend())
        .collect::<Vec<_>>();

    Ok(ok_envelope(json!({
        "station": {
            "code": station.code,
            "name": station.name,
        },
        "predictions": predictions,
        "updated_at": Utc::now().to_rfc3339(),
        "refresh_interval": state.predictions_refresh_interval_secs,
    })))
}

async fn get_line_path(
    State(state): State<AppState>,
    Path(line_code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    validate_line_code(&state, &line_code).await?;

    let path = state
        .service
        .line_path(&line_code)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load path: {e:#}")))?;

    let entries = path
        .iter()
        .map(|entry| {
            json!({
                "station_code": entry.station_code,
                "station_name": entry.station_name,
                "seq_num": entry.seq_num,
                "distance_to_prev": entry.distance_to_prev,
            })
        })
        .collect::<Vec<_>>();

    let total_entries = entries.len();

    Ok(Json(json!({
        "success": true,
        "data": entries,
        "meta": {
            "line_code": line_code,
            "total_entries": total_entries,
        },
    })))
}

async fn sync_data(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let results = state.service.sync().await;

    Ok(Json(json!({
        "success": true,
        "message": "All Metro data synchronized successfully",
        "results": results,
    })))
}

async fn validate_line_code(state: &AppState, line_code: &str) -> Result<(), ApiError> {
    if !LINE_CODE_RE.is_match(line_code) {
        return Err(ApiError::bad_request("Invalid line code"));
    }

    let exists = state
        .service
        .line_exists(line_code)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to validate line code: {e:#}")))?;

    if !exists {
        return Err(ApiError::bad_request("Invalid line code"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_code_format() {
        assert!(LINE_CODE_RE.is_match("RD"));
        assert!(LINE_CODE_RE.is_match("SV"));
        assert!(!LINE_CODE_RE.is_match("rd"));
        assert!(!LINE_CODE_RE.is_match("RED"));
        assert!(!LINE_CODE_RE.is_match("R"));
        assert!(!LINE_CODE_RE.is_match("R1"));
    }

    #[test]
    fn error_envelope_shape() {
        let body = json!({
            "success": false,
            "error": "Invalid line code",
        });

        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid line code");
    }
}
