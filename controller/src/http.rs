use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::services::ServeDir;
use tracing::warn;

use hydro_common::{ControllerConfig, LiveStatus, TelemetryRecord, WaterError};

use crate::store::{SettingsStore, TelemetryStore};

/// Shared read side of the controller. The control loop owns all mutable
/// actuator state; the dashboard gets snapshots and store access only.
#[derive(Clone)]
pub struct AppState {
    pub config: ControllerConfig,
    pub settings: SettingsStore,
    pub telemetry: TelemetryStore,
    pub status: watch::Receiver<LiveStatus>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct UpdateResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
struct LatestSensorsView {
    #[serde(flatten)]
    record: TelemetryRecord,
    #[serde(rename = "waterError")]
    water_error: Option<WaterError>,
}

pub fn router(state: AppState) -> Router {
    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    Router::new()
        .route(
            "/api/settings",
            get(handle_get_settings).post(handle_post_settings),
        )
        .route("/api/latest_sensors", get(handle_get_latest_sensors))
        .route("/api/sensor_history", get(handle_get_history))
        .route("/api/status", get(handle_get_status))
        .fallback_service(ServeDir::new(web_root))
        .with_state(state)
}

async fn handle_get_settings(State(state): State<AppState>) -> impl IntoResponse {
    match state.settings.load_all().await {
        Ok(map) => Json(map).into_response(),
        Err(err) => {
            warn!("failed to load settings: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load settings")
        }
    }
}

async fn handle_post_settings(
    State(state): State<AppState>,
    Json(update): Json<serde_json::Map<String, serde_json::Value>>,
) -> impl IntoResponse {
    if update.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid request");
    }

    let mut entries = BTreeMap::new();
    for (key, value) in update {
        let raw = match value {
            serde_json::Value::String(raw) => raw,
            other => other.to_string(),
        };
        entries.insert(key, raw);
    }

    if let Err(err) = state.settings.update(&entries).await {
        warn!("failed to update settings: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update settings",
        );
    }

    Json(UpdateResponse { success: true }).into_response()
}

async fn handle_get_latest_sensors(State(state): State<AppState>) -> impl IntoResponse {
    let record = match state.telemetry.latest().await {
        Ok(Some(record)) => record,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "No sensor data found"),
        Err(err) => {
            warn!("failed to load latest telemetry: {err:#}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load latest telemetry",
            );
        }
    };

    let water_error = state.status.borrow().water_error;
    Json(LatestSensorsView {
        record,
        water_error,
    })
    .into_response()
}

async fn handle_get_history(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let limit = params
        .get("limit")
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(state.config.history_default_rows);

    match state.telemetry.recent(limit).await {
        Ok(rows) => Json(rows).into_response(),
        Err(err) => {
            warn!("failed to load telemetry history: {err:#}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load telemetry history",
            )
        }
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.status.borrow().clone();
    Json(status)
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
