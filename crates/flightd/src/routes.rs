//! API routes for flightd

use crate::error::{ApiError, ApiFailure};
use crate::server::AppStateArc;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::Uri,
    routing::{get, post},
    Json, Router,
};
use flight_common::{FlightRequest, Prediction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// Prediction Routes
// ============================================================================

pub fn prediction_routes() -> Router<AppStateArc> {
    Router::new().route("/api/v1/predict", post(predict))
}

async fn predict(
    State(state): State<AppStateArc>,
    uri: Uri,
    payload: Result<Json<FlightRequest>, JsonRejection>,
) -> Result<Json<Prediction>, ApiFailure> {
    let path = uri.path().to_string();
    let request_id = Uuid::new_v4();

    let Json(request) = payload.map_err(|rejection| {
        ApiError::MalformedJson(rejection.body_text()).at(path.clone())
    })?;

    let now = chrono::Local::now().naive_local();
    let query = request
        .validate(now)
        .map_err(|e| ApiError::from(e).at(path.clone()))?;

    info!(
        "[{}] Prediction request {} -> {} ({}, {} km)",
        request_id,
        query.origin(),
        query.destination(),
        query.carrier(),
        query.distance_km()
    );

    // Remote calls block and sleep between retries
    let orchestrator = Arc::clone(&state.orchestrator);
    let prediction = tokio::task::spawn_blocking(move || orchestrator.predict(&query))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()).at(path.clone()))?;

    info!(
        "[{}] {} ({:.2}) from {}",
        request_id,
        prediction.label,
        prediction.probability,
        prediction.source.as_str()
    );

    Ok(Json(prediction))
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub api: String,
    /// UP, DOWN, or DISABLED in local mode
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub mode: String,
    pub services: ServiceStatus,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/api/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let provider = match tokio::task::spawn_blocking(move || orchestrator.provider_healthy()).await {
        Ok(Some(true)) => "UP",
        Ok(Some(false)) => "DOWN",
        Ok(None) => "DISABLED",
        Err(e) => {
            warn!("Provider health probe failed: {}", e);
            "DOWN"
        }
    };

    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        mode: state.orchestrator.mode().as_str().to_string(),
        services: ServiceStatus {
            api: "UP".to_string(),
            provider: provider.to_string(),
        },
    })
}

// ============================================================================
// Fallback
// ============================================================================

pub async fn not_found(uri: Uri) -> ApiFailure {
    ApiError::NotFound.at(uri.path())
}
