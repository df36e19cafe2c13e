//! HTTP server for flightd

use crate::rate_limit::{self, RateLimiter};
use crate::routes;
use anyhow::Result;
use axum::http::Method;
use axum::middleware;
use axum::Router;
use flight_common::config::RateLimitConfig;
use flight_common::PredictionOrchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Floor for the whole-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Headroom over the worst-case prediction time
const TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Application state shared across handlers
pub struct AppState {
    pub orchestrator: Arc<PredictionOrchestrator>,
    pub rate_limiter: RateLimiter,
    pub start_time: Instant,
    /// Never shorter than a full retry run, so fallback always answers first
    pub request_timeout: Duration,
}

pub type AppStateArc = Arc<AppState>;

impl AppState {
    pub fn new(orchestrator: Arc<PredictionOrchestrator>, rate_limit: &RateLimitConfig) -> Self {
        Self {
            orchestrator,
            rate_limiter: RateLimiter::new(rate_limit.requests_per_period, rate_limit.period()),
            start_time: Instant::now(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Stretch the request timeout to cover `worst_case` plus a margin
    pub fn with_prediction_budget(mut self, worst_case: Duration) -> Self {
        self.request_timeout = REQUEST_TIMEOUT.max(worst_case.saturating_add(TIMEOUT_MARGIN));
        self
    }
}

/// Assemble routes, throttling and middleware
pub fn build_router(state: AppStateArc) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    let request_timeout = state.request_timeout;

    Router::new()
        .merge(routes::prediction_routes())
        .merge(routes::health_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::throttle,
        ))
        .fallback(routes::not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until Ctrl-C
pub async fn run(state: AppState, bind: &str) -> Result<()> {
    let state = Arc::new(state);
    spawn_bucket_cleanup(state.clone(), state.rate_limiter.period());

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

/// Forget clients that have been quiet for a full period
fn spawn_bucket_cleanup(state: AppStateArc, window: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(window);
        loop {
            interval.tick().await;
            state.rate_limiter.cleanup(window);
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down gracefully");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(
            Arc::new(PredictionOrchestrator::default()),
            &RateLimitConfig::default(),
        )
    }

    #[test]
    fn test_request_timeout_covers_prediction_budget() {
        assert_eq!(state().request_timeout, REQUEST_TIMEOUT);
        assert_eq!(
            state().with_prediction_budget(Duration::from_secs(18)).request_timeout,
            REQUEST_TIMEOUT
        );
        // 3 attempts of 21s plus 1s and 2s of backoff
        let long = state().with_prediction_budget(Duration::from_secs(66));
        assert_eq!(long.request_timeout, Duration::from_secs(71));
        let huge = state().with_prediction_budget(Duration::MAX);
        assert_eq!(huge.request_timeout, Duration::MAX);
    }
}
