//! flightd - flight delay prediction daemon
//!
//! Serves predictions over HTTP, delegating to the inference provider in
//! remote mode and falling back to the local heuristic when it misbehaves.

use anyhow::{Context, Result};
use flight_common::{config, FlightConfig, PredictionOrchestrator};
use flightd::logging::init_logging;
use flightd::server::{self, AppState};
use std::sync::Arc;
use tracing::{info, warn};

fn main() -> Result<()> {
    let (config, config_error) = FlightConfig::load();
    init_logging(&config.log.level);

    info!("flightd v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config::config_path().display());
    if let Some(e) = config_error {
        warn!("Ignoring configuration, using defaults: {}", e);
    }
    if config.retry.max_attempts_was_clamped() {
        warn!(
            "retry.max_attempts {} out of range, using {}",
            config.retry.max_attempts,
            config.retry.effective_max_attempts()
        );
    }

    // The blocking HTTP client must be created and dropped outside the runtime
    let orchestrator = Arc::new(
        PredictionOrchestrator::from_config(&config).context("Failed to build provider client")?,
    );
    info!(
        "Prediction mode: {} (provider {}, {} attempts)",
        orchestrator.mode().as_str(),
        config.provider.base_url,
        orchestrator.max_attempts()
    );

    let state = AppState::new(Arc::clone(&orchestrator), &config.rate_limit)
        .with_prediction_budget(config.worst_case_prediction_time());
    info!("Request timeout: {}s", state.request_timeout.as_secs());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(server::run(state, &config.server.bind));
    drop(runtime);

    drop(orchestrator);
    result
}
