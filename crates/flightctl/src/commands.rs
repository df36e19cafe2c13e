//! Subcommand implementations for flightctl

use crate::output;
use anyhow::{bail, Context, Result};
use flight_common::config::config_path;
use flight_common::{
    CodeNormalizer, FlightConfig, FlightQuery, FlightRequest, HttpRemoteEngine, PredictionMode,
    PredictionOrchestrator, PredictionTrace, RemoteEngine, ScoreBreakdown,
};
use owo_colors::OwoColorize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Arguments of `flightctl predict`
#[derive(Debug, Clone)]
pub struct PredictArgs {
    pub carrier: String,
    pub origin: String,
    pub destination: String,
    pub departure: String,
    pub distance_km: i64,
    /// Overrides `[prediction] mode` when set
    pub mode: Option<PredictionMode>,
    pub explain: bool,
    pub json: bool,
}

impl PredictArgs {
    pub fn to_request(&self) -> FlightRequest {
        FlightRequest {
            carrier: Some(self.carrier.clone()),
            origin: Some(self.origin.clone()),
            destination: Some(self.destination.clone()),
            departure: Some(self.departure.clone()),
            distance_km: Some(self.distance_km),
        }
    }
}

/// Quiet by default so command output stays readable; `RUST_LOG` overrides
pub fn init_logging(configured: &str) {
    let level = if configured.eq_ignore_ascii_case("info") {
        "warn"
    } else {
        configured
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Validate the arguments and resolve the effective configuration
pub fn prepare(config: &FlightConfig, args: &PredictArgs) -> Result<(FlightConfig, FlightQuery)> {
    let mut config = config.clone();
    if let Some(mode) = args.mode {
        config.prediction.mode = mode;
    }

    let now = chrono::Local::now().naive_local();
    let query = args.to_request().validate(now)?;
    Ok((config, query))
}

pub fn predict(config: &FlightConfig, args: &PredictArgs) -> Result<()> {
    let (config, query) = prepare(config, args)?;

    let orchestrator =
        PredictionOrchestrator::from_config(&config).context("Failed to build provider client")?;
    let trace = orchestrator.predict_traced(&query);

    let breakdown = args.explain.then(|| {
        let canonical = orchestrator.normalizer().normalize(&query);
        orchestrator.scorer().breakdown(&canonical)
    });

    if args.json {
        println!("{}", prediction_json(&trace, breakdown.as_ref())?);
    } else {
        print!("{}", output::render_prediction(&trace, breakdown.as_ref()));
    }
    Ok(())
}

/// JSON document printed by `predict --json`
pub fn prediction_json(trace: &PredictionTrace, breakdown: Option<&ScoreBreakdown>) -> Result<String> {
    let mut doc = json!({
        "prediction": trace.prediction,
        "attempts": trace.attempts,
        "fell_back": trace.fell_back(),
    });
    if let Some(b) = breakdown {
        doc["breakdown"] = serde_json::to_value(b)?;
    }
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn health(config: &FlightConfig) -> Result<()> {
    let engine = HttpRemoteEngine::new(
        config.provider.base_url.clone(),
        config.provider.effective_timeout(),
    )
    .context("Failed to build provider client")?;

    println!("Mode:     {}", config.prediction.mode.as_str());
    println!("Provider: {}", engine.base_url());

    if engine.is_healthy() {
        println!("Status:   {}", "UP".bright_green());
        Ok(())
    } else {
        println!("Status:   {}", "DOWN".bright_red());
        bail!("provider at {} is not answering", engine.base_url())
    }
}

pub fn codes(config: &FlightConfig) -> Result<()> {
    let normalizer = CodeNormalizer::new(config.codes.clone());
    print!("{}", output::render_codes(&normalizer));
    Ok(())
}

pub fn show_config(config: &FlightConfig) -> Result<()> {
    println!("# {}", config_path().display());
    print!("{}", config.to_toml()?);
    Ok(())
}
