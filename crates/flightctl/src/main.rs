//! flightctl - command line client for FlightOnTime
//!
//! Runs predictions in-process with the same configuration as the daemon.

use anyhow::Result;
use clap::{Parser, Subcommand};
use flight_common::{FlightConfig, PredictionMode};
use flightctl::commands::{self, PredictArgs};
use tracing::warn;

#[derive(Parser)]
#[command(name = "flightctl")]
#[command(about = "FlightOnTime - flight delay predictions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict whether a flight will be delayed
    Predict {
        /// Airline code (IATA or ICAO), e.g. G3
        #[arg(long)]
        carrier: String,

        /// Origin airport code, e.g. GRU
        #[arg(long)]
        origin: String,

        /// Destination airport code, e.g. GIG
        #[arg(long)]
        destination: String,

        /// Local departure time, e.g. 2025-11-10T14:30:00
        #[arg(long)]
        departure: String,

        /// Route length in kilometers
        #[arg(long = "distance")]
        distance_km: i64,

        /// Ask the inference provider first
        #[arg(long, conflicts_with = "local")]
        remote: bool,

        /// Heuristic only
        #[arg(long)]
        local: bool,

        /// Show the heuristic factors behind the score
        #[arg(long)]
        explain: bool,

        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },

    /// Check whether the inference provider answers
    Health,

    /// List supported carrier and airport codes
    Codes,

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, config_error) = FlightConfig::load();
    commands::init_logging(&config.log.level);
    if let Some(e) = config_error {
        warn!("Ignoring configuration, using defaults: {}", e);
    }

    match cli.command {
        Commands::Predict {
            carrier,
            origin,
            destination,
            departure,
            distance_km,
            remote,
            local,
            explain,
            json,
        } => {
            let mode = match (remote, local) {
                (true, _) => Some(PredictionMode::Remote),
                (_, true) => Some(PredictionMode::Local),
                _ => None,
            };
            commands::predict(
                &config,
                &PredictArgs {
                    carrier,
                    origin,
                    destination,
                    departure,
                    distance_km,
                    mode,
                    explain,
                    json,
                },
            )
        }
        Commands::Health => commands::health(&config),
        Commands::Codes => commands::codes(&config),
        Commands::Config => commands::show_config(&config),
    }
}
