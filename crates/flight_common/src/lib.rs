//! Flight Common - shared prediction core for FlightOnTime
//!
//! Holds the domain types, code normalization, the heuristic scorer, the
//! remote inference boundary and the orchestrator that ties them together.
//! The daemon and the CLI are thin layers over this crate.

pub mod backoff;
pub mod codes;
pub mod config;
pub mod error;
pub mod heuristic;
pub mod orchestrator;
pub mod remote;
pub mod types;
pub mod validation;

pub use backoff::{BackoffStrategy, ExponentialBackoff, NoBackoff, RecordingBackoff};
pub use codes::CodeNormalizer;
pub use config::FlightConfig;
pub use error::{ConfigError, FieldError, ProviderError, ValidationError};
pub use heuristic::{HeuristicScorer, HeuristicTables, ScoreBreakdown, ScoreFactor};
pub use orchestrator::{OrchestratorState, PredictionMode, PredictionOrchestrator, PredictionTrace};
pub use remote::{FakeRemoteEngine, HttpRemoteEngine, ProviderPrediction, ProviderRequest, RemoteEngine};
pub use types::{CanonicalFlightQuery, FlightQuery, Prediction, PredictionLabel, PredictionSource};
pub use validation::FlightRequest;
