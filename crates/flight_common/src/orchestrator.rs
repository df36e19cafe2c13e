//! Prediction orchestrator
//!
//! Normalizes codes, then either scores locally or asks the inference
//! provider. Remote failures are retried with backoff and, once the attempt
//! budget is spent, answered by the heuristic. A caller always gets a
//! prediction back; provider trouble only shows up in the logs.
//!
//! Flow:
//!   Idle -> Done                          (local mode)
//!   Idle -> CallingRemote -> Done         (provider answered)
//!   CallingRemote -> Retrying -> CallingRemote
//!   CallingRemote -> FallingBack -> Done  (attempts spent, or engine panicked)

use crate::backoff::{BackoffStrategy, ExponentialBackoff};
use crate::codes::CodeNormalizer;
use crate::config::FlightConfig;
use crate::heuristic::HeuristicScorer;
use crate::remote::{HttpRemoteEngine, ProviderRequest, RemoteEngine};
use crate::types::{CanonicalFlightQuery, FlightQuery, Prediction};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default attempt budget against the provider
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Where predictions come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    /// Heuristic only, provider never contacted
    #[default]
    Local,
    /// Provider first, heuristic as fallback
    Remote,
}

impl PredictionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMode::Local => "local",
            PredictionMode::Remote => "remote",
        }
    }
}

/// Observable states of one prediction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrchestratorState {
    Idle,
    CallingRemote,
    Retrying,
    FallingBack,
    Done,
}

/// Internal step; `Done` carries the answer so it cannot be lost
enum Step {
    Idle,
    CallingRemote,
    Retrying,
    FallingBack,
    Done(Prediction),
}

impl Step {
    fn state(&self) -> OrchestratorState {
        match self {
            Step::Idle => OrchestratorState::Idle,
            Step::CallingRemote => OrchestratorState::CallingRemote,
            Step::Retrying => OrchestratorState::Retrying,
            Step::FallingBack => OrchestratorState::FallingBack,
            Step::Done(_) => OrchestratorState::Done,
        }
    }
}

/// A prediction plus how it was obtained
#[derive(Debug, Clone)]
pub struct PredictionTrace {
    pub prediction: Prediction,
    /// States in visit order, ending with `Done`
    pub states: Vec<OrchestratorState>,
    /// Provider calls made
    pub attempts: u32,
    /// Last provider failure, if any
    pub last_error: Option<String>,
}

impl PredictionTrace {
    pub fn fell_back(&self) -> bool {
        self.states.contains(&OrchestratorState::FallingBack)
    }
}

enum RemoteFailure {
    /// Retryable provider error
    Transient(String),
    /// Engine panicked; not worth retrying
    Aborted(String),
}

/// Chooses between provider and heuristic for each query
pub struct PredictionOrchestrator {
    normalizer: CodeNormalizer,
    scorer: HeuristicScorer,
    remote: Option<Arc<dyn RemoteEngine>>,
    backoff: Arc<dyn BackoffStrategy>,
    max_attempts: u32,
}

impl PredictionOrchestrator {
    /// Local-only orchestrator
    pub fn new(normalizer: CodeNormalizer, scorer: HeuristicScorer) -> Self {
        Self {
            normalizer,
            scorer,
            remote: None,
            backoff: Arc::new(ExponentialBackoff::default()),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Switch to remote mode against `engine`
    pub fn with_remote(mut self, engine: Arc<dyn RemoteEngine>) -> Self {
        self.remote = Some(engine);
        self
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffStrategy>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total provider attempts per request, at least one
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Build from configuration; remote mode gets an HTTP engine
    pub fn from_config(config: &FlightConfig) -> Result<Self, reqwest::Error> {
        let orchestrator = Self::new(
            CodeNormalizer::new(config.codes.clone()),
            HeuristicScorer::new(config.heuristic.clone()),
        );

        if config.prediction.mode == PredictionMode::Local {
            return Ok(orchestrator);
        }

        let engine = HttpRemoteEngine::new(
            config.provider.base_url.clone(),
            config.provider.effective_timeout(),
        )?;

        Ok(orchestrator
            .with_remote(Arc::new(engine))
            .with_backoff(Arc::new(ExponentialBackoff::new(
                config.retry.initial_delay(),
                config.retry.multiplier,
            )))
            .with_max_attempts(config.retry.effective_max_attempts()))
    }

    pub fn mode(&self) -> PredictionMode {
        if self.remote.is_some() {
            PredictionMode::Remote
        } else {
            PredictionMode::Local
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn normalizer(&self) -> &CodeNormalizer {
        &self.normalizer
    }

    pub fn scorer(&self) -> &HeuristicScorer {
        &self.scorer
    }

    /// Provider health for status reporting; `None` in local mode
    pub fn provider_healthy(&self) -> Option<bool> {
        self.remote.as_ref().map(|engine| engine.is_healthy())
    }

    pub fn predict(&self, query: &FlightQuery) -> Prediction {
        self.predict_traced(query).prediction
    }

    /// Same as [`predict`](Self::predict), also reporting the path taken
    pub fn predict_traced(&self, query: &FlightQuery) -> PredictionTrace {
        info!(
            "Predicting {} -> {} (carrier {}, mode {})",
            query.origin(),
            query.destination(),
            query.carrier(),
            self.mode().as_str()
        );

        let canonical = self.normalizer.normalize(query);
        let request = ProviderRequest::from(&canonical);

        let mut states = Vec::new();
        let mut attempts = 0u32;
        let mut last_error = None;
        let mut step = Step::Idle;

        let prediction = loop {
            states.push(step.state());
            step = match step {
                Step::Idle => match self.remote {
                    Some(_) => Step::CallingRemote,
                    None => Step::Done(self.heuristic(&canonical)),
                },
                Step::CallingRemote => {
                    attempts += 1;
                    match self.call_remote(&request) {
                        Ok(prediction) => Step::Done(prediction),
                        Err(RemoteFailure::Transient(reason)) => {
                            warn!(
                                "Provider attempt {}/{} failed: {}",
                                attempts, self.max_attempts, reason
                            );
                            last_error = Some(reason);
                            if attempts < self.max_attempts {
                                Step::Retrying
                            } else {
                                error!(
                                    "All {} provider attempts failed, falling back to heuristic",
                                    attempts
                                );
                                Step::FallingBack
                            }
                        }
                        Err(RemoteFailure::Aborted(reason)) => {
                            error!("Provider call aborted ({}), falling back to heuristic", reason);
                            last_error = Some(reason);
                            Step::FallingBack
                        }
                    }
                }
                Step::Retrying => {
                    self.backoff.pause(attempts);
                    Step::CallingRemote
                }
                Step::FallingBack => Step::Done(self.heuristic(&canonical)),
                Step::Done(prediction) => break prediction,
            };
        };

        info!(
            "Prediction: {} ({:.2}) via {}",
            prediction.label,
            prediction.probability,
            prediction.source.as_str()
        );

        PredictionTrace {
            prediction,
            states,
            attempts,
            last_error,
        }
    }

    fn heuristic(&self, canonical: &CanonicalFlightQuery) -> Prediction {
        let breakdown = self.scorer.breakdown(canonical);
        debug!(
            "Heuristic: raw {} -> {} points, factors {:?}",
            breakdown.raw_points,
            breakdown.points,
            breakdown
                .components
                .iter()
                .map(|c| c.factor)
                .collect::<Vec<_>>()
        );
        Prediction::heuristic(breakdown.probability())
    }

    fn call_remote(&self, request: &ProviderRequest) -> Result<Prediction, RemoteFailure> {
        let engine = match &self.remote {
            Some(engine) => engine,
            None => return Err(RemoteFailure::Aborted("no provider configured".to_string())),
        };

        match panic::catch_unwind(AssertUnwindSafe(|| engine.get_prediction(request))) {
            Ok(Ok(answer)) => Ok(answer.into_prediction()),
            Ok(Err(e)) => Err(RemoteFailure::Transient(e.to_string())),
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "engine panicked".to_string());
                Err(RemoteFailure::Aborted(msg))
            }
        }
    }
}

impl Default for PredictionOrchestrator {
    fn default() -> Self {
        Self::new(CodeNormalizer::default(), HeuristicScorer::default())
    }
}
