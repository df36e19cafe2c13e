//! Inference provider boundary
//!
//! The provider is an external ML service reached over one blocking HTTP
//! exchange: `POST {base_url}/predict`. Any failure (connection, timeout,
//! non-2xx, empty or unusable body) comes back as a [`ProviderError`]; the
//! orchestrator decides what to do about it.
//!
//! Includes a fake engine for tests, in the same spirit as the LLM fakes.

use crate::error::ProviderError;
use crate::types::{CanonicalFlightQuery, Prediction, PredictionLabel, PredictionSource};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// Body sent to the provider (field names are the provider's contract)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderRequest {
    #[serde(rename = "companhia_icao")]
    pub carrier: String,
    #[serde(rename = "origem_icao")]
    pub origin: String,
    #[serde(rename = "destino_icao")]
    pub destination: String,
    /// ISO-8601 local date-time, `2025-11-10T14:30:00`
    #[serde(rename = "data_partida")]
    pub departure: String,
    #[serde(rename = "distancia_km")]
    pub distance_km: u32,
}

impl From<&CanonicalFlightQuery> for ProviderRequest {
    fn from(q: &CanonicalFlightQuery) -> Self {
        Self {
            carrier: q.carrier().to_string(),
            origin: q.origin().to_string(),
            destination: q.destination().to_string(),
            departure: q.departure().format("%Y-%m-%dT%H:%M:%S").to_string(),
            distance_km: q.distance_km(),
        }
    }
}

/// Validated provider answer
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPrediction {
    pub label: PredictionLabel,
    pub probability: f64,
    pub explain_global: Option<serde_json::Value>,
    pub explain_local: Option<serde_json::Value>,
}

impl ProviderPrediction {
    pub fn new(label: PredictionLabel, probability: f64) -> Self {
        Self {
            label,
            probability,
            explain_global: None,
            explain_local: None,
        }
    }

    /// Map into the caller-facing shape, values untouched
    pub fn into_prediction(self) -> Prediction {
        Prediction {
            label: self.label,
            probability: self.probability,
            source: PredictionSource::Remote,
            explain_global: self.explain_global,
            explain_local: self.explain_local,
        }
    }

    /// Parse a raw response body.
    ///
    /// Accepts the current contract (`label`/`prediction` + `proba_atraso`)
    /// and the legacy one (`previsao` + `probabilidade`).
    pub fn from_body(body: &str) -> Result<Self, ProviderError> {
        if body.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let raw: Option<RawProviderResponse> = serde_json::from_str(body)
            .map_err(|e| ProviderError::Malformed(format!("invalid JSON: {}", e)))?;
        let raw = raw.ok_or(ProviderError::EmptyResponse)?;

        let probability = raw
            .probability
            .ok_or_else(|| ProviderError::Malformed("missing probability".to_string()))?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(ProviderError::Malformed(format!(
                "probability {} outside [0, 1]",
                probability
            )));
        }

        let label = raw
            .label
            .as_deref()
            .and_then(parse_label)
            .or_else(|| raw.legacy_label.as_deref().and_then(parse_label))
            .or_else(|| raw.prediction.as_ref().and_then(label_from_code))
            .ok_or_else(|| ProviderError::Malformed("no usable label or prediction code".to_string()))?;

        Ok(Self {
            label,
            probability,
            explain_global: raw.explain_global,
            explain_local: raw.explain_local,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawProviderResponse {
    #[serde(default)]
    label: Option<String>,
    #[serde(default, rename = "previsao")]
    legacy_label: Option<String>,
    /// 1/0 code; some providers send it as a float or a string
    #[serde(default)]
    prediction: Option<serde_json::Value>,
    #[serde(default, rename = "proba_atraso", alias = "probabilidade")]
    probability: Option<f64>,
    #[serde(default)]
    explain_global: Option<serde_json::Value>,
    #[serde(default)]
    explain_local: Option<serde_json::Value>,
}

fn parse_label(raw: &str) -> Option<PredictionLabel> {
    match raw.trim().to_lowercase().as_str() {
        "atrasado" | "delayed" | "1" => Some(PredictionLabel::Delayed),
        "pontual" | "no_prazo" | "on_time" | "ontime" | "0" => Some(PredictionLabel::OnTime),
        _ => None,
    }
}

fn label_from_code(code: &serde_json::Value) -> Option<PredictionLabel> {
    match code {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(PredictionLabel::Delayed),
            Some(v) if v == 0.0 => Some(PredictionLabel::OnTime),
            _ => None,
        },
        serde_json::Value::Bool(true) => Some(PredictionLabel::Delayed),
        serde_json::Value::Bool(false) => Some(PredictionLabel::OnTime),
        serde_json::Value::String(s) => parse_label(s),
        _ => None,
    }
}

/// External inference provider
pub trait RemoteEngine: Send + Sync {
    fn get_prediction(&self, request: &ProviderRequest) -> Result<ProviderPrediction, ProviderError>;

    /// Status reporting only, never consulted by the prediction path
    fn is_healthy(&self) -> bool;
}

/// Real provider over blocking HTTP
pub struct HttpRemoteEngine {
    base_url: String,
    timeout: Duration,
    client: reqwest::blocking::Client,
}

impl HttpRemoteEngine {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Inference provider client ready: {}", base_url);

        Ok(Self {
            base_url,
            timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout.as_millis() as u64)
        } else {
            ProviderError::Unreachable(e.to_string())
        }
    }
}

impl RemoteEngine for HttpRemoteEngine {
    fn get_prediction(&self, request: &ProviderRequest) -> Result<ProviderPrediction, ProviderError> {
        let url = format!("{}/predict", self.base_url);
        info!("Calling provider: {} -> {}", request.origin, request.destination);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response.text().map_err(|e| self.map_send_error(e))?;
        let prediction = ProviderPrediction::from_body(&body)?;

        info!(
            "Provider answered: {} ({:.2})",
            prediction.label, prediction.probability
        );
        Ok(prediction)
    }

    fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send() {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("Provider health check returned HTTP {}", resp.status());
                false
            }
            Err(e) => {
                warn!("Provider not responding: {}", e);
                false
            }
        }
    }
}

/// Fake provider for testing
pub struct FakeRemoteEngine {
    responses: Mutex<Vec<Result<ProviderPrediction, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    healthy: bool,
}

impl FakeRemoteEngine {
    /// Responses are returned in order; the last one repeats
    pub fn new(responses: Vec<Result<ProviderPrediction, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    pub fn always_ok(prediction: ProviderPrediction) -> Self {
        Self::new(vec![Ok(prediction)])
    }

    pub fn always_failing(error: ProviderError) -> Self {
        let mut fake = Self::new(vec![Err(error)]);
        fake.healthy = false;
        fake
    }

    pub fn with_health(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl RemoteEngine for FakeRemoteEngine {
    fn get_prediction(&self, request: &ProviderRequest) -> Result<ProviderPrediction, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| ProviderError::Unreachable("fake engine poisoned".to_string()))?;

        match responses.len() {
            0 => Err(ProviderError::EmptyResponse),
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}
