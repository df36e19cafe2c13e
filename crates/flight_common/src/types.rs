//! Domain types shared by the core, the daemon and the CLI.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Probability above which a flight is classified as delayed
pub const DELAY_THRESHOLD: f64 = 0.5;

/// Flight description as received from a caller (short codes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightQuery {
    carrier: String,
    origin: String,
    destination: String,
    departure: NaiveDateTime,
    distance_km: u32,
}

impl FlightQuery {
    pub fn new(
        carrier: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure: NaiveDateTime,
        distance_km: u32,
    ) -> Self {
        Self {
            carrier: carrier.into(),
            origin: origin.into(),
            destination: destination.into(),
            departure,
            distance_km,
        }
    }

    pub fn carrier(&self) -> &str {
        &self.carrier
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn departure(&self) -> NaiveDateTime {
        self.departure
    }

    pub fn distance_km(&self) -> u32 {
        self.distance_km
    }
}

/// Same shape as [`FlightQuery`] with codes in the provider's canonical form.
///
/// Only [`crate::CodeNormalizer`] builds these in production code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalFlightQuery {
    carrier: String,
    origin: String,
    destination: String,
    departure: NaiveDateTime,
    distance_km: u32,
}

impl CanonicalFlightQuery {
    pub fn new(
        carrier: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure: NaiveDateTime,
        distance_km: u32,
    ) -> Self {
        Self {
            carrier: carrier.into(),
            origin: origin.into(),
            destination: destination.into(),
            departure,
            distance_km,
        }
    }

    pub fn carrier(&self) -> &str {
        &self.carrier
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn departure(&self) -> NaiveDateTime {
        self.departure
    }

    pub fn distance_km(&self) -> u32 {
        self.distance_km
    }

    pub fn hour(&self) -> u32 {
        self.departure.hour()
    }

    pub fn month(&self) -> u32 {
        self.departure.month()
    }

    pub fn day(&self) -> u32 {
        self.departure.day()
    }

    pub fn weekday(&self) -> Weekday {
        self.departure.weekday()
    }
}

/// Classification of a flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionLabel {
    OnTime,
    Delayed,
}

impl PredictionLabel {
    /// `Delayed` strictly above the threshold; exactly 0.5 is on time.
    pub fn from_probability(probability: f64) -> Self {
        if probability > DELAY_THRESHOLD {
            PredictionLabel::Delayed
        } else {
            PredictionLabel::OnTime
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionLabel::OnTime => "OnTime",
            PredictionLabel::Delayed => "Delayed",
        }
    }
}

impl fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which path produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Remote,
    Heuristic,
}

impl PredictionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionSource::Remote => "remote",
            PredictionSource::Heuristic => "heuristic",
        }
    }
}

/// Result of a prediction, whichever path produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "prediction")]
    pub label: PredictionLabel,
    pub probability: f64,
    pub source: PredictionSource,
    /// Opaque provider payload, forwarded untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain_global: Option<serde_json::Value>,
    /// Opaque provider payload, forwarded untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain_local: Option<serde_json::Value>,
}

impl Prediction {
    /// Heuristic result: label derived from the probability, no payloads.
    pub fn heuristic(probability: f64) -> Self {
        Self {
            label: PredictionLabel::from_probability(probability),
            probability,
            source: PredictionSource::Heuristic,
            explain_global: None,
            explain_local: None,
        }
    }

    pub fn is_delayed(&self) -> bool {
        self.label == PredictionLabel::Delayed
    }
}
