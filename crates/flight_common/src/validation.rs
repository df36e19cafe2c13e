//! Inbound request validation
//!
//! The orchestrator assumes a structurally valid [`FlightQuery`]. This module
//! is the gate in front of it: it collects every field problem at once so a
//! client can fix a request in one round trip.

use crate::error::{FieldError, ValidationError};
use crate::types::FlightQuery;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Longest route accepted, in kilometers
pub const MAX_DISTANCE_KM: i64 = 20_000;

/// Raw prediction request as sent by clients.
///
/// Fields are optional so that missing ones become field errors rather than
/// a deserialization failure. The legacy Portuguese names are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlightRequest {
    #[serde(default, alias = "companhia")]
    pub carrier: Option<String>,

    #[serde(default, alias = "origem")]
    pub origin: Option<String>,

    #[serde(default, alias = "destino")]
    pub destination: Option<String>,

    /// ISO-8601 local date-time
    #[serde(default, alias = "data_partida")]
    pub departure: Option<String>,

    #[serde(default, alias = "distancia_km")]
    pub distance_km: Option<i64>,
}

impl FlightRequest {
    /// Check every field against `now` and build the query
    pub fn validate(&self, now: NaiveDateTime) -> Result<FlightQuery, ValidationError> {
        let mut errors = Vec::new();

        let carrier = required(&mut errors, "carrier", self.carrier.as_deref());
        if let Some(c) = carrier {
            if !(2..=3).contains(&c.len()) || !c.chars().all(|ch| ch.is_ascii_alphanumeric()) {
                errors.push(FieldError::new("carrier", "must be a 2-3 character airline code"));
            }
        }

        let origin = required(&mut errors, "origin", self.origin.as_deref());
        let destination = required(&mut errors, "destination", self.destination.as_deref());
        for (field, code) in [("origin", origin), ("destination", destination)] {
            if let Some(code) = code {
                if !is_airport_code(code) {
                    errors.push(FieldError::new(field, "must be a 3-4 letter airport code"));
                }
            }
        }

        if let (Some(o), Some(d)) = (origin, destination) {
            if o.eq_ignore_ascii_case(d) {
                errors.push(FieldError::new(
                    "origin",
                    "origin and destination must be different airports",
                ));
            }
        }

        let departure = match self.departure.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push(FieldError::new("departure", "is required"));
                None
            }
            Some(raw) => match parse_departure(raw) {
                Some(dt) if dt > now => Some(dt),
                Some(_) => {
                    errors.push(FieldError::new("departure", "must be in the future"));
                    None
                }
                None => {
                    errors.push(FieldError::new(
                        "departure",
                        "must be an ISO-8601 date-time such as 2025-11-10T14:30:00",
                    ));
                    None
                }
            },
        };

        let distance = match self.distance_km {
            None => {
                errors.push(FieldError::new("distance_km", "is required"));
                None
            }
            Some(d) if d <= 0 => {
                errors.push(FieldError::new("distance_km", "must be positive"));
                None
            }
            Some(d) if d > MAX_DISTANCE_KM => {
                errors.push(FieldError::new(
                    "distance_km",
                    format!("must not exceed {} km", MAX_DISTANCE_KM),
                ));
                None
            }
            Some(d) => u32::try_from(d).ok(),
        };

        match (carrier, origin, destination, departure, distance) {
            (Some(c), Some(o), Some(d), Some(dt), Some(km)) if errors.is_empty() => {
                Ok(FlightQuery::new(c, o, d, dt, km))
            }
            _ => Err(ValidationError(errors)),
        }
    }
}

fn required<'a>(errors: &mut Vec<FieldError>, field: &'static str, value: Option<&'a str>) -> Option<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.push(FieldError::new(field, "must not be blank"));
            None
        }
    }
}

fn is_airport_code(code: &str) -> bool {
    (3..=4).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Local date-time, seconds optional. An explicit offset is dropped: the
/// wall-clock time is what the heuristic and the provider reason about.
pub fn parse_departure(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    raw.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
}
