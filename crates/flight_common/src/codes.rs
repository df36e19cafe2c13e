//! Short-code to canonical-code normalization
//!
//! Callers send IATA codes (`G3`, `GRU`); the inference provider expects ICAO
//! codes (`GLO`, `SBGR`). Lookups are case-insensitive and an unknown code
//! passes through, trimmed and upper-cased.

use crate::types::{CanonicalFlightQuery, FlightQuery};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// IATA -> ICAO tables, loaded from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTables {
    #[serde(default = "default_airports")]
    pub airports: BTreeMap<String, String>,

    #[serde(default = "default_carriers")]
    pub carriers: BTreeMap<String, String>,
}

fn table(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_airports() -> BTreeMap<String, String> {
    table(&[
        ("GRU", "SBGR"),
        ("CGH", "SBSP"),
        ("GIG", "SBGL"),
        ("SDU", "SBRJ"),
        ("REC", "SBRF"),
        ("CNF", "SBCF"),
    ])
}

fn default_carriers() -> BTreeMap<String, String> {
    table(&[
        // Domestic
        ("AZ", "AZU"),
        ("G3", "GLO"),
        ("LA", "TAM"),
        ("AD", "AZU"),
        // International carriers serving Brazil
        ("AC", "ACN"),
        ("UX", "AEA"),
        ("AF", "AFR"),
        ("AM", "AMX"),
        ("AR", "ARG"),
        ("AV", "AVA"),
        ("BA", "BAW"),
        ("CM", "CMP"),
        ("DL", "DAL"),
        ("IB", "IBE"),
        ("KL", "KLM"),
        ("LH", "DLH"),
        ("TP", "TAP"),
        ("UA", "UAL"),
    ])
}

impl Default for CodeTables {
    fn default() -> Self {
        Self {
            airports: default_airports(),
            carriers: default_carriers(),
        }
    }
}

/// Read-only code lookup shared by every request
#[derive(Debug, Clone)]
pub struct CodeNormalizer {
    airports: BTreeMap<String, String>,
    carriers: BTreeMap<String, String>,
}

impl CodeNormalizer {
    pub fn new(tables: CodeTables) -> Self {
        // Keys are matched upper-case, so fold them once here
        let fold = |m: BTreeMap<String, String>| {
            m.into_iter()
                .map(|(k, v)| (k.trim().to_uppercase(), v.trim().to_uppercase()))
                .collect()
        };
        Self {
            airports: fold(tables.airports),
            carriers: fold(tables.carriers),
        }
    }

    pub fn airport(&self, code: &str) -> String {
        lookup(&self.airports, code)
    }

    pub fn carrier(&self, code: &str) -> String {
        lookup(&self.carriers, code)
    }

    pub fn is_supported_carrier(&self, code: &str) -> bool {
        self.carriers.contains_key(&code.trim().to_uppercase())
    }

    pub fn is_supported_airport(&self, code: &str) -> bool {
        self.airports.contains_key(&code.trim().to_uppercase())
    }

    /// Supported carrier mappings, sorted by short code
    pub fn carriers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.carriers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Supported airport mappings, sorted by short code
    pub fn airports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.airports.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn normalize(&self, query: &FlightQuery) -> CanonicalFlightQuery {
        let canonical = CanonicalFlightQuery::new(
            self.carrier(query.carrier()),
            self.airport(query.origin()),
            self.airport(query.destination()),
            query.departure(),
            query.distance_km(),
        );

        debug!(
            "Codes: {} -> {}, {} -> {}, {} -> {}",
            query.carrier(),
            canonical.carrier(),
            query.origin(),
            canonical.origin(),
            query.destination(),
            canonical.destination()
        );

        canonical
    }
}

impl Default for CodeNormalizer {
    fn default() -> Self {
        Self::new(CodeTables::default())
    }
}

fn lookup(map: &BTreeMap<String, String>, code: &str) -> String {
    let key = code.trim().to_uppercase();
    match map.get(&key) {
        Some(canonical) => canonical.clone(),
        None => key,
    }
}
