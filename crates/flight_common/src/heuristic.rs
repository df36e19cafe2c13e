//! Deterministic delay heuristic.
//!
//! Scores a canonical query from calendar, distance, carrier and airport
//! signals. Used as the default local mode and as the fallback whenever the
//! inference provider cannot answer.
//!
//! The score is kept in integer hundredths: every factor moves it by a whole
//! number of points, so the final two-decimal probability is exact and the
//! result never depends on the order factors are applied in.

use crate::types::{CanonicalFlightQuery, Prediction};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Neutral starting point (0.50)
pub const BASE_POINTS: i16 = 50;
/// Lower clamp (0.10)
pub const MIN_POINTS: i16 = 10;
/// Upper clamp (0.95)
pub const MAX_POINTS: i16 = 95;

const SHORT_HAUL_KM: u32 = 500;
const LONG_HAUL_KM: u32 = 1500;

/// A rule that moved the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    MorningDeparture,
    EveningDeparture,
    Weekend,
    Friday,
    ShortHaul,
    LongHaul,
    ReputableCarrier,
    UnreliableCarrier,
    HolidayPeak,
    HolidayShortHaul,
    StormWindow,
    HubCongestion,
    LowTrafficDestination,
    StableSeason,
}

impl ScoreFactor {
    /// Adjustment in hundredths of probability
    pub fn points(&self) -> i16 {
        match self {
            Self::MorningDeparture => -20,
            Self::EveningDeparture => 20,
            Self::Weekend => -10,
            Self::Friday => 15,
            Self::ShortHaul => -10,
            Self::LongHaul => 10,
            Self::ReputableCarrier => -5,
            Self::UnreliableCarrier => 5,
            Self::HolidayPeak => 20,
            Self::HolidayShortHaul => 8,
            Self::StormWindow => 15,
            Self::HubCongestion => 18,
            Self::LowTrafficDestination => -10,
            Self::StableSeason => -8,
        }
    }

    /// Single-line explanation, lowercase start
    pub fn explanation(&self) -> &'static str {
        match self {
            Self::MorningDeparture => "morning departure",
            Self::EveningDeparture => "evening departure",
            Self::Weekend => "weekend traffic",
            Self::Friday => "friday peak",
            Self::ShortHaul => "short-haul route",
            Self::LongHaul => "long-haul route",
            Self::ReputableCarrier => "carrier with good punctuality record",
            Self::UnreliableCarrier => "carrier with poor punctuality record",
            Self::HolidayPeak => "year-end holiday demand",
            Self::HolidayShortHaul => "short hop during holidays, cascading delays",
            Self::StormWindow => "summer storm window",
            Self::HubCongestion => "departing from a congested hub",
            Self::LowTrafficDestination => "low-traffic destination off-peak",
            Self::StableSeason => "stable weather season",
        }
    }
}

/// One applied factor with its signed adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreComponent {
    pub factor: ScoreFactor,
    pub points: i16,
}

/// Full account of a heuristic score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub components: Vec<ScoreComponent>,
    /// Unclamped sum in hundredths
    pub raw_points: i16,
    /// Clamped sum in hundredths
    pub points: i16,
}

impl ScoreBreakdown {
    pub fn probability(&self) -> f64 {
        f64::from(self.points) / 100.0
    }

    pub fn was_clamped(&self) -> bool {
        self.raw_points != self.points
    }

    pub fn has(&self, factor: ScoreFactor) -> bool {
        self.components.iter().any(|c| c.factor == factor)
    }
}

/// Carrier and airport sets the heuristic consults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicTables {
    #[serde(default = "default_positive_carriers")]
    pub positive_carriers: BTreeSet<String>,

    #[serde(default = "default_negative_carriers")]
    pub negative_carriers: BTreeSet<String>,

    /// High-traffic origins
    #[serde(default = "default_hub_airports")]
    pub hub_airports: BTreeSet<String>,

    /// Well-run destinations with spare capacity
    #[serde(default = "default_low_traffic_airports")]
    pub low_traffic_airports: BTreeSet<String>,
}

fn set(codes: &[&str]) -> BTreeSet<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

fn default_positive_carriers() -> BTreeSet<String> {
    set(&["AZU", "TAM", "AFR"])
}

fn default_negative_carriers() -> BTreeSet<String> {
    set(&["GLO", "ACN"])
}

fn default_hub_airports() -> BTreeSet<String> {
    set(&["SBGR", "SBSP", "SBRJ", "SBGL", "SBBR"])
}

fn default_low_traffic_airports() -> BTreeSet<String> {
    set(&["SBJU", "SBCJ", "SBCR", "SBAT", "SBPC"])
}

impl Default for HeuristicTables {
    fn default() -> Self {
        Self {
            positive_carriers: default_positive_carriers(),
            negative_carriers: default_negative_carriers(),
            hub_airports: default_hub_airports(),
            low_traffic_airports: default_low_traffic_airports(),
        }
    }
}

/// Pure scorer over immutable tables
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    tables: HeuristicTables,
}

impl HeuristicScorer {
    pub fn new(tables: HeuristicTables) -> Self {
        let fold = |s: BTreeSet<String>| s.into_iter().map(|c| c.trim().to_uppercase()).collect();
        Self {
            tables: HeuristicTables {
                positive_carriers: fold(tables.positive_carriers),
                negative_carriers: fold(tables.negative_carriers),
                hub_airports: fold(tables.hub_airports),
                low_traffic_airports: fold(tables.low_traffic_airports),
            },
        }
    }

    pub fn tables(&self) -> &HeuristicTables {
        &self.tables
    }

    pub fn score(&self, query: &CanonicalFlightQuery) -> Prediction {
        Prediction::heuristic(self.breakdown(query).probability())
    }

    /// Every factor that fires for `query`, with the resulting score
    pub fn breakdown(&self, query: &CanonicalFlightQuery) -> ScoreBreakdown {
        let factors = self.factors(query);
        let components: Vec<ScoreComponent> = factors
            .into_iter()
            .map(|factor| ScoreComponent {
                factor,
                points: factor.points(),
            })
            .collect();

        let raw_points = BASE_POINTS + components.iter().map(|c| c.points).sum::<i16>();

        ScoreBreakdown {
            components,
            raw_points,
            points: raw_points.clamp(MIN_POINTS, MAX_POINTS),
        }
    }

    fn factors(&self, query: &CanonicalFlightQuery) -> Vec<ScoreFactor> {
        let mut out = Vec::new();
        let time = query.departure().time();
        let hour = query.hour();
        let month = query.month();
        let distance = query.distance_km();
        let short_haul = distance < SHORT_HAUL_KM;

        // Time of day
        if time < hm(12, 0) {
            out.push(ScoreFactor::MorningDeparture);
        } else if time > hm(18, 0) {
            out.push(ScoreFactor::EveningDeparture);
        }

        // Day of week
        match query.weekday() {
            Weekday::Sat | Weekday::Sun => out.push(ScoreFactor::Weekend),
            Weekday::Fri => out.push(ScoreFactor::Friday),
            _ => {}
        }

        // Distance
        if short_haul {
            out.push(ScoreFactor::ShortHaul);
        } else if distance > LONG_HAUL_KM {
            out.push(ScoreFactor::LongHaul);
        }

        // Carrier reputation
        let carrier = query.carrier().to_uppercase();
        if self.tables.positive_carriers.contains(&carrier) {
            out.push(ScoreFactor::ReputableCarrier);
        } else if self.tables.negative_carriers.contains(&carrier) {
            out.push(ScoreFactor::UnreliableCarrier);
        }

        // Year-end holidays
        if month == 12 && query.day() >= 20 {
            out.push(ScoreFactor::HolidayPeak);
            if short_haul {
                out.push(ScoreFactor::HolidayShortHaul);
            }
        }

        // Southern-hemisphere summer storms hit late afternoon
        if matches!(month, 12 | 1 | 2) && (16..=20).contains(&hour) {
            out.push(ScoreFactor::StormWindow);
        }

        if self
            .tables
            .hub_airports
            .contains(&query.origin().to_uppercase())
        {
            out.push(ScoreFactor::HubCongestion);
        }

        // Mitigating factors
        if self
            .tables
            .low_traffic_airports
            .contains(&query.destination().to_uppercase())
            && time > hm(10, 0)
            && time < hm(15, 0)
        {
            out.push(ScoreFactor::LowTrafficDestination);
        }

        if (5..=8).contains(&month) {
            out.push(ScoreFactor::StableSeason);
        }

        out
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new(HeuristicTables::default())
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PredictionLabel;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn query(carrier: &str, origin: &str, dest: &str, dt: NaiveDateTime, km: u32) -> CanonicalFlightQuery {
        CanonicalFlightQuery::new(carrier, origin, dest, dt, km)
    }

    #[test]
    fn test_neutral_query_scores_base() {
        // Tuesday 2025-03-11 at 14:00, mid-distance, unknown carrier and airports
        let q = query("XYZ", "SBXX", "SBYY", at(2025, 3, 11, 14, 0), 1000);
        let b = HeuristicScorer::default().breakdown(&q);
        assert!(b.components.is_empty());
        assert_eq!(b.points, 50);
        assert_eq!(HeuristicScorer::default().score(&q).label, PredictionLabel::OnTime);
    }

    #[test]
    fn test_time_boundaries_are_strict() {
        let scorer = HeuristicScorer::default();
        let noon = scorer.breakdown(&query("XYZ", "A", "B", at(2025, 3, 11, 12, 0), 1000));
        assert!(!noon.has(ScoreFactor::MorningDeparture));

        let six = scorer.breakdown(&query("XYZ", "A", "B", at(2025, 3, 11, 18, 0), 1000));
        assert!(!six.has(ScoreFactor::EveningDeparture));

        let six_thirty = scorer.breakdown(&query("XYZ", "A", "B", at(2025, 3, 11, 18, 30), 1000));
        assert!(six_thirty.has(ScoreFactor::EveningDeparture));
    }

    #[test]
    fn test_holiday_short_haul_cascade() {
        // Monday 2025-12-22 09:00, 300 km
        let b = HeuristicScorer::default().breakdown(&query("XYZ", "A", "B", at(2025, 12, 22, 9, 0), 300));
        assert!(b.has(ScoreFactor::HolidayPeak));
        assert!(b.has(ScoreFactor::HolidayShortHaul));
        // 50 - 20 (morning) - 10 (short) + 20 + 8
        assert_eq!(b.points, 48);
    }

    #[test]
    fn test_low_traffic_window() {
        let scorer = HeuristicScorer::default();
        let inside = scorer.breakdown(&query("XYZ", "A", "SBJU", at(2025, 3, 11, 10, 30), 1000));
        assert!(inside.has(ScoreFactor::LowTrafficDestination));

        let at_ten = scorer.breakdown(&query("XYZ", "A", "SBJU", at(2025, 3, 11, 10, 0), 1000));
        assert!(!at_ten.has(ScoreFactor::LowTrafficDestination));

        let at_three = scorer.breakdown(&query("XYZ", "A", "SBJU", at(2025, 3, 11, 15, 0), 1000));
        assert!(!at_three.has(ScoreFactor::LowTrafficDestination));
    }

    #[test]
    fn test_storm_window_inclusive_hours() {
        let scorer = HeuristicScorer::default();
        let b = scorer.breakdown(&query("XYZ", "A", "B", at(2026, 1, 14, 20, 45), 1000));
        assert!(b.has(ScoreFactor::StormWindow));
        let b = scorer.breakdown(&query("XYZ", "A", "B", at(2026, 3, 14, 17, 0), 1000));
        assert!(!b.has(ScoreFactor::StormWindow));
    }

    #[test]
    fn test_tables_are_case_insensitive() {
        let tables = HeuristicTables {
            hub_airports: set(&["sbkp"]),
            ..Default::default()
        };
        let b = HeuristicScorer::new(tables).breakdown(&query("xyz", "SBKP", "B", at(2025, 3, 11, 14, 0), 1000));
        assert!(b.has(ScoreFactor::HubCongestion));
    }

    #[test]
    fn test_weekend_and_friday() {
        let scorer = HeuristicScorer::default();
        // 2025-03-14 Friday, 15 Saturday, 16 Sunday, 17 Monday
        let friday = scorer.breakdown(&query("XYZ", "A", "B", at(2025, 3, 14, 14, 0), 1000));
        assert!(friday.has(ScoreFactor::Friday));
        assert!(!friday.has(ScoreFactor::Weekend));

        for day in [15, 16] {
            let b = scorer.breakdown(&query("XYZ", "A", "B", at(2025, 3, day, 14, 0), 1000));
            assert!(b.has(ScoreFactor::Weekend), "day {}", day);
            assert!(!b.has(ScoreFactor::Friday));
            assert_eq!(b.points, 40);
        }

        let monday = scorer.breakdown(&query("XYZ", "A", "B", at(2025, 3, 17, 14, 0), 1000));
        assert!(monday.components.is_empty());
    }

    #[test]
    fn test_distance_boundaries() {
        let scorer = HeuristicScorer::default();
        let km = |d: u32| scorer.breakdown(&query("XYZ", "A", "B", at(2025, 3, 11, 14, 0), d));

        assert!(km(499).has(ScoreFactor::ShortHaul));
        assert_eq!(km(499).points, 40);
        assert!(km(500).components.is_empty());
        assert!(km(1500).components.is_empty());
        assert!(km(1501).has(ScoreFactor::LongHaul));
        assert_eq!(km(1501).points, 60);
    }

    #[test]
    fn test_carrier_reputation() {
        let scorer = HeuristicScorer::default();
        let good = scorer.breakdown(&query("AZU", "A", "B", at(2025, 3, 11, 14, 0), 1000));
        assert!(good.has(ScoreFactor::ReputableCarrier));
        assert_eq!(good.points, 45);

        let bad = scorer.breakdown(&query("ACN", "A", "B", at(2025, 3, 11, 14, 0), 1000));
        assert!(bad.has(ScoreFactor::UnreliableCarrier));
        assert_eq!(bad.points, 55);

        let unlisted = scorer.breakdown(&query("XYZ", "A", "B", at(2025, 3, 11, 14, 0), 1000));
        assert!(!unlisted.has(ScoreFactor::ReputableCarrier));
        assert!(!unlisted.has(ScoreFactor::UnreliableCarrier));
    }

    #[test]
    fn test_stable_season_months() {
        let scorer = HeuristicScorer::default();
        for month in 5..=8 {
            let b = scorer.breakdown(&query("XYZ", "A", "B", at(2025, month, 12, 14, 0), 1000));
            assert!(b.has(ScoreFactor::StableSeason), "month {}", month);
        }
        for month in [4, 9] {
            let b = scorer.breakdown(&query("XYZ", "A", "B", at(2025, month, 12, 14, 0), 1000));
            assert!(!b.has(ScoreFactor::StableSeason), "month {}", month);
        }
    }

    #[test]
    fn test_clamp_reports_raw_sum() {
        // Friday 2025-12-26 19:00 from a hub, long haul, unreliable carrier
        let b = HeuristicScorer::default().breakdown(&query("GLO", "SBGR", "SBRF", at(2025, 12, 26, 19, 0), 2000));
        assert_eq!(b.raw_points, 50 + 20 + 15 + 10 + 5 + 20 + 15 + 18);
        assert_eq!(b.points, MAX_POINTS);
        assert!(b.was_clamped());
    }
}
