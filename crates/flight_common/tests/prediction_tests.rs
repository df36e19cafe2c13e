//! Prediction behavior tests
//!
//! Heuristic scenarios and the remote retry/fallback protocol, driven through
//! the public API with FakeRemoteEngine. No network, no sleeping.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use flight_common::{
    CodeNormalizer, FakeRemoteEngine, FlightQuery, HeuristicScorer, NoBackoff, PredictionLabel,
    PredictionOrchestrator, PredictionSource, ProviderError, ProviderPrediction, ScoreFactor,
};
use std::sync::Arc;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn local() -> PredictionOrchestrator {
    PredictionOrchestrator::default()
}

fn failing_remote(engine: Arc<FakeRemoteEngine>) -> PredictionOrchestrator {
    PredictionOrchestrator::default()
        .with_remote(engine)
        .with_backoff(Arc::new(NoBackoff))
}

// ============================================================================
// Heuristic scenarios
// ============================================================================

/// Christmas Eve evening out of Guarulhos on a reputable carrier
#[test]
fn test_holiday_storm_hub_scenario_is_delayed() {
    let q = FlightQuery::new("LA", "GRU", "REC", at(2025, 12, 24, 19, 0), 2100);
    let p = local().predict(&q);

    assert!(p.probability > 0.6, "got {}", p.probability);
    assert_eq!(p.label, PredictionLabel::Delayed);
    assert_eq!(p.source, PredictionSource::Heuristic);
}

/// Early June morning, short hop, reputable carrier, no hubs involved
#[test]
fn test_stable_season_morning_scenario_is_on_time() {
    let q = FlightQuery::new("AZ", "VIX", "CNF", at(2025, 6, 15, 7, 0), 420);
    let p = local().predict(&q);

    assert!(p.probability < 0.4, "got {}", p.probability);
    assert_eq!(p.label, PredictionLabel::OnTime);
}

/// Every aggravating factor at once must still respect the ceiling
#[test]
fn test_maximal_aggravation_is_clamped() {
    // Friday 2025-12-26 18:30 from a hub, long haul, unreliable carrier
    let departure = at(2025, 12, 26, 18, 30);
    assert_eq!(departure.weekday(), chrono::Weekday::Fri);
    let q = FlightQuery::new("G3", "GRU", "SSA", departure, 2500);

    let canonical = CodeNormalizer::default().normalize(&q);
    let breakdown = HeuristicScorer::default().breakdown(&canonical);
    for factor in [
        ScoreFactor::EveningDeparture,
        ScoreFactor::Friday,
        ScoreFactor::LongHaul,
        ScoreFactor::UnreliableCarrier,
        ScoreFactor::HolidayPeak,
        ScoreFactor::StormWindow,
        ScoreFactor::HubCongestion,
    ] {
        assert!(breakdown.has(factor), "expected {:?}", factor);
    }
    assert!(breakdown.raw_points > 95);

    let p = local().predict(&q);
    assert_eq!(p.probability, 0.95);
    assert_eq!(p.label, PredictionLabel::Delayed);
}

/// Neutral query lands exactly on the threshold, which is on time
#[test]
fn test_exact_threshold_is_on_time() {
    // Tuesday afternoon, mid-distance, unlisted carrier and airports
    let q = FlightQuery::new("XX", "VIX", "SSA", at(2025, 3, 11, 14, 0), 1000);
    let p = local().predict(&q);
    assert_eq!(p.probability, 0.5);
    assert_eq!(p.label, PredictionLabel::OnTime);
}

#[test]
fn test_heuristic_bounds_and_label_consistency_hold_everywhere() {
    let scorer = local();
    let carriers = ["G3", "LA", "AZ", "AC", "XX"];
    let routes = [("GRU", "SBJU"), ("VIX", "CNF"), ("CGH", "SDU"), ("REC", "SBPC")];
    let distances = [120, 499, 500, 1500, 1501, 4000];

    let start = at(2025, 1, 1, 0, 0);
    // Every 7 hours over a year covers each hour and weekday
    for step in 0..(365 * 24 / 7) {
        let departure = start + Duration::hours(7 * step);
        for (i, carrier) in carriers.iter().enumerate() {
            let (origin, dest) = routes[(step as usize + i) % routes.len()];
            let km = distances[(step as usize + i) % distances.len()];
            let p = scorer.predict(&FlightQuery::new(*carrier, origin, dest, departure, km));

            assert!((0.10..=0.95).contains(&p.probability), "{} out of range", p.probability);
            assert_eq!(p.probability > 0.5, p.label == PredictionLabel::Delayed);
            // Two decimals exactly
            assert_eq!((p.probability * 100.0).round() / 100.0, p.probability);
        }
    }
}

#[test]
fn test_heuristic_is_deterministic() {
    let q = FlightQuery::new("G3", "GRU", "GIG", at(2025, 11, 20, 14, 30), 350);
    let first = local().predict(&q);
    for _ in 0..10 {
        assert_eq!(local().predict(&q), first);
    }
}

// ============================================================================
// Remote protocol
// ============================================================================

#[test]
fn test_provider_down_still_answers() {
    let engine = Arc::new(FakeRemoteEngine::always_failing(ProviderError::Unreachable(
        "inference service offline".to_string(),
    )));
    let q = FlightQuery::new("G3", "GRU", "GIG", at(2025, 11, 20, 14, 30), 350);

    let p = failing_remote(engine.clone()).predict(&q);

    assert!(p.probability > 0.0);
    assert_eq!(p.source, PredictionSource::Heuristic);
    assert!(engine.call_count() >= 1);
    assert!(engine.call_count() <= 3);
}

#[test]
fn test_malformed_then_valid_response() {
    let engine = Arc::new(FakeRemoteEngine::new(vec![
        Err(ProviderError::Malformed("missing probability".to_string())),
        Err(ProviderError::Status(503)),
        Ok(ProviderPrediction::new(PredictionLabel::Delayed, 0.66)),
    ]));
    let q = FlightQuery::new("LA", "CGH", "SDU", at(2025, 8, 4, 8, 15), 370);

    let trace = failing_remote(engine.clone()).predict_traced(&q);

    assert_eq!(trace.attempts, 3);
    assert_eq!(trace.prediction.source, PredictionSource::Remote);
    assert_eq!(trace.prediction.probability, 0.66);
    assert_eq!(engine.call_count(), 3);
}

#[test]
fn test_remote_probability_is_not_clamped() {
    let engine = Arc::new(FakeRemoteEngine::always_ok(ProviderPrediction::new(
        PredictionLabel::Delayed,
        0.99,
    )));
    let q = FlightQuery::new("G3", "GRU", "GIG", at(2025, 11, 20, 14, 30), 350);

    let p = failing_remote(engine).predict(&q);
    assert_eq!(p.probability, 0.99);
    assert_eq!(p.source, PredictionSource::Remote);
}

#[test]
fn test_health_probe_does_not_touch_predictions() {
    let engine = Arc::new(
        FakeRemoteEngine::always_ok(ProviderPrediction::new(PredictionLabel::OnTime, 0.3)).with_health(false),
    );
    let orchestrator = failing_remote(engine.clone());

    assert_eq!(orchestrator.provider_healthy(), Some(false));
    assert_eq!(engine.call_count(), 0);

    let q = FlightQuery::new("G3", "GRU", "GIG", at(2025, 11, 20, 14, 30), 350);
    assert_eq!(orchestrator.predict(&q).source, PredictionSource::Remote);
}
