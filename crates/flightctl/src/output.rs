//! Terminal formatting for flightctl. ASCII only.

use flight_common::{CodeNormalizer, PredictionTrace, ScoreBreakdown};
use flight_common::heuristic::BASE_POINTS;
use owo_colors::OwoColorize;
use std::fmt::Write;

const SEPARATOR: &str = "------------------------------------------------------------";

pub fn render_prediction(trace: &PredictionTrace, breakdown: Option<&ScoreBreakdown>) -> String {
    let p = &trace.prediction;
    let mut out = String::new();

    let label = if p.is_delayed() {
        p.label.as_str().bright_red().to_string()
    } else {
        p.label.as_str().bright_green().to_string()
    };
    let _ = writeln!(out, "Prediction:  {}", label);
    let _ = writeln!(out, "Probability: {:.2}", p.probability);
    let _ = writeln!(out, "Source:      {}", p.source.as_str());

    if trace.attempts > 0 {
        let _ = writeln!(out, "Attempts:    {}", trace.attempts);
    }
    if trace.fell_back() {
        let reason = trace.last_error.as_deref().unwrap_or("unknown error");
        let _ = writeln!(out, "{} provider failed ({}), heuristic used", "[NOTE]".yellow(), reason);
    }

    if let Some(b) = breakdown {
        let _ = writeln!(out, "{}", SEPARATOR.dimmed());
        let _ = writeln!(out, "  {:+4}  base", BASE_POINTS);
        for c in &b.components {
            let _ = writeln!(out, "  {:+4}  {}", c.points, c.factor.explanation());
        }
        let _ = writeln!(out, "  ----");
        if b.was_clamped() {
            let _ = writeln!(out, "  {:4}  clamped from {}", b.points, b.raw_points);
        } else {
            let _ = writeln!(out, "  {:4}  total", b.points);
        }
    }

    out
}

pub fn render_codes(normalizer: &CodeNormalizer) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "[CARRIERS]");
    for (short, icao) in normalizer.carriers() {
        let _ = writeln!(out, "  {:<4} -> {}", short, icao.cyan());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[AIRPORTS]");
    for (short, icao) in normalizer.airports() {
        let _ = writeln!(out, "  {:<4} -> {}", short, icao.cyan());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "Unlisted codes are sent to the provider unchanged".dimmed());

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use flight_common::{
        FakeRemoteEngine, FlightQuery, NoBackoff, PredictionOrchestrator, ProviderError,
    };
    use std::sync::Arc;

    fn query() -> FlightQuery {
        let departure = NaiveDate::from_ymd_opt(2025, 12, 26)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap();
        FlightQuery::new("G3", "GRU", "SSA", departure, 2500)
    }

    #[test]
    fn test_render_clamped_breakdown() {
        let orchestrator = PredictionOrchestrator::default();
        let q = query();
        let trace = orchestrator.predict_traced(&q);
        let breakdown = orchestrator
            .scorer()
            .breakdown(&orchestrator.normalizer().normalize(&q));

        let text = render_prediction(&trace, Some(&breakdown));
        assert!(text.contains("Probability: 0.95"));
        assert!(text.contains("Source:      heuristic"));
        assert!(text.contains("clamped from"));
        assert!(text.contains("friday peak"));
        assert!(!text.contains("Attempts"));
    }

    #[test]
    fn test_render_fallback_note() {
        let engine = Arc::new(FakeRemoteEngine::always_failing(ProviderError::Status(502)));
        let orchestrator = PredictionOrchestrator::default()
            .with_remote(engine)
            .with_backoff(Arc::new(NoBackoff));

        let text = render_prediction(&orchestrator.predict_traced(&query()), None);
        assert!(text.contains("Attempts:    3"));
        assert!(text.contains("heuristic used"));
        assert!(text.contains("502"));
    }

    #[test]
    fn test_render_codes_lists_seed_tables() {
        let text = render_codes(&CodeNormalizer::default());
        assert!(text.contains("G3"));
        assert!(text.contains("GLO"));
        assert!(text.contains("GRU"));
        assert!(text.contains("SBGR"));
    }
}
