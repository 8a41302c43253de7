//! Signal Classifier, Risk Level Classifier, and Confidence Estimator
//!
//! Maps the composite score, outlier score, and percentile return against the
//! configured thresholds to one of three exit states. Each analysis call is
//! classified once; there is no cross-call state.

use std::collections::BTreeMap;

use crate::config::PercentileThresholds;
use crate::error::Result;
use crate::numeric::{clamp_range, finite_or_zero};
use crate::types::{ExitSignal, RiskLevel, SignalKind};

/// Classify one position. First matching branch wins.
pub fn classify(
    scores: &BTreeMap<String, f64>,
    divergence: &BTreeMap<String, f64>,
    stats: &BTreeMap<String, f64>,
    thresholds: &PercentileThresholds,
) -> Result<ExitSignal> {
    let get = |map: &BTreeMap<String, f64>, key: &str| {
        finite_or_zero(map.get(key).copied().unwrap_or(0.0))
    };

    let overall = get(scores, "overall_score");
    let risk_score = get(scores, "risk_score");
    let momentum = get(scores, "momentum_score");
    let outlier = get(divergence, "outlier_score");
    let percentile = get(divergence, "percentile_return");
    let max_drawdown = get(stats, "max_drawdown");
    let win_rate = get(stats, "win_rate");

    let risk = risk_level(risk_score, max_drawdown, win_rate);

    let (kind, confidence, reasoning) = if overall < -50.0
        || outlier > 3.0
        || percentile > thresholds.exit_immediately
    {
        (
            SignalKind::ExitImmediately,
            clamp_range(70.0, 95.0, overall.abs() * 2.0),
            format!(
                "severe deterioration: overall score {:.1} (risk {:.1}, momentum {:.1}), \
                 outlier score {:.2}, return percentile {:.1} vs threshold {:.0}",
                overall, risk_score, momentum, outlier, percentile, thresholds.exit_immediately
            ),
        )
    } else if overall < -20.0 || outlier > 2.0 || percentile > thresholds.exit_soon {
        (
            SignalKind::ExitSoon,
            clamp_range(60.0, 85.0, overall.abs() * 1.5),
            format!(
                "weakening performance: overall score {:.1} (risk {:.1}, momentum {:.1}), \
                 outlier score {:.2}, return percentile {:.1} vs threshold {:.0}",
                overall, risk_score, momentum, outlier, percentile, thresholds.exit_soon
            ),
        )
    } else {
        (
            SignalKind::Hold,
            clamp_range(50.0, 90.0, 100.0 - overall.abs()),
            format!(
                "performance within normal range: overall score {:.1} (risk {:.1}, \
                 momentum {:.1}), outlier score {:.2}, return percentile {:.1}",
                overall, risk_score, momentum, outlier, percentile
            ),
        )
    };

    ExitSignal::new(kind, confidence, reasoning, risk)
}

/// Coarse risk tag, independent of the exit-signal branch taken.
pub fn risk_level(risk_score: f64, max_drawdown: f64, win_rate: f64) -> RiskLevel {
    if risk_score < -30.0 || max_drawdown > 0.30 || win_rate < 0.40 {
        RiskLevel::High
    } else if risk_score < -10.0 || max_drawdown > 0.20 || win_rate < 0.50 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Overall analysis confidence, distinct from the signal's own confidence.
/// Driven by sample size and score magnitude; a non-finite intermediate falls
/// back to 50.
pub fn confidence_level(total_trades: f64, overall_score: f64) -> f64 {
    if !total_trades.is_finite() || !overall_score.is_finite() {
        return 50.0;
    }
    let raw = 70.0
        + (total_trades * 2.0).min(20.0)
        + (100.0 - overall_score.abs() * 0.1) * 0.1
        + 10.0;
    if raw.is_finite() {
        clamp_range(0.0, 100.0, raw)
    } else {
        50.0
    }
}
