//! Component Scorer
//!
//! Combines statistical and divergence metrics into six weighted component
//! scores and one overall composite. Every input passes through the central
//! numeric guard so NaN/infinity can never reach the composite.

use std::collections::BTreeMap;

use crate::numeric::finite_or_zero;

/// Fixed composite weights: risk, momentum, trend, risk-adjusted,
/// mean-reversion, volume.
pub const WEIGHTS: [f64; 6] = [0.25, 0.20, 0.20, 0.15, 0.10, 0.10];

/// Required keys of the component-scores map, checked by the assembler.
pub const REQUIRED_KEYS: &[&str] = &[
    "risk_score",
    "momentum_score",
    "trend_score",
    "risk_adjusted_score",
    "mean_reversion_score",
    "volume_score",
    "overall_score",
];

/// Compute the six component scores plus the overall composite.
pub fn component_scores(
    stats: &BTreeMap<String, f64>,
    divergence: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let stat = |key: &str| finite_or_zero(stats.get(key).copied().unwrap_or(0.0));
    let div = |key: &str| finite_or_zero(divergence.get(key).copied().unwrap_or(0.0));

    let win_rate = stat("win_rate");
    let total_return = stat("total_return");
    let total_trades = stat("total_trades");
    let sharpe = stat("sharpe_ratio");
    let max_drawdown = stat("max_drawdown");
    let calmar = stat("calmar_ratio");
    let return_zscore = div("return_zscore");
    let percentile_return = div("percentile_return");
    let var_95 = div("var_95");

    // Favors high win rate and low divergence, penalizes drawdown.
    let risk_score = win_rate * 50.0 - return_zscore.abs() * 10.0 - max_drawdown * 100.0;

    // Favors high return, high percentile rank, and high Sharpe.
    let momentum_score = total_return * 40.0 + (percentile_return - 50.0) * 0.4 + sharpe * 2.0;

    // Three boolean-to-points checks.
    let mut trend_score = 0.0;
    if total_return > 0.0 {
        trend_score += 20.0;
    }
    if win_rate > 0.5 {
        trend_score += 20.0;
    }
    if sharpe > 1.0 {
        trend_score += 20.0;
    }

    let risk_adjusted_score = sharpe * 20.0 + calmar * 10.0 - var_95.abs() * 100.0;

    // Rewards a small z-score and a percentile rank close to the median.
    let mean_reversion_score = (3.0 - return_zscore.abs().min(3.0)) / 3.0 * 25.0
        + (50.0 - (percentile_return - 50.0).abs()) / 50.0 * 25.0;

    // Saturates at 100 trades.
    let volume_score = total_trades.min(100.0) / 100.0 * 50.0;

    let components = [
        risk_score,
        momentum_score,
        trend_score,
        risk_adjusted_score,
        mean_reversion_score,
        volume_score,
    ];
    let overall_score: f64 = components
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(score, weight)| finite_or_zero(*score) * weight)
        .sum();

    let mut scores = BTreeMap::new();
    scores.insert("risk_score".to_string(), risk_score);
    scores.insert("momentum_score".to_string(), momentum_score);
    scores.insert("trend_score".to_string(), trend_score);
    scores.insert("risk_adjusted_score".to_string(), risk_adjusted_score);
    scores.insert("mean_reversion_score".to_string(), mean_reversion_score);
    scores.insert("volume_score".to_string(), volume_score);
    scores.insert("overall_score".to_string(), overall_score);
    scores
}
