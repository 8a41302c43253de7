//! Divergence Detector
//!
//! Builds a parametric reference return distribution and measures how unusual
//! the position's performance is relative to it: z-scores, percentile ranks,
//! Value-at-Risk estimates, an aggregate outlier score, and a convergence
//! score.
//!
//! The reference distribution is always synthesized from the position's own
//! summary numbers, even when `use_trade_history` is set; real trade-level
//! history is not consumed here. The per-metric z-scores are standard scores
//! of a single observation and therefore evaluate to zero today.

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;
use std::collections::BTreeMap;

use crate::config::{AnalyzerConfig, OutlierMethod};
use crate::numeric::finite_or_zero;

/// Standard deviation of the synthesized reference distribution.
const REFERENCE_STD: f64 = 0.1;

/// Required keys of the divergence-metrics map, checked by the assembler.
pub const REQUIRED_KEYS: &[&str] = &[
    "return_zscore",
    "win_rate_zscore",
    "sharpe_zscore",
    "percentile_return",
    "win_rate_percentile",
    "var_95",
    "var_99",
    "outlier_score",
    "convergence_score",
];

pub struct DivergenceDetector {
    method: OutlierMethod,
    min_sample_size: u32,
}

impl DivergenceDetector {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            method: config.outlier_method,
            min_sample_size: config.min_sample_size.max(10),
        }
    }

    /// Compute divergence metrics with a fresh entropy-seeded RNG.
    pub fn analyze(&self, stats: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let mut rng = StdRng::from_entropy();
        self.analyze_with_rng(stats, &mut rng)
    }

    /// Compute divergence metrics with a caller-supplied RNG. Tests seed this
    /// to make the sampled reference distribution deterministic.
    pub fn analyze_with_rng<R: Rng>(
        &self,
        stats: &BTreeMap<String, f64>,
        rng: &mut R,
    ) -> BTreeMap<String, f64> {
        let get = |key: &str| finite_or_zero(stats.get(key).copied().unwrap_or(0.0));

        let total_return = get("total_return");
        let total_trades = get("total_trades").max(0.0);
        let win_rate = get("win_rate");
        let sharpe_ratio = get("sharpe_ratio");

        // Reference distribution parameterized from the position's own
        // summary: per-trade mean return with a fixed dispersion.
        let mean_return = total_return / total_trades.max(1.0);
        let sample_count = (total_trades as usize).max(self.min_sample_size as usize);
        let samples = draw_reference_samples(mean_return, sample_count, rng);

        let return_zscore = zscore(total_return, &[total_return]);
        let win_rate_zscore = zscore(win_rate, &[win_rate]);
        let sharpe_zscore = zscore(sharpe_ratio, &[sharpe_ratio]);

        // Rank the observed per-trade return against the sampled distribution.
        let percentile_return = percentile_rank(&samples, mean_return);
        let win_rate_percentile = win_rate * 100.0;

        let mut sorted = samples;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let var_95 = empirical_percentile(&sorted, 5.0);
        let var_99 = empirical_percentile(&sorted, 1.0);

        let outlier_score = self.outlier_score(return_zscore, win_rate_zscore, sharpe_zscore);
        let convergence_score = (percentile_return / 100.0).min(1.0);

        let mut metrics = BTreeMap::new();
        metrics.insert("return_zscore".to_string(), return_zscore);
        metrics.insert("win_rate_zscore".to_string(), win_rate_zscore);
        metrics.insert("sharpe_zscore".to_string(), sharpe_zscore);
        metrics.insert("percentile_return".to_string(), percentile_return);
        metrics.insert("win_rate_percentile".to_string(), win_rate_percentile);
        metrics.insert("var_95".to_string(), var_95);
        metrics.insert("var_99".to_string(), var_99);
        metrics.insert("outlier_score".to_string(), outlier_score);
        metrics.insert("convergence_score".to_string(), convergence_score);
        metrics
    }

    /// Aggregate outlier score. `iqr` and `isolation` are accepted by the
    /// config surface but currently share the z-score path.
    fn outlier_score(&self, return_z: f64, win_rate_z: f64, sharpe_z: f64) -> f64 {
        match self.method {
            OutlierMethod::ZScore | OutlierMethod::Iqr | OutlierMethod::Isolation => {
                return_z.abs() + win_rate_z.abs() + sharpe_z.abs()
            }
        }
    }
}

fn draw_reference_samples<R: Rng>(mean: f64, count: usize, rng: &mut R) -> Vec<f64> {
    let normal = Normal::new(finite_or_zero(mean), REFERENCE_STD)
        .unwrap_or_else(|_| Normal::new(0.0, REFERENCE_STD).expect("constant parameters"));
    (0..count).map(|_| normal.sample(rng)).collect()
}

/// Standard score of `value` against `sample`. A zero-variance sample (the
/// single-observation case) yields 0 rather than NaN.
fn zscore(value: f64, sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    let mean = sample.iter().sum::<f64>() / sample.len() as f64;
    let variance =
        sample.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / sample.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev > 0.0 {
        (value - mean) / std_dev
    } else {
        0.0
    }
}

/// Percentage of samples strictly below `value`.
fn percentile_rank(samples: &[f64], value: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let below = samples.iter().filter(|&&s| s < value).count();
    below as f64 / samples.len() as f64 * 100.0
}

/// Nearest-rank percentile of an ascending-sorted slice.
fn empirical_percentile(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
