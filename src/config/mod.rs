//! Configuration management for ExitWatch
//!
//! Loads from optional YAML/TOML files + environment variables via .env,
//! mirroring every recognized analyzer option. A request may carry overrides;
//! those produce a new validated instance rather than mutating a shared one.

use anyhow::{Context, Result as AnyResult};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AnalyzerError, Result};

/// Percentile thresholds driving the signal classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileThresholds {
    /// Percentile-return above which the signal is EXIT_IMMEDIATELY
    pub exit_immediately: f64,
    /// Percentile-return above which the signal is EXIT_SOON
    pub exit_soon: f64,
    /// Percentile-return above which the position deserves closer monitoring
    pub monitor: f64,
}

impl Default for PercentileThresholds {
    fn default() -> Self {
        Self {
            exit_immediately: 95.0,
            exit_soon: 85.0,
            monitor: 70.0,
        }
    }
}

/// Requested confidence tier for reporting purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

/// Outlier detection method.
///
/// Only `zscore` has distinct behavior today; `iqr` and `isolation` are
/// accepted by validation but fall through to the z-score path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    ZScore,
    Iqr,
    Isolation,
}

/// Full analyzer configuration.
///
/// Validated once at construction; read-only for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub percentile_thresholds: PercentileThresholds,
    /// Convergence score above which a position is considered converged, (0, 1]
    pub convergence_threshold: f64,
    /// Minimum sample size for the reference distribution, >= 1
    pub min_sample_size: u32,
    /// Requested confidence tier
    pub confidence_tier: ConfidenceTier,
    /// Prefer real trade-history data when available. The detector currently
    /// always synthesizes a parametric distribution; the flag only flows into
    /// the data-source availability map.
    pub use_trade_history: bool,
    /// Directories searched for portfolio/trade-history/equity files
    pub search_paths: Vec<String>,
    /// Z-score magnitude treated as anomalous
    pub zscore_threshold: f64,
    /// Bootstrap iteration count for resampling-based estimates
    pub bootstrap_iterations: u32,
    pub outlier_method: OutlierMethod,
    /// Drawdown above this fraction is flagged, (0, 1]
    pub max_drawdown_threshold: f64,
    /// Win rate below this fraction is flagged, (0, 1]
    pub min_win_rate: f64,
    /// Trade count below this is considered a thin sample
    pub min_trades: u32,
    /// Accepted but not consulted by the engine
    pub enable_cache: bool,
    /// Accepted but not consulted by the engine
    pub enable_parallel: bool,
    /// Output format hint for the export collaborator
    pub output_format: String,
    /// Export directory hint for the export collaborator
    pub export_dir: String,
    pub verbose: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            percentile_thresholds: PercentileThresholds::default(),
            convergence_threshold: 0.8,
            min_sample_size: 10,
            confidence_tier: ConfidenceTier::Medium,
            use_trade_history: false,
            search_paths: vec!["./data".to_string()],
            zscore_threshold: 2.0,
            bootstrap_iterations: 1000,
            outlier_method: OutlierMethod::ZScore,
            max_drawdown_threshold: 0.25,
            min_win_rate: 0.40,
            min_trades: 10,
            enable_cache: false,
            enable_parallel: false,
            output_format: "json".to_string(),
            export_dir: "./exports".to_string(),
            verbose: false,
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from file and environment
    pub fn load() -> AnyResult<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("percentile_thresholds.exit_immediately", 95.0)?
            .set_default("percentile_thresholds.exit_soon", 85.0)?
            .set_default("percentile_thresholds.monitor", 70.0)?
            .set_default("convergence_threshold", 0.8)?
            .set_default("min_sample_size", 10)?
            .set_default("confidence_tier", "medium")?
            .set_default("use_trade_history", false)?
            .set_default("search_paths", vec!["./data"])?
            .set_default("zscore_threshold", 2.0)?
            .set_default("bootstrap_iterations", 1000)?
            .set_default("outlier_method", "zscore")?
            .set_default("max_drawdown_threshold", 0.25)?
            .set_default("min_win_rate", 0.40)?
            .set_default("min_trades", 10)?
            .set_default("enable_cache", false)?
            .set_default("enable_parallel", false)?
            .set_default("output_format", "json")?
            .set_default("export_dir", "./exports")?
            .set_default("verbose", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (EXITWATCH_*)
            .add_source(Environment::with_prefix("EXITWATCH").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let cfg: AnalyzerConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        cfg.validate().context("Invalid configuration")?;
        Ok(cfg)
    }

    /// Range checks, run once at construction.
    pub fn validate(&self) -> Result<()> {
        let t = &self.percentile_thresholds;
        for (name, value) in [
            ("exit_immediately", t.exit_immediately),
            ("exit_soon", t.exit_soon),
            ("monitor", t.monitor),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(AnalyzerError::InvalidConfig(format!(
                    "percentile_thresholds.{} = {} outside [0, 100]",
                    name, value
                )));
            }
        }
        if t.exit_immediately <= t.exit_soon {
            return Err(AnalyzerError::InvalidConfig(format!(
                "exit_immediately ({}) must exceed exit_soon ({})",
                t.exit_immediately, t.exit_soon
            )));
        }
        if !(self.convergence_threshold > 0.0 && self.convergence_threshold <= 1.0) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "convergence_threshold = {} outside (0, 1]",
                self.convergence_threshold
            )));
        }
        if self.min_sample_size < 1 {
            return Err(AnalyzerError::InvalidConfig(
                "min_sample_size must be >= 1".to_string(),
            ));
        }
        if !(self.max_drawdown_threshold > 0.0 && self.max_drawdown_threshold <= 1.0) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "max_drawdown_threshold = {} outside (0, 1]",
                self.max_drawdown_threshold
            )));
        }
        if !(self.min_win_rate > 0.0 && self.min_win_rate <= 1.0) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "min_win_rate = {} outside (0, 1]",
                self.min_win_rate
            )));
        }
        if self.bootstrap_iterations < 1 {
            return Err(AnalyzerError::InvalidConfig(
                "bootstrap_iterations must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a new configuration with the given dotted-path overrides applied.
    /// The receiver is left untouched.
    pub fn with_overrides(&self, overrides: &BTreeMap<String, String>) -> Result<Self> {
        let mut cfg = self.clone();
        for (key, value) in overrides {
            cfg.apply_override(key, value)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_override(&mut self, key: &str, value: &str) -> Result<()> {
        let bad = |key: &str, value: &str| {
            AnalyzerError::InvalidConfig(format!("cannot parse '{}' for option '{}'", value, key))
        };
        match key {
            "percentile_thresholds.exit_immediately" => {
                self.percentile_thresholds.exit_immediately =
                    value.parse().map_err(|_| bad(key, value))?;
            }
            "percentile_thresholds.exit_soon" => {
                self.percentile_thresholds.exit_soon = value.parse().map_err(|_| bad(key, value))?;
            }
            "percentile_thresholds.monitor" => {
                self.percentile_thresholds.monitor = value.parse().map_err(|_| bad(key, value))?;
            }
            "convergence_threshold" => {
                self.convergence_threshold = value.parse().map_err(|_| bad(key, value))?;
            }
            "min_sample_size" => {
                self.min_sample_size = value.parse().map_err(|_| bad(key, value))?;
            }
            "confidence_tier" => {
                self.confidence_tier = match value.to_lowercase().as_str() {
                    "low" => ConfidenceTier::Low,
                    "medium" => ConfidenceTier::Medium,
                    "high" => ConfidenceTier::High,
                    _ => return Err(bad(key, value)),
                };
            }
            "use_trade_history" => {
                self.use_trade_history = value.parse().map_err(|_| bad(key, value))?;
            }
            "search_paths" => {
                self.search_paths = value.split(',').map(|s| s.trim().to_string()).collect();
            }
            "zscore_threshold" => {
                self.zscore_threshold = value.parse().map_err(|_| bad(key, value))?;
            }
            "bootstrap_iterations" => {
                self.bootstrap_iterations = value.parse().map_err(|_| bad(key, value))?;
            }
            "outlier_method" => {
                self.outlier_method = match value.to_lowercase().as_str() {
                    "zscore" => OutlierMethod::ZScore,
                    "iqr" => OutlierMethod::Iqr,
                    "isolation" => OutlierMethod::Isolation,
                    _ => return Err(bad(key, value)),
                };
            }
            "max_drawdown_threshold" => {
                self.max_drawdown_threshold = value.parse().map_err(|_| bad(key, value))?;
            }
            "min_win_rate" => {
                self.min_win_rate = value.parse().map_err(|_| bad(key, value))?;
            }
            "min_trades" => {
                self.min_trades = value.parse().map_err(|_| bad(key, value))?;
            }
            "enable_cache" => {
                self.enable_cache = value.parse().map_err(|_| bad(key, value))?;
            }
            "enable_parallel" => {
                self.enable_parallel = value.parse().map_err(|_| bad(key, value))?;
            }
            "output_format" => {
                self.output_format = value.to_string();
            }
            "export_dir" => {
                self.export_dir = value.to_string();
            }
            "verbose" => {
                self.verbose = value.parse().map_err(|_| bad(key, value))?;
            }
            _ => {
                return Err(AnalyzerError::InvalidConfig(format!(
                    "unrecognized option '{}'",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Version tag stamped onto every analysis result.
    pub fn version_tag(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "thresholds={:.0}/{:.0}/{:.0} method={:?} min_sample={} trade_history={}",
            self.percentile_thresholds.exit_immediately,
            self.percentile_thresholds.exit_soon,
            self.percentile_thresholds.monitor,
            self.outlier_method,
            self.min_sample_size,
            self.use_trade_history
        )
    }
}

impl std::fmt::Display for AnalyzerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AnalyzerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_ordering_enforced() {
        let mut cfg = AnalyzerConfig::default();
        cfg.percentile_thresholds.exit_immediately = 80.0;
        cfg.percentile_thresholds.exit_soon = 85.0;
        assert!(cfg.validate().is_err());

        // Equal is also rejected
        cfg.percentile_thresholds.exit_immediately = 85.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_range_checks() {
        let mut cfg = AnalyzerConfig::default();
        cfg.convergence_threshold = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalyzerConfig::default();
        cfg.percentile_thresholds.exit_immediately = 120.0;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalyzerConfig::default();
        cfg.min_win_rate = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_overrides_produce_new_instance() {
        let base = AnalyzerConfig::default();
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "percentile_thresholds.exit_soon".to_string(),
            "80".to_string(),
        );
        overrides.insert("outlier_method".to_string(), "iqr".to_string());

        let derived = base.with_overrides(&overrides).unwrap();
        assert_eq!(derived.percentile_thresholds.exit_soon, 80.0);
        assert_eq!(derived.outlier_method, OutlierMethod::Iqr);
        // Base untouched
        assert_eq!(base.percentile_thresholds.exit_soon, 85.0);
        assert_eq!(base.outlier_method, OutlierMethod::ZScore);
    }

    #[test]
    fn test_override_rejects_unknown_key() {
        let base = AnalyzerConfig::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("no_such_option".to_string(), "1".to_string());
        assert!(base.with_overrides(&overrides).is_err());
    }

    #[test]
    fn test_override_validation_still_applies() {
        let base = AnalyzerConfig::default();
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "percentile_thresholds.exit_immediately".to_string(),
            "50".to_string(),
        );
        // 50 <= exit_soon (85) violates the ordering invariant
        assert!(base.with_overrides(&overrides).is_err());
    }
}
