//! Analysis result assembly
//!
//! Packages the pipeline outputs into one immutable `AnalysisResult` and
//! provides the plain-map serialization form consumed by export collaborators,
//! plus the inverse reconstruction.
//!
//! Missing required metric keys append warnings but never fail assembly
//! (partial-success semantics); an out-of-range confidence level is a hard
//! failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::error::{AnalyzerError, Result};
use crate::types::{ExitSignal, RiskLevel, SignalKind};
use crate::{divergence, metrics, scoring};

/// Terminal, immutable output of one position analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub strategy: String,
    pub ticker: String,
    pub position_id: String,
    pub signal: ExitSignal,
    /// Trust in the analysis itself, 0-100; distinct from the signal's own
    /// confidence
    pub confidence_level: f64,
    pub statistical_metrics: BTreeMap<String, f64>,
    pub divergence_metrics: BTreeMap<String, f64>,
    pub component_scores: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
    /// Which auxiliary data sources were available for this run
    pub data_sources: BTreeMap<String, bool>,
    pub config_version: String,
    /// Non-fatal issues observed during assembly
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strategy: String,
        ticker: String,
        position_id: String,
        signal: ExitSignal,
        confidence_level: f64,
        statistical_metrics: BTreeMap<String, f64>,
        divergence_metrics: BTreeMap<String, f64>,
        component_scores: BTreeMap<String, f64>,
        data_sources: BTreeMap<String, bool>,
        config_version: String,
    ) -> Result<Self> {
        if !confidence_level.is_finite() || !(0.0..=100.0).contains(&confidence_level) {
            return Err(AnalyzerError::InvalidSignal(format!(
                "confidence level {} outside [0, 100]",
                confidence_level
            )));
        }

        let mut warnings = Vec::new();
        for (group, map, required) in [
            ("statistical", &statistical_metrics, metrics::REQUIRED_KEYS),
            ("divergence", &divergence_metrics, divergence::REQUIRED_KEYS),
            ("component", &component_scores, scoring::REQUIRED_KEYS),
        ] {
            for key in required {
                if !map.contains_key(*key) {
                    warnings.push(format!("missing {} metric '{}'", group, key));
                }
            }
        }

        Ok(Self {
            strategy,
            ticker,
            position_id,
            signal,
            confidence_level,
            statistical_metrics,
            divergence_metrics,
            component_scores,
            timestamp: Utc::now(),
            data_sources,
            config_version,
            warnings,
        })
    }

    /// Plain serialization form: a mapping of primitive values mirroring
    /// every field.
    pub fn to_map(&self) -> Map<String, Value> {
        let metric_map = |m: &BTreeMap<String, f64>| {
            Value::Object(m.iter().map(|(k, v)| (k.clone(), json!(v))).collect())
        };

        let mut map = Map::new();
        map.insert("strategy".to_string(), json!(self.strategy));
        map.insert("ticker".to_string(), json!(self.ticker));
        map.insert("position_id".to_string(), json!(self.position_id));
        map.insert(
            "signal".to_string(),
            json!({
                "kind": self.signal.kind.to_string(),
                "confidence": self.signal.confidence,
                "reasoning": self.signal.reasoning,
                "action": self.signal.action,
                "risk_level": self.signal.risk_level.to_string(),
            }),
        );
        map.insert("confidence_level".to_string(), json!(self.confidence_level));
        map.insert(
            "statistical_metrics".to_string(),
            metric_map(&self.statistical_metrics),
        );
        map.insert(
            "divergence_metrics".to_string(),
            metric_map(&self.divergence_metrics),
        );
        map.insert(
            "component_scores".to_string(),
            metric_map(&self.component_scores),
        );
        map.insert("timestamp".to_string(), json!(self.timestamp.to_rfc3339()));
        map.insert(
            "data_sources".to_string(),
            Value::Object(
                self.data_sources
                    .iter()
                    .map(|(k, v)| (k.clone(), json!(v)))
                    .collect(),
            ),
        );
        map.insert("config_version".to_string(), json!(self.config_version));
        map.insert("warnings".to_string(), json!(self.warnings));
        map
    }

    /// Reconstruct a result from its plain-map form, re-validating the same
    /// construction invariants.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let field = |key: &str| {
            map.get(key)
                .ok_or_else(|| AnalyzerError::Malformed(format!("missing field '{}'", key)))
        };
        let as_str = |key: &str| -> Result<String> {
            field(key)?
                .as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| AnalyzerError::Malformed(format!("field '{}' is not a string", key)))
        };
        let as_f64 = |value: &Value, key: &str| -> Result<f64> {
            value
                .as_f64()
                .ok_or_else(|| AnalyzerError::Malformed(format!("field '{}' is not numeric", key)))
        };

        let metric_map = |key: &str| -> Result<BTreeMap<String, f64>> {
            let obj = field(key)?.as_object().ok_or_else(|| {
                AnalyzerError::Malformed(format!("field '{}' is not a mapping", key))
            })?;
            obj.iter()
                .map(|(k, v)| Ok((k.clone(), as_f64(v, k)?)))
                .collect()
        };

        let signal_obj = field("signal")?
            .as_object()
            .ok_or_else(|| AnalyzerError::Malformed("field 'signal' is not a mapping".into()))?;
        let signal_str = |key: &str| -> Result<String> {
            signal_obj
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| AnalyzerError::Malformed(format!("signal field '{}' missing", key)))
        };

        let kind_str = signal_str("kind")?;
        let kind = SignalKind::from_str(&kind_str)
            .ok_or_else(|| AnalyzerError::InvalidSignal(format!("unknown kind '{}'", kind_str)))?;
        let risk_str = signal_str("risk_level")?;
        let risk_level = RiskLevel::from_str(&risk_str).ok_or_else(|| {
            AnalyzerError::InvalidSignal(format!("unknown risk level '{}'", risk_str))
        })?;
        let signal_confidence = signal_obj
            .get("confidence")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| AnalyzerError::Malformed("signal confidence missing".into()))?;
        let signal = ExitSignal::new(kind, signal_confidence, signal_str("reasoning")?, risk_level)?;

        let timestamp_str = as_str("timestamp")?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
            .map_err(|e| AnalyzerError::Malformed(format!("bad timestamp: {}", e)))?
            .with_timezone(&Utc);

        let data_sources = field("data_sources")?
            .as_object()
            .ok_or_else(|| AnalyzerError::Malformed("data_sources is not a mapping".into()))?
            .iter()
            .map(|(k, v)| {
                v.as_bool().map(|b| (k.clone(), b)).ok_or_else(|| {
                    AnalyzerError::Malformed(format!("data source '{}' is not a bool", k))
                })
            })
            .collect::<Result<BTreeMap<String, bool>>>()?;

        let warnings = field("warnings")?
            .as_array()
            .ok_or_else(|| AnalyzerError::Malformed("warnings is not a list".into()))?
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect();

        let mut result = Self::new(
            as_str("strategy")?,
            as_str("ticker")?,
            as_str("position_id")?,
            signal,
            as_f64(field("confidence_level")?, "confidence_level")?,
            metric_map("statistical_metrics")?,
            metric_map("divergence_metrics")?,
            metric_map("component_scores")?,
            data_sources,
            as_str("config_version")?,
        )?;
        // The stored list already includes any assembly warnings.
        result.warnings = warnings;
        result.timestamp = timestamp;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalKind;

    fn full_metric_maps() -> (
        BTreeMap<String, f64>,
        BTreeMap<String, f64>,
        BTreeMap<String, f64>,
    ) {
        let fill = |keys: &[&str]| {
            keys.iter()
                .map(|k| (k.to_string(), 1.0))
                .collect::<BTreeMap<String, f64>>()
        };
        (
            fill(metrics::REQUIRED_KEYS),
            fill(divergence::REQUIRED_KEYS),
            fill(scoring::REQUIRED_KEYS),
        )
    }

    fn make_signal() -> ExitSignal {
        ExitSignal::new(
            SignalKind::Hold,
            75.0,
            "performance within normal range".to_string(),
            RiskLevel::Low,
        )
        .unwrap()
    }

    fn make_result() -> AnalysisResult {
        let (stats, div, scores) = full_metric_maps();
        let mut sources = BTreeMap::new();
        sources.insert("portfolio".to_string(), true);
        sources.insert("trade_history".to_string(), false);
        AnalysisResult::new(
            "AAPL_SMA_10_50".to_string(),
            "AAPL".to_string(),
            "POS-1".to_string(),
            make_signal(),
            82.0,
            stats,
            div,
            scores,
            sources,
            "0.1.0".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_complete_result_has_no_warnings() {
        assert!(make_result().warnings.is_empty());
    }

    #[test]
    fn test_missing_keys_warn_but_do_not_fail() {
        let (mut stats, div, scores) = full_metric_maps();
        stats.remove("calmar_ratio");
        stats.remove("win_rate");
        let result = AnalysisResult::new(
            "s".to_string(),
            "T".to_string(),
            "p".to_string(),
            make_signal(),
            50.0,
            stats,
            div,
            scores,
            BTreeMap::new(),
            "0.1.0".to_string(),
        )
        .unwrap();
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings.iter().any(|w| w.contains("calmar_ratio")));
    }

    #[test]
    fn test_out_of_range_confidence_is_hard_failure() {
        let (stats, div, scores) = full_metric_maps();
        let err = AnalysisResult::new(
            "s".to_string(),
            "T".to_string(),
            "p".to_string(),
            make_signal(),
            150.0,
            stats,
            div,
            scores,
            BTreeMap::new(),
            "0.1.0".to_string(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_map_round_trip() {
        let original = make_result();
        let map = original.to_map();
        let restored = AnalysisResult::from_map(&map).unwrap();

        assert_eq!(restored.strategy, original.strategy);
        assert_eq!(restored.ticker, original.ticker);
        assert_eq!(restored.position_id, original.position_id);
        assert_eq!(restored.signal.kind, original.signal.kind);
        assert_eq!(restored.signal.confidence, original.signal.confidence);
        assert_eq!(restored.signal.risk_level, original.signal.risk_level);
        assert_eq!(restored.confidence_level, original.confidence_level);
        assert_eq!(restored.statistical_metrics, original.statistical_metrics);
        assert_eq!(restored.divergence_metrics, original.divergence_metrics);
        assert_eq!(restored.component_scores, original.component_scores);
        assert_eq!(restored.data_sources, original.data_sources);
        assert_eq!(restored.config_version, original.config_version);
        assert_eq!(restored.warnings, original.warnings);
        assert_eq!(restored.timestamp, original.timestamp);
    }

    #[test]
    fn test_from_map_rejects_unknown_risk_level() {
        let mut map = make_result().to_map();
        if let Some(Value::Object(signal)) = map.get_mut("signal") {
            signal.insert("risk_level".to_string(), json!("EXTREME"));
        }
        assert!(AnalysisResult::from_map(&map).is_err());
    }

    #[test]
    fn test_from_map_rejects_out_of_range_confidence() {
        let mut map = make_result().to_map();
        if let Some(Value::Object(signal)) = map.get_mut("signal") {
            signal.insert("confidence".to_string(), json!(250.0));
        }
        assert!(AnalysisResult::from_map(&map).is_err());
    }
}
