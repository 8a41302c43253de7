//! Analysis engine
//!
//! Drives the fixed pipeline (resolve -> statistical metrics -> divergence ->
//! component scores -> signal -> result) for one or many positions. Batch
//! runs are sequential; a failed position is logged and omitted, never
//! aborting the batch. The engine holds no cross-call state and is reentrant.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::AnalyzerConfig;
use crate::divergence::DivergenceDetector;
use crate::error::Result;
use crate::report::AnalysisResult;
use crate::types::{AnalysisKind, PositionRecord};
use crate::{metrics, resolver, scoring, signal};

/// One analysis request: what to analyze plus optional config overrides.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub kind: AnalysisKind,
    /// Portfolio file path, strategy specification, or position identifier,
    /// depending on `kind`
    pub param: String,
    /// Dotted-path configuration overrides applied to this request only
    pub overrides: BTreeMap<String, String>,
}

impl AnalysisRequest {
    pub fn portfolio(path: impl Into<String>) -> Self {
        Self {
            kind: AnalysisKind::Portfolio,
            param: path.into(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn strategy(spec: impl Into<String>) -> Self {
        Self {
            kind: AnalysisKind::Strategy,
            param: spec.into(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn position(id: impl Into<String>) -> Self {
        Self {
            kind: AnalysisKind::Position,
            param: id.into(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }
}

/// Batch output: one result per position that analyzed cleanly.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub results: BTreeMap<String, AnalysisResult>,
    pub elapsed: Duration,
}

/// The exit-signal analysis engine.
pub struct ExitAnalyzer {
    config: AnalyzerConfig,
}

impl ExitAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run one request end to end.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        let start = Instant::now();

        let config = if request.overrides.is_empty() {
            self.config.clone()
        } else {
            self.config.with_overrides(&request.overrides)?
        };

        let (records, sources) = resolver::resolve(request.kind, &request.param, &config)?;
        let detector = DivergenceDetector::new(&config);

        let mut results = BTreeMap::new();
        let mut rng = StdRng::from_entropy();
        for record in &records {
            match analyze_record(&config, &detector, record, &sources, &mut rng) {
                Ok(result) => {
                    results.insert(record.position_id.clone(), result);
                }
                Err(e) => {
                    warn!(
                        position = %record.position_id,
                        error = %e,
                        "position analysis failed, excluding from batch"
                    );
                }
            }
        }

        let elapsed = start.elapsed();
        info!(
            kind = %request.kind,
            positions = results.len(),
            skipped = records.len() - results.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "analysis complete"
        );
        Ok(AnalysisOutcome { results, elapsed })
    }

    /// Analyze a single record against this engine's configuration.
    pub fn analyze_record(
        &self,
        record: &PositionRecord,
        sources: &BTreeMap<String, bool>,
    ) -> Result<AnalysisResult> {
        let detector = DivergenceDetector::new(&self.config);
        let mut rng = StdRng::from_entropy();
        analyze_record(&self.config, &detector, record, sources, &mut rng)
    }

    /// Same as `analyze_record` with a caller-supplied RNG, so tests can pin
    /// the sampled reference distribution.
    pub fn analyze_record_with_rng<R: Rng>(
        &self,
        record: &PositionRecord,
        sources: &BTreeMap<String, bool>,
        rng: &mut R,
    ) -> Result<AnalysisResult> {
        let detector = DivergenceDetector::new(&self.config);
        analyze_record(&self.config, &detector, record, sources, rng)
    }
}

/// The fixed per-position pipeline.
fn analyze_record<R: Rng>(
    config: &AnalyzerConfig,
    detector: &DivergenceDetector,
    record: &PositionRecord,
    sources: &BTreeMap<String, bool>,
    rng: &mut R,
) -> Result<AnalysisResult> {
    record.validate()?;

    let stats = metrics::calculate(record);
    let divergence = detector.analyze_with_rng(&stats, rng);
    let scores = scoring::component_scores(&stats, &divergence);

    let exit_signal = signal::classify(
        &scores,
        &divergence,
        &stats,
        &config.percentile_thresholds,
    )?;
    let confidence = signal::confidence_level(
        stats.get("total_trades").copied().unwrap_or(0.0),
        scores.get("overall_score").copied().unwrap_or(0.0),
    );

    AnalysisResult::new(
        record.strategy.clone(),
        record.ticker.clone(),
        record.position_id.clone(),
        exit_signal,
        confidence,
        stats,
        divergence,
        scores,
        sources.clone(),
        config.version_tag(),
    )
}
