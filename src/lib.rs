//! ExitWatch Library
//!
//! Statistical exit-signal analyzer: turns a compact position performance
//! summary into a classified exit recommendation (HOLD / EXIT_SOON /
//! EXIT_IMMEDIATELY) with confidence, risk level, and reasoning.

pub mod config;
pub mod divergence;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod numeric;
pub mod report;
pub mod resolver;
pub mod scoring;
pub mod signal;
pub mod types;

pub use config::{AnalyzerConfig, OutlierMethod, PercentileThresholds};
pub use engine::{AnalysisOutcome, AnalysisRequest, ExitAnalyzer};
pub use error::AnalyzerError;
pub use report::AnalysisResult;
pub use types::{AnalysisKind, ExitSignal, PositionRecord, RiskLevel, SignalKind};
