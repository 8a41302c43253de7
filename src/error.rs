//! Error types for the exit-signal analyzer
//!
//! Hard failures (bad files, malformed specs, invalid configuration) are
//! propagated to the caller. Per-position failures inside a batch run are
//! caught by the engine and logged, see `engine::ExitAnalyzer::analyze`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("portfolio file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("portfolio file missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("invalid strategy specification '{0}': expected TICKER_TYPE_FAST_SLOW")]
    InvalidStrategySpec(String),

    #[error("position '{0}' not found in any portfolio file")]
    PositionNotFound(String),

    /// Per-position soft failure; the batch loop logs and skips these.
    #[error("invalid position record: {0}")]
    InvalidRecord(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Construction-time invariant violation on an exit signal. This is a
    /// programming defect, not bad input data.
    #[error("invalid exit signal: {0}")]
    InvalidSignal(String),

    #[error("malformed analysis result map: {0}")]
    Malformed(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
