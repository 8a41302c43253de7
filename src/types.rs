//! Core types used throughout ExitWatch
//!
//! Defines the canonical position record, the exit-signal taxonomy, and the
//! analysis-kind dispatch enum.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnalyzerError, Result};

/// Canonical input unit for one analysis run.
///
/// Built by the resolver from whichever collaborator supplied it (portfolio
/// row, strategy spec, position lookup) and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Position identifier, unique within a portfolio file
    pub position_id: String,
    /// Ticker symbol
    pub ticker: String,
    /// Strategy label (e.g. "AAPL_SMA_10_50")
    pub strategy: String,
    /// Win rate as a fraction in [0, 1]
    pub win_rate: f64,
    /// Total return as a fraction
    pub total_return: f64,
    /// Number of closed trades
    pub total_trades: u32,
    /// Sharpe ratio
    pub sharpe_ratio: f64,
    /// Maximum drawdown as a fraction in [0, 1]
    pub max_drawdown: f64,
    /// Current market price
    pub current_price: f64,
    /// Position size
    pub position_size: f64,
    /// Unrealized profit/loss
    pub unrealized_pnl: f64,
}

impl PositionRecord {
    /// Zero-filled record for a strategy specification with no live position.
    pub fn synthetic(strategy: &str, ticker: &str) -> Self {
        Self {
            position_id: strategy.to_string(),
            ticker: ticker.to_string(),
            strategy: strategy.to_string(),
            win_rate: 0.0,
            total_return: 0.0,
            total_trades: 0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            current_price: 0.0,
            position_size: 0.0,
            unrealized_pnl: 0.0,
        }
    }

    /// Sanity check before the pipeline runs. Failures here are caught by
    /// the batch loop and skip the record rather than aborting the batch.
    pub fn validate(&self) -> Result<()> {
        if self.position_id.is_empty() {
            return Err(AnalyzerError::InvalidRecord(
                "empty position identifier".to_string(),
            ));
        }
        if self.ticker.is_empty() {
            return Err(AnalyzerError::InvalidRecord(format!(
                "position '{}' has an empty ticker",
                self.position_id
            )));
        }
        Ok(())
    }
}

/// Terminal classification of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Hold,
    ExitSoon,
    ExitImmediately,
}

impl Default for SignalKind {
    fn default() -> Self {
        SignalKind::Hold
    }
}

impl SignalKind {
    /// Fixed recommended-action lookup
    pub fn recommended_action(&self) -> &'static str {
        match self {
            SignalKind::Hold => "hold position and monitor",
            SignalKind::ExitSoon => "consider exiting within 1-3 days",
            SignalKind::ExitImmediately => "exit position immediately",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "HOLD" => Some(SignalKind::Hold),
            "EXIT_SOON" => Some(SignalKind::ExitSoon),
            "EXIT_IMMEDIATELY" => Some(SignalKind::ExitImmediately),
            _ => None,
        }
    }

    /// Position along the urgency ladder, HOLD = 0
    pub fn urgency(&self) -> u8 {
        match self {
            SignalKind::Hold => 0,
            SignalKind::ExitSoon => 1,
            SignalKind::ExitImmediately => 2,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Hold => write!(f, "HOLD"),
            SignalKind::ExitSoon => write!(f, "EXIT_SOON"),
            SignalKind::ExitImmediately => write!(f, "EXIT_IMMEDIATELY"),
        }
    }
}

/// Coarse risk tag derived independently of the exit signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Classified exit recommendation for one position.
///
/// Confidence is validated at construction; an out-of-range value is a hard
/// failure because it can only come from a scoring bug, never from input data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitSignal {
    pub kind: SignalKind,
    /// Confidence in the signal itself, 0-100
    pub confidence: f64,
    /// Human-readable justification citing the driving scores
    pub reasoning: String,
    /// Fixed per-kind recommended action
    pub action: String,
    pub risk_level: RiskLevel,
}

impl ExitSignal {
    pub fn new(
        kind: SignalKind,
        confidence: f64,
        reasoning: String,
        risk_level: RiskLevel,
    ) -> Result<Self> {
        if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
            return Err(AnalyzerError::InvalidSignal(format!(
                "confidence {} outside [0, 100]",
                confidence
            )));
        }
        Ok(Self {
            kind,
            confidence,
            reasoning,
            action: kind.recommended_action().to_string(),
            risk_level,
        })
    }
}

/// What the caller is asking the engine to analyze.
///
/// Closed enum so the engine's dispatch is exhaustiveness-checked at build
/// time instead of matching on raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// Every row of a portfolio file
    Portfolio,
    /// A synthetic position built from a strategy specification string
    Strategy,
    /// One position looked up by identifier across portfolio files
    Position,
}

impl AnalysisKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "portfolio" => Some(AnalysisKind::Portfolio),
            "strategy" => Some(AnalysisKind::Strategy),
            "position" => Some(AnalysisKind::Position),
            _ => None,
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisKind::Portfolio => write!(f, "portfolio"),
            AnalysisKind::Strategy => write!(f, "strategy"),
            AnalysisKind::Position => write!(f, "position"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_kind_roundtrip() {
        for kind in [
            SignalKind::Hold,
            SignalKind::ExitSoon,
            SignalKind::ExitImmediately,
        ] {
            assert_eq!(SignalKind::from_str(&kind.to_string()), Some(kind));
        }
        assert_eq!(SignalKind::from_str("SIDEWAYS"), None);
    }

    #[test]
    fn test_risk_level_roundtrip() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            assert_eq!(RiskLevel::from_str(&level.to_string()), Some(level));
        }
        assert_eq!(RiskLevel::from_str("EXTREME"), None);
    }

    #[test]
    fn test_exit_signal_rejects_bad_confidence() {
        assert!(ExitSignal::new(SignalKind::Hold, 120.0, String::new(), RiskLevel::Low).is_err());
        assert!(ExitSignal::new(SignalKind::Hold, -1.0, String::new(), RiskLevel::Low).is_err());
        assert!(ExitSignal::new(SignalKind::Hold, f64::NAN, String::new(), RiskLevel::Low).is_err());
        let ok =
            ExitSignal::new(SignalKind::Hold, 75.0, "steady".to_string(), RiskLevel::Low).unwrap();
        assert_eq!(ok.action, "hold position and monitor");
    }

    #[test]
    fn test_synthetic_record_is_zero_filled() {
        let rec = PositionRecord::synthetic("AAPL_SMA_10_50", "AAPL");
        assert_eq!(rec.total_trades, 0);
        assert_eq!(rec.total_return, 0.0);
        assert_eq!(rec.ticker, "AAPL");
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn test_record_validation() {
        let mut rec = PositionRecord::synthetic("SPY_EMA_5_20", "SPY");
        rec.position_id = String::new();
        assert!(rec.validate().is_err());
    }

    #[test]
    fn test_analysis_kind_parse() {
        assert_eq!(AnalysisKind::from_str("Portfolio"), Some(AnalysisKind::Portfolio));
        assert_eq!(AnalysisKind::from_str("strategy"), Some(AnalysisKind::Strategy));
        assert_eq!(AnalysisKind::from_str("ticker"), None);
    }
}
