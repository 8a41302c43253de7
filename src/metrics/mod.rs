//! Statistical Metrics Calculator
//!
//! Pure extraction of plain performance numbers from a position record, plus
//! two derived ratios. No error conditions; zero denominators yield 0.

use std::collections::BTreeMap;

use crate::types::PositionRecord;

/// Required keys of the statistical-metrics map, checked by the assembler.
pub const REQUIRED_KEYS: &[&str] = &[
    "win_rate",
    "total_return",
    "total_trades",
    "sharpe_ratio",
    "max_drawdown",
    "current_price",
    "position_size",
    "unrealized_pnl",
    "avg_return_per_trade",
    "calmar_ratio",
];

/// Compute the statistical-metrics map for one position.
pub fn calculate(record: &PositionRecord) -> BTreeMap<String, f64> {
    let total_trades = record.total_trades as f64;

    let avg_return_per_trade = if record.total_trades > 0 {
        record.total_return / total_trades
    } else {
        0.0
    };
    let calmar_ratio = if record.max_drawdown != 0.0 {
        record.total_return / record.max_drawdown
    } else {
        0.0
    };

    let mut metrics = BTreeMap::new();
    metrics.insert("win_rate".to_string(), record.win_rate);
    metrics.insert("total_return".to_string(), record.total_return);
    metrics.insert("total_trades".to_string(), total_trades);
    metrics.insert("sharpe_ratio".to_string(), record.sharpe_ratio);
    metrics.insert("max_drawdown".to_string(), record.max_drawdown);
    metrics.insert("current_price".to_string(), record.current_price);
    metrics.insert("position_size".to_string(), record.position_size);
    metrics.insert("unrealized_pnl".to_string(), record.unrealized_pnl);
    metrics.insert("avg_return_per_trade".to_string(), avg_return_per_trade);
    metrics.insert("calmar_ratio".to_string(), calmar_ratio);
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> PositionRecord {
        PositionRecord {
            position_id: "POS-1".to_string(),
            ticker: "AAPL".to_string(),
            strategy: "AAPL_SMA_10_50".to_string(),
            win_rate: 0.65,
            total_return: 0.25,
            total_trades: 150,
            sharpe_ratio: 1.5,
            max_drawdown: 0.15,
            current_price: 182.5,
            position_size: 100.0,
            unrealized_pnl: 1250.0,
        }
    }

    #[test]
    fn test_all_required_keys_present() {
        let metrics = calculate(&make_record());
        for key in REQUIRED_KEYS {
            assert!(metrics.contains_key(*key), "missing {}", key);
        }
    }

    #[test]
    fn test_derived_ratios() {
        let metrics = calculate(&make_record());
        assert!((metrics["avg_return_per_trade"] - 0.25 / 150.0).abs() < 1e-12);
        assert!((metrics["calmar_ratio"] - 0.25 / 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_zero_trades_and_zero_drawdown() {
        let mut record = make_record();
        record.total_trades = 0;
        record.max_drawdown = 0.0;
        let metrics = calculate(&record);
        assert_eq!(metrics["avg_return_per_trade"], 0.0);
        assert_eq!(metrics["calmar_ratio"], 0.0);
    }
}
