//! Position Record Resolver
//!
//! Normalizes the three request shapes (portfolio file, strategy
//! specification, position identifier) into canonical position records and
//! probes which auxiliary data sources exist for provenance reporting.

use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::error::{AnalyzerError, Result};
use crate::types::{AnalysisKind, PositionRecord};

/// Columns every portfolio file must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "position_id",
    "ticker",
    "strategy",
    "win_rate",
    "total_return",
    "total_trades",
    "sharpe_ratio",
    "max_drawdown",
    "current_price",
    "position_size",
    "unrealized_pnl",
];

/// Resolve a request into position records plus the data-source map.
pub fn resolve(
    kind: AnalysisKind,
    param: &str,
    config: &AnalyzerConfig,
) -> Result<(Vec<PositionRecord>, BTreeMap<String, bool>)> {
    let records = match kind {
        AnalysisKind::Portfolio => load_portfolio(Path::new(param))?,
        AnalysisKind::Strategy => vec![parse_strategy_spec(param)?],
        AnalysisKind::Position => vec![find_position(param, config)?],
    };
    let mut sources = data_sources(config);
    if kind == AnalysisKind::Portfolio {
        sources.insert("portfolio".to_string(), true);
    }
    Ok((records, sources))
}

/// Load every row of one portfolio CSV, validating the header first.
pub fn load_portfolio(path: &Path) -> Result<Vec<PositionRecord>> {
    if !path.exists() {
        return Err(AnalyzerError::FileNotFound(path.to_path_buf()));
    }

    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AnalyzerError::MissingColumns(missing));
    }

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: PositionRecord = row?;
        records.push(record);
    }
    debug!(path = %path.display(), rows = records.len(), "loaded portfolio file");
    Ok(records)
}

/// Parse a `TICKER_TYPE_FAST_SLOW` strategy specification into a zero-filled
/// synthetic record.
pub fn parse_strategy_spec(spec: &str) -> Result<PositionRecord> {
    let parts: Vec<&str> = spec.split('_').collect();
    if parts.len() < 4 {
        return Err(AnalyzerError::InvalidStrategySpec(spec.to_string()));
    }
    Ok(PositionRecord::synthetic(spec, parts[0]))
}

/// Search every portfolio file under the configured paths for a matching
/// position identifier; first match wins.
pub fn find_position(position_id: &str, config: &AnalyzerConfig) -> Result<PositionRecord> {
    for path in portfolio_files(config) {
        let records = match load_portfolio(&path) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable portfolio file");
                continue;
            }
        };
        if let Some(record) = records.into_iter().find(|r| r.position_id == position_id) {
            return Ok(record);
        }
    }
    Err(AnalyzerError::PositionNotFound(position_id.to_string()))
}

/// Availability probes for provenance reporting.
pub fn data_sources(config: &AnalyzerConfig) -> BTreeMap<String, bool> {
    let mut portfolio = false;
    let mut trade_history = false;
    let mut price_data = false;
    let mut equity_curves = false;

    for raw in &config.search_paths {
        let path = Path::new(raw);
        if !portfolio {
            portfolio = !portfolio_files_in(path).is_empty();
        }
        trade_history = trade_history || path.join("trades.csv").exists();
        price_data = price_data || path.join("prices.csv").exists();
        equity_curves = equity_curves || path.join("equity").is_dir();
    }

    let mut sources = BTreeMap::new();
    sources.insert("portfolio".to_string(), portfolio);
    sources.insert(
        "trade_history".to_string(),
        config.use_trade_history && trade_history,
    );
    sources.insert("price_data".to_string(), price_data);
    sources.insert("equity_curves".to_string(), equity_curves);
    sources
}

fn portfolio_files(config: &AnalyzerConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for raw in &config.search_paths {
        files.extend(portfolio_files_in(Path::new(raw)));
    }
    files
}

fn portfolio_files_in(path: &Path) -> Vec<PathBuf> {
    let is_csv = |p: &Path| p.extension().map(|e| e == "csv").unwrap_or(false);

    if path.is_file() {
        return if is_csv(path) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let mut files: Vec<PathBuf> = match std::fs::read_dir(path) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_csv(p))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "position_id,ticker,strategy,win_rate,total_return,total_trades,\
sharpe_ratio,max_drawdown,current_price,position_size,unrealized_pnl";

    fn write_portfolio(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        path
    }

    #[test]
    fn test_load_portfolio() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_portfolio(
            dir.path(),
            "portfolio.csv",
            &[
                "POS-1,AAPL,AAPL_SMA_10_50,0.65,0.25,150,1.5,0.15,182.5,100,1250.0",
                "POS-2,MSFT,MSFT_EMA_5_20,0.55,0.10,80,0.9,0.12,410.0,50,320.0",
            ],
        );

        let records = load_portfolio(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].position_id, "POS-1");
        assert_eq!(records[1].total_trades, 80);
    }

    #[test]
    fn test_missing_file() {
        let err = load_portfolio(Path::new("/nonexistent/portfolio.csv")).unwrap_err();
        assert!(matches!(err, AnalyzerError::FileNotFound(_)));
    }

    #[test]
    fn test_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "position_id,ticker,win_rate").unwrap();
        writeln!(file, "POS-1,AAPL,0.5").unwrap();

        match load_portfolio(&path).unwrap_err() {
            AnalyzerError::MissingColumns(cols) => {
                assert!(cols.contains(&"sharpe_ratio".to_string()));
                assert!(!cols.contains(&"ticker".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_strategy_spec() {
        let record = parse_strategy_spec("AAPL_SMA_10_50").unwrap();
        assert_eq!(record.ticker, "AAPL");
        assert_eq!(record.strategy, "AAPL_SMA_10_50");
        assert_eq!(record.total_trades, 0);

        assert!(matches!(
            parse_strategy_spec("AAPL_SMA").unwrap_err(),
            AnalyzerError::InvalidStrategySpec(_)
        ));
    }

    #[test]
    fn test_find_position_across_files() {
        let dir = tempfile::tempdir().unwrap();
        write_portfolio(
            dir.path(),
            "a.csv",
            &["POS-1,AAPL,AAPL_SMA_10_50,0.65,0.25,150,1.5,0.15,182.5,100,1250.0"],
        );
        write_portfolio(
            dir.path(),
            "b.csv",
            &["POS-2,MSFT,MSFT_EMA_5_20,0.55,0.10,80,0.9,0.12,410.0,50,320.0"],
        );

        let mut config = AnalyzerConfig::default();
        config.search_paths = vec![dir.path().to_string_lossy().to_string()];

        let found = find_position("POS-2", &config).unwrap();
        assert_eq!(found.ticker, "MSFT");

        assert!(matches!(
            find_position("POS-404", &config).unwrap_err(),
            AnalyzerError::PositionNotFound(_)
        ));
    }

    #[test]
    fn test_data_sources_probes() {
        let dir = tempfile::tempdir().unwrap();
        write_portfolio(
            dir.path(),
            "portfolio.csv",
            &["POS-1,AAPL,AAPL_SMA_10_50,0.65,0.25,150,1.5,0.15,182.5,100,1250.0"],
        );
        std::fs::File::create(dir.path().join("trades.csv")).unwrap();
        std::fs::create_dir(dir.path().join("equity")).unwrap();

        let mut config = AnalyzerConfig::default();
        config.search_paths = vec![dir.path().to_string_lossy().to_string()];
        config.use_trade_history = true;

        let sources = data_sources(&config);
        assert_eq!(sources["portfolio"], true);
        assert_eq!(sources["trade_history"], true);
        assert_eq!(sources["price_data"], false);
        assert_eq!(sources["equity_curves"], true);
    }

    #[test]
    fn test_trade_history_requires_flag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("trades.csv")).unwrap();

        let mut config = AnalyzerConfig::default();
        config.search_paths = vec![dir.path().to_string_lossy().to_string()];
        config.use_trade_history = false;

        let sources = data_sources(&config);
        assert_eq!(sources["trade_history"], false);
    }
}
