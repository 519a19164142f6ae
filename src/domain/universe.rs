//! Symbol universe: parses symbol lists from configuration and loads the
//! aligned bar set for a multi-symbol run.

use crate::domain::bar_series::MultiBarSet;
use crate::domain::error::TradesimError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

impl From<UniverseError> for TradesimError {
    fn from(err: UniverseError) -> Self {
        TradesimError::config_invalid("backtest", "symbols", err.to_string())
    }
}

/// Splits a comma-separated list, trimming and uppercasing each symbol.
/// Order is kept; it becomes the multi-symbol processing order.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Fetches every symbol and intersects their date indices. Any symbol that
/// fails to load fails the whole universe.
pub fn fetch_multi(
    data_port: &dyn DataPort,
    symbols: &[String],
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<MultiBarSet, TradesimError> {
    let mut series = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let bars = data_port.fetch_bars(symbol, start_date, end_date)?;
        if bars.is_empty() {
            return Err(TradesimError::NoData {
                symbol: symbol.clone(),
            });
        }
        tracing::info!("{}: {} bars loaded", symbol, bars.len());
        series.push(bars);
    }
    MultiBarSet::align(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar_series::PriceBarSeries;
    use crate::domain::ohlcv::OhlcvBar;
    use std::collections::HashMap;

    struct StubPort {
        data: HashMap<String, Vec<&'static str>>,
    }

    impl DataPort for StubPort {
        fn fetch_bars(
            &self,
            symbol: &str,
            _start_date: NaiveDate,
            _end_date: Option<NaiveDate>,
        ) -> Result<PriceBarSeries, TradesimError> {
            let dates = self.data.get(symbol).ok_or_else(|| TradesimError::NoData {
                symbol: symbol.to_string(),
            })?;
            let bars = dates
                .iter()
                .map(|d| OhlcvBar {
                    date: NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap(),
                    open: 10.0,
                    high: 11.0,
                    low: 9.0,
                    close: 10.5,
                    volume: 100.0,
                })
                .collect();
            PriceBarSeries::new(symbol, bars)
        }

        fn list_symbols(&self) -> Result<Vec<String>, TradesimError> {
            Ok(self.data.keys().cloned().collect())
        }

        fn get_data_range(
            &self,
            _symbol: &str,
        ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TradesimError> {
            Ok(None)
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn parse_symbols_trims_and_uppercases() {
        let result = parse_symbols("  spy , qqq ,IWM").unwrap();
        assert_eq!(result, vec!["SPY", "QQQ", "IWM"]);
    }

    #[test]
    fn parse_symbols_single() {
        assert_eq!(parse_symbols("SPY").unwrap(), vec!["SPY"]);
    }

    #[test]
    fn parse_symbols_empty_token() {
        assert_eq!(parse_symbols("SPY,,QQQ"), Err(UniverseError::EmptyToken));
        assert_eq!(parse_symbols(""), Err(UniverseError::EmptyToken));
    }

    #[test]
    fn parse_symbols_duplicate_after_normalizing() {
        let result = parse_symbols("SPY,QQQ,spy");
        assert!(matches!(result, Err(UniverseError::DuplicateSymbol(s)) if s == "SPY"));
    }

    #[test]
    fn universe_error_maps_to_config_error() {
        let err: TradesimError = UniverseError::EmptyToken.into();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "symbols"));
    }

    #[test]
    fn fetch_multi_aligns_loaded_series() {
        let mut data = HashMap::new();
        data.insert("SPY".to_string(), vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
        data.insert("QQQ".to_string(), vec!["2024-01-02", "2024-01-03"]);
        let port = StubPort { data };

        let symbols = vec!["SPY".to_string(), "QQQ".to_string()];
        let set = fetch_multi(&port, &symbols, start(), None).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.symbols(), symbols);
    }

    #[test]
    fn fetch_multi_fails_on_missing_symbol() {
        let mut data = HashMap::new();
        data.insert("SPY".to_string(), vec!["2024-01-01"]);
        let port = StubPort { data };

        let symbols = vec!["SPY".to_string(), "QQQ".to_string()];
        let err = fetch_multi(&port, &symbols, start(), None).unwrap_err();
        assert!(matches!(err, TradesimError::NoData { symbol } if symbol == "QQQ"));
    }

    #[test]
    fn fetch_multi_fails_on_empty_series() {
        let mut data = HashMap::new();
        data.insert("SPY".to_string(), vec![]);
        let port = StubPort { data };

        let err = fetch_multi(&port, &["SPY".to_string()], start(), None).unwrap_err();
        assert!(matches!(err, TradesimError::NoData { .. }));
    }
}
