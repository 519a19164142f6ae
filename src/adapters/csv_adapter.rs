//! CSV file data adapter: one `<SYMBOL>.csv` per symbol under a base directory.

use crate::domain::bar_series::PriceBarSeries;
use crate::domain::error::TradesimError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// All bars in the file sorted by date, or `None` if there is no file.
    fn read_bars(&self, symbol: &str) -> Result<Option<Vec<OhlcvBar>>, TradesimError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TradesimError::Io(e)),
        };

        let invalid = |reason: String| TradesimError::InvalidData {
            symbol: symbol.to_string(),
            reason,
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| invalid(format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(0)
                .ok_or_else(|| invalid(format!("row {}: missing date column", line + 1)))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| invalid(format!("row {}: invalid date format: {}", line + 1, e)))?;

            let field = |index: usize, name: &str| -> Result<f64, TradesimError> {
                record
                    .get(index)
                    .ok_or_else(|| invalid(format!("row {}: missing {} column", line + 1, name)))?
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| invalid(format!("row {}: invalid {} value: {}", line + 1, name, e)))
            };

            bars.push(OhlcvBar {
                date,
                open: field(1, "open")?,
                high: field(2, "high")?,
                low: field(3, "low")?,
                close: field(4, "close")?,
                volume: field(5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(Some(bars))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<PriceBarSeries, TradesimError> {
        let no_data = || TradesimError::NoData {
            symbol: symbol.to_string(),
        };
        let bars: Vec<OhlcvBar> = self
            .read_bars(symbol)?
            .ok_or_else(no_data)?
            .into_iter()
            .filter(|b| b.date >= start_date && end_date.is_none_or(|end| b.date <= end))
            .collect();

        if bars.is_empty() {
            return Err(no_data());
        }
        PriceBarSeries::new(symbol, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, TradesimError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TradesimError> {
        let Some(bars) = self.read_bars(symbol)? else {
            return Ok(None);
        };
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
