//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_all_sections() {
        let content = r#"
[backtest]
symbols = SPY,QQQ
initial_cash = 25000.0

[execution]
fill_price = close

[allocation]
policy = equal_weight
cap = 0.4

[strategy]
kind = sma_cross
fast = 10
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "symbols"),
            Some("SPY,QQQ".to_string())
        );
        assert_eq!(
            adapter.get_string("backtest", "initial_cash"),
            Some("25000.0".to_string())
        );
        assert_eq!(
            adapter.get_string("execution", "fill_price"),
            Some("close".to_string())
        );
        assert_eq!(adapter.get_string("allocation", "cap"), Some("0.4".to_string()));
        assert_eq!(adapter.get_string("strategy", "fast"), Some("10".to_string()));
    }

    #[test]
    fn get_string_returns_none_for_missing_or_blank() {
        let adapter = FileConfigAdapter::from_string("[backtest]\nend_date =\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
        assert_eq!(adapter.get_string("backtest", "end_date"), None);
    }

    #[test]
    fn numbers_are_returned_verbatim() {
        let adapter = FileConfigAdapter::from_string("[execution]\nfee_bps = 1O\n").unwrap();
        assert_eq!(adapter.get_string("execution", "fee_bps"), Some("1O".to_string()));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[backtest]\ndata_dir = /var/data\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "data_dir"),
            Some("/var/data".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        assert!(FileConfigAdapter::from_file("/nonexistent/path/config.ini").is_err());
    }
}
