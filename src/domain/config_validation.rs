//! Configuration validation.
//!
//! Every section is checked before any data is loaded. Numeric keys must
//! parse when present; absent keys fall back to their defaults.

use crate::domain::allocation::AllocationPolicy;
use crate::domain::error::TradesimError;
use crate::domain::execution::FillPrice;
use crate::domain::strategy::StrategyKind;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    validate_backtest_config(config)?;
    validate_execution_config(config)?;
    validate_allocation_config(config)?;
    validate_strategy_config(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    validate_symbols(config)?;
    validate_dates(config)?;
    validate_initial_cash(config)?;
    validate_risk_free_rate(config)?;
    Ok(())
}

pub fn validate_execution_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    for key in ["fee_bps", "slippage_bps"] {
        if let Some(value) = read_double(config, "execution", key)? {
            if value < 0.0 {
                return Err(TradesimError::config_invalid(
                    "execution",
                    key,
                    format!("{key} must be non-negative"),
                ));
            }
        }
    }
    if let Some(value) = config.get_string("execution", "fill_price") {
        value.parse::<FillPrice>()?;
    }
    if let Some(eps) = read_double(config, "execution", "eps")? {
        if eps <= 0.0 {
            return Err(TradesimError::config_invalid(
                "execution",
                "eps",
                "eps must be positive",
            ));
        }
    }
    Ok(())
}

pub fn validate_allocation_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if let Some(value) = config.get_string("allocation", "policy") {
        value.parse::<AllocationPolicy>()?;
    }
    if let Some(budget) = read_double(config, "allocation", "budget")? {
        if budget <= 0.0 || budget > 1.0 {
            return Err(TradesimError::config_invalid(
                "allocation",
                "budget",
                "budget must be in (0, 1]",
            ));
        }
    }
    if let Some(cap) = read_double(config, "allocation", "cap")? {
        if !(0.0..=1.0).contains(&cap) {
            return Err(TradesimError::config_invalid(
                "allocation",
                "cap",
                "cap must be in [0, 1]",
            ));
        }
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let kind = match config.get_string("strategy", "kind") {
        Some(value) => value.parse::<StrategyKind>()?,
        None => StrategyKind::SmaCross,
    };

    if let Some(shift) = read_int(config, "strategy", "shift")? {
        if shift < 0 {
            return Err(TradesimError::config_invalid(
                "strategy",
                "shift",
                "shift must be non-negative",
            ));
        }
    }

    if kind == StrategyKind::BuyAndHold {
        return Ok(());
    }

    let fast = read_int(config, "strategy", "fast")?.unwrap_or(10);
    let slow = read_int(config, "strategy", "slow")?.unwrap_or(40);
    if fast <= 0 {
        return Err(TradesimError::config_invalid(
            "strategy",
            "fast",
            "fast must be positive",
        ));
    }
    if slow <= 0 {
        return Err(TradesimError::config_invalid(
            "strategy",
            "slow",
            "slow must be positive",
        ));
    }
    if fast >= slow {
        return Err(TradesimError::config_invalid(
            "strategy",
            "fast",
            "fast must be less than slow",
        ));
    }
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let value = config
        .get_string("backtest", "symbols")
        .or_else(|| config.get_string("backtest", "symbol"));
    match value {
        Some(s) if !s.trim().is_empty() => {
            parse_symbols(&s)?;
            Ok(())
        }
        _ => Err(TradesimError::config_missing("backtest", "symbols")),
    }
}

pub(crate) fn validate_dates(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let start_date = match config.get_string("backtest", "start_date") {
        Some(s) => parse_date(&s, "start_date")?,
        None => return Err(TradesimError::config_missing("backtest", "start_date")),
    };

    if let Some(s) = config.get_string("backtest", "end_date") {
        let end_date = parse_date(&s, "end_date")?;
        if start_date > end_date {
            return Err(TradesimError::config_invalid(
                "backtest",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if let Some(value) = read_double(config, "backtest", "initial_cash")? {
        if value < 0.0 {
            return Err(TradesimError::config_invalid(
                "backtest",
                "initial_cash",
                "initial_cash must be non-negative",
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if let Some(value) = read_double(config, "backtest", "risk_free_rate")? {
        if !(0.0..1.0).contains(&value) {
            return Err(TradesimError::config_invalid(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be between 0 and 1",
            ));
        }
    }
    Ok(())
}

/// Parses a `YYYY-MM-DD` value of the `[backtest]` section.
pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, TradesimError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        TradesimError::config_invalid(
            "backtest",
            field,
            format!("invalid {} format, expected YYYY-MM-DD", field),
        )
    })
}

pub(crate) fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, TradesimError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(TradesimError::config_invalid(
            section,
            key,
            format!("expected a number, got '{raw}'"),
        )),
    }
}

pub(crate) fn read_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<i64>, TradesimError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    raw.trim().parse::<i64>().map(Some).map_err(|_| {
        TradesimError::config_invalid(section, key, format!("expected an integer, got '{raw}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const BACKTEST: &str = "[backtest]\nsymbols = SPY,QQQ\nstart_date = 2020-01-01\n";

    #[test]
    fn valid_full_config_passes() {
        let config = make_config(
            r#"
[backtest]
symbols = SPY,QQQ
start_date = 2020-01-01
end_date = 2024-12-31
initial_cash = 10000
data_dir = ./data
risk_free_rate = 0.02

[execution]
fee_bps = 1.0
slippage_bps = 2.0
fill_price = close
eps = 1e-9

[allocation]
policy = equal_weight
budget = 0.9
cap = 0.5

[strategy]
kind = ema_cross
fast = 5
slow = 20
shift = 1
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn defaults_only_config_passes() {
        assert!(validate_config(&make_config(BACKTEST)).is_ok());
    }

    #[test]
    fn missing_symbols_fails() {
        let config = make_config("[backtest]\nstart_date = 2020-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigMissing { key, .. } if key == "symbols"));
    }

    #[test]
    fn single_symbol_key_accepted() {
        let config = make_config("[backtest]\nsymbol = SPY\nstart_date = 2020-01-01\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn duplicate_symbols_fail() {
        let config = make_config("[backtest]\nsymbols = SPY,spy\nstart_date = 2020-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "symbols"));
    }

    #[test]
    fn missing_start_date_fails() {
        let config = make_config("[backtest]\nsymbols = SPY\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigMissing { key, .. } if key == "start_date"));
    }

    #[test]
    fn invalid_start_date_format_fails() {
        let config = make_config("[backtest]\nsymbols = SPY\nstart_date = 2020/01/01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn start_date_after_end_date_fails() {
        let config = make_config(
            "[backtest]\nsymbols = SPY\nstart_date = 2024-12-31\nend_date = 2020-01-01\n",
        );
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn negative_initial_cash_fails() {
        let config = make_config(&format!("{BACKTEST}initial_cash = -1\n"));
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "initial_cash"));
    }

    #[test]
    fn non_numeric_initial_cash_fails() {
        let config = make_config(&format!("{BACKTEST}initial_cash = lots\n"));
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "initial_cash"));
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let config = make_config(&format!("{BACKTEST}risk_free_rate = 1.5\n"));
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "risk_free_rate")
        );
    }

    #[test]
    fn negative_fee_fails() {
        let config = make_config("[execution]\nfee_bps = -1\n");
        let err = validate_execution_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "fee_bps"));
    }

    #[test]
    fn negative_slippage_fails() {
        let config = make_config("[execution]\nslippage_bps = -0.5\n");
        let err = validate_execution_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "slippage_bps"));
    }

    #[test]
    fn unknown_fill_price_fails() {
        let config = make_config("[execution]\nfill_price = vwap\n");
        let err = validate_execution_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "fill_price"));
    }

    #[test]
    fn zero_eps_fails() {
        let config = make_config("[execution]\neps = 0\n");
        let err = validate_execution_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "eps"));
    }

    #[test]
    fn unknown_policy_fails() {
        let config = make_config("[allocation]\npolicy = risk_parity\n");
        let err = validate_allocation_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "policy"));
    }

    #[test]
    fn budget_above_one_fails() {
        let config = make_config("[allocation]\nbudget = 1.5\n");
        let err = validate_allocation_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "budget"));
    }

    #[test]
    fn zero_cap_is_valid() {
        let config = make_config("[allocation]\ncap = 0\n");
        assert!(validate_allocation_config(&config).is_ok());
    }

    #[test]
    fn cap_above_one_fails() {
        let config = make_config("[allocation]\ncap = 1.2\n");
        let err = validate_allocation_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "cap"));
    }

    #[test]
    fn unknown_strategy_kind_fails() {
        let config = make_config("[strategy]\nkind = rsi\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "kind"));
    }

    #[test]
    fn fast_not_below_slow_fails() {
        let config = make_config("[strategy]\nkind = sma_cross\nfast = 40\nslow = 40\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "fast"));
    }

    #[test]
    fn zero_windows_fail() {
        let config = make_config("[strategy]\nfast = 0\nslow = 0\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "fast"));
    }

    #[test]
    fn negative_shift_fails() {
        let config = make_config("[strategy]\nkind = buy_and_hold\nshift = -1\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, TradesimError::ConfigInvalid { key, .. } if key == "shift"));
    }

    #[test]
    fn buy_and_hold_ignores_windows() {
        let config = make_config("[strategy]\nkind = buy_and_hold\nfast = 50\nslow = 10\n");
        assert!(validate_strategy_config(&config).is_ok());
    }
}
