//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::allocation::{AllocationConfig, AllocationPolicy};
use crate::domain::backtest::{
    BacktestConfig, BacktestEngine, BacktestResult, MultiBacktestEngine, MultiBacktestResult,
};
use crate::domain::config_validation::{
    parse_date, read_double, read_int, validate_allocation_config, validate_config,
    validate_dates, validate_execution_config, validate_initial_cash, validate_risk_free_rate,
    validate_strategy_config,
};
use crate::domain::error::TradesimError;
use crate::domain::execution::{
    ExecutionConfig, FillPrice, MultiNextBarExecution, NextBarExecution,
};
use crate::domain::metrics::{FillSummary, Metrics};
use crate::domain::portfolio::{Fill, PortfolioSnapshot};
use crate::domain::strategy::{
    BuyAndHold, MaKind, MovingAverageCross, SignalGenerator, StrategyKind,
};
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "tradesim", about = "Portfolio backtest simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated symbols, overriding [backtest] symbols
        #[arg(long)]
        symbols: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range available for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbols: Option<String>,
        /// Report every symbol in the data directory
        #[arg(long)]
        all: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            symbols,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, symbols.as_deref())
            } else {
                run_backtest(&config, symbols.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            config,
            symbols,
            all,
        } => run_info(&config, symbols.as_deref(), all),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TradesimError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: TradesimError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

/// Result of either engine.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Single(BacktestResult),
    Multi(MultiBacktestResult),
}

impl RunOutcome {
    pub fn fills(&self) -> &[Fill] {
        match self {
            RunOutcome::Single(r) => &r.fills,
            RunOutcome::Multi(r) => &r.fills,
        }
    }

    pub fn snapshots(&self) -> &[PortfolioSnapshot] {
        match self {
            RunOutcome::Single(r) => &r.snapshots,
            RunOutcome::Multi(r) => &r.snapshots,
        }
    }
}

fn run_backtest(config_path: &Path, symbols_override: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        return fail(e);
    }

    let symbols = match resolve_symbols(symbols_override, &adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let data_port = CsvAdapter::new(data_dir(&adapter));
    eprintln!(
        "Running backtest: {} from {}",
        symbols.join(", "),
        bt_config.start_date
    );

    let outcome = match run_backtest_pipeline(&data_port, &adapter, &symbols) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    print_summary(&outcome, bt_config.risk_free_rate);
    ExitCode::SUCCESS
}

/// Builds everything from configuration and runs the single-symbol engine
/// for one symbol or the multi-symbol engine for several.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    adapter: &dyn ConfigPort,
    symbols: &[String],
) -> Result<RunOutcome, TradesimError> {
    let bt_config = build_backtest_config(adapter)?;
    let exec_config = build_execution_config(adapter)?;
    let strategy = build_strategy(adapter)?;

    match symbols {
        [] => Err(TradesimError::config_missing("backtest", "symbols")),
        [symbol] => {
            let engine =
                BacktestEngine::new(strategy, Box::new(NextBarExecution::new(exec_config)?));
            Ok(RunOutcome::Single(engine.run(
                data_port, symbol, &bt_config,
            )?))
        }
        _ => {
            let allocation = build_allocation_config(adapter)?;
            let engine = MultiBacktestEngine::new(
                strategy,
                allocation.allocator(),
                allocation.budget,
                Box::new(MultiNextBarExecution::new(exec_config)?),
            )?;
            Ok(RunOutcome::Multi(engine.run(data_port, symbols, &bt_config)?))
        }
    }
}

fn print_summary(outcome: &RunOutcome, risk_free_rate: f64) {
    let metrics = Metrics::compute(outcome.snapshots(), outcome.fills(), risk_free_rate);
    let final_equity = outcome.snapshots().last().map(|s| s.equity).unwrap_or(0.0);

    eprintln!("\n=== Results ===");
    eprintln!("Final Equity:     {:.2}", final_equity);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("CAGR:             {:.2}%", metrics.cagr * 100.0);
    eprintln!("Volatility:       {:.2}%", metrics.volatility * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!(
        "Max Drawdown:     -{:.1}% ({} bars)",
        metrics.max_drawdown * 100.0,
        metrics.max_drawdown_duration
    );
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Total Fees:       {:.2}", metrics.total_fees);
    eprintln!("Turnover:         {:.2}x", metrics.turnover);

    let per_symbol = FillSummary::per_symbol(outcome.fills());
    if !per_symbol.is_empty() {
        eprintln!("\n=== Per-Symbol Fills ===");
        for s in &per_symbol {
            eprintln!(
                "  {}:  {} fills ({} buys, {} sells), notional {:.0}, fees {:.2}",
                s.symbol, s.fills, s.buys, s.sells, s.traded_notional, s.total_fees
            );
        }
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TradesimError> {
    validate_dates(adapter)?;
    validate_initial_cash(adapter)?;
    validate_risk_free_rate(adapter)?;

    let start_str = adapter
        .get_string("backtest", "start_date")
        .ok_or_else(|| TradesimError::config_missing("backtest", "start_date"))?;
    let start_date = parse_date(&start_str, "start_date")?;
    let end_date = adapter
        .get_string("backtest", "end_date")
        .map(|s| parse_date(&s, "end_date"))
        .transpose()?;

    Ok(BacktestConfig {
        start_date,
        end_date,
        initial_cash: read_double(adapter, "backtest", "initial_cash")?.unwrap_or(10_000.0),
        risk_free_rate: read_double(adapter, "backtest", "risk_free_rate")?.unwrap_or(0.0),
    })
}

pub fn build_execution_config(adapter: &dyn ConfigPort) -> Result<ExecutionConfig, TradesimError> {
    validate_execution_config(adapter)?;
    let defaults = ExecutionConfig::default();
    let fill_price = match adapter.get_string("execution", "fill_price") {
        Some(s) => s.parse::<FillPrice>()?,
        None => defaults.fill_price,
    };
    let config = ExecutionConfig {
        fee_bps: read_double(adapter, "execution", "fee_bps")?.unwrap_or(defaults.fee_bps),
        slippage_bps: read_double(adapter, "execution", "slippage_bps")?
            .unwrap_or(defaults.slippage_bps),
        fill_price,
        eps: read_double(adapter, "execution", "eps")?.unwrap_or(defaults.eps),
    };
    config.validate()?;
    Ok(config)
}

pub fn build_allocation_config(
    adapter: &dyn ConfigPort,
) -> Result<AllocationConfig, TradesimError> {
    validate_allocation_config(adapter)?;
    let defaults = AllocationConfig::default();
    let policy = match adapter.get_string("allocation", "policy") {
        Some(s) => s.parse::<AllocationPolicy>()?,
        None => defaults.policy,
    };
    Ok(AllocationConfig {
        policy,
        budget: read_double(adapter, "allocation", "budget")?.unwrap_or(defaults.budget),
        cap: read_double(adapter, "allocation", "cap")?,
    })
}

fn window(adapter: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, TradesimError> {
    let value = read_int(adapter, "strategy", key)?.unwrap_or(default as i64);
    usize::try_from(value).map_err(|_| {
        TradesimError::config_invalid("strategy", key, format!("{key} must be non-negative"))
    })
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Box<dyn SignalGenerator>, TradesimError> {
    validate_strategy_config(adapter)?;
    let kind = match adapter.get_string("strategy", "kind") {
        Some(s) => s.parse::<StrategyKind>()?,
        None => StrategyKind::SmaCross,
    };
    let shift = window(adapter, "shift", 1)?;

    let strategy: Box<dyn SignalGenerator> = match kind {
        StrategyKind::BuyAndHold => Box::new(BuyAndHold::new(shift)),
        StrategyKind::SmaCross | StrategyKind::EmaCross => {
            let ma = if kind == StrategyKind::SmaCross {
                MaKind::Sma
            } else {
                MaKind::Ema
            };
            Box::new(MovingAverageCross::new(
                window(adapter, "fast", MovingAverageCross::DEFAULT_FAST)?,
                window(adapter, "slow", MovingAverageCross::DEFAULT_SLOW)?,
                ma,
                shift,
            )?)
        }
    };
    Ok(strategy)
}

/// `--symbols` wins over `[backtest] symbols`, which wins over `[backtest] symbol`.
pub fn resolve_symbols(
    symbols_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, TradesimError> {
    let raw = symbols_override
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "symbols"))
        .or_else(|| config.get_string("backtest", "symbol"))
        .ok_or_else(|| TradesimError::config_missing("backtest", "symbols"))?;
    Ok(parse_symbols(&raw)?)
}

pub fn data_dir(config: &dyn ConfigPort) -> PathBuf {
    config
        .get_string("backtest", "data_dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub fn run_dry_run(config_path: &Path, symbols_override: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        return fail(e);
    }
    eprintln!("Config validated successfully");

    let plan = describe_plan(&adapter, symbols_override);
    let (symbols, lines) = match plan {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    for line in lines {
        eprintln!("{line}");
    }

    let data_port = CsvAdapter::new(data_dir(&adapter));
    eprintln!("\nData:");
    for symbol in &symbols {
        match data_port.get_data_range(symbol) {
            Ok(Some((first, last, count))) => {
                eprintln!("  {}: {} bars, {} to {}", symbol, count, first, last)
            }
            Ok(None) => eprintln!("  {}: no data found", symbol),
            Err(e) => eprintln!("  {}: {}", symbol, e),
        }
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

/// Human-readable description of what a run would do.
pub fn describe_plan(
    adapter: &dyn ConfigPort,
    symbols_override: Option<&str>,
) -> Result<(Vec<String>, Vec<String>), TradesimError> {
    let symbols = resolve_symbols(symbols_override, adapter)?;
    let bt_config = build_backtest_config(adapter)?;
    let exec = build_execution_config(adapter)?;
    let strategy = build_strategy(adapter)?;

    let mut lines = vec![
        format!("\nStrategy: {}", strategy.name()),
        format!(
            "Mode: {}",
            if symbols.len() > 1 {
                "multi-symbol"
            } else {
                "single-symbol"
            }
        ),
        format!("Symbols: {}", symbols.join(", ")),
        format!(
            "Period: {} to {}",
            bt_config.start_date,
            bt_config
                .end_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "end of data".to_string())
        ),
        format!("Initial cash: {:.2}", bt_config.initial_cash),
        format!(
            "Execution: fill at {}, fee {} bps, slippage {} bps",
            exec.fill_price, exec.fee_bps, exec.slippage_bps
        ),
    ];
    if symbols.len() > 1 {
        let allocation = build_allocation_config(adapter)?;
        lines.push(format!(
            "Allocation: {}, budget {}, cap {}",
            allocation.policy,
            allocation.budget,
            allocation
                .cap
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string())
        ));
    }
    Ok((symbols, lines))
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        return fail(e);
    }

    match describe_plan(&adapter, None) {
        Ok((_, lines)) => {
            for line in lines {
                eprintln!("{line}");
            }
        }
        Err(e) => return fail(e),
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, symbols_override: Option<&str>, all: bool) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let data_port = CsvAdapter::new(data_dir(&config));

    let symbols = if all {
        data_port.list_symbols()
    } else {
        resolve_symbols(symbols_override, &config)
    };
    let symbols = match symbols {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    for symbol in &symbols {
        match data_port.get_data_range(symbol) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} bars, {} to {}", symbol, count, first, last);
            }
            Ok(None) => {
                eprintln!("{}: no data found", symbol);
            }
            Err(e) => {
                eprintln!("error reading {}: {}", symbol, e);
            }
        }
    }
    ExitCode::SUCCESS
}
