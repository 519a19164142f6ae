//! Backtest orchestration: bars -> signals -> [allocation] -> execution -> result.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::domain::allocation::Allocator;
use crate::domain::bar_series::{MultiBarSet, PriceBarSeries};
use crate::domain::error::TradesimError;
use crate::domain::execution::{ExecutionModel, MultiExecutionModel};
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::{Fill, PortfolioSnapshot, PortfolioState};
use crate::domain::strategy::SignalGenerator;
use crate::domain::target::TargetSeries;
use crate::domain::universe::fetch_multi;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub initial_cash: f64,
    pub risk_free_rate: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub bars: PriceBarSeries,
    pub signal: TargetSeries,
    pub fills: Vec<Fill>,
    pub snapshots: Vec<PortfolioSnapshot>,
}

impl BacktestResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.snapshots.last().map(|s| s.equity)
    }

    pub fn metrics(&self, risk_free_rate: f64) -> Metrics {
        Metrics::compute(&self.snapshots, &self.fills, risk_free_rate)
    }
}

#[derive(Debug, Clone)]
pub struct MultiBacktestResult {
    pub bars: MultiBarSet,
    pub raw_signals: BTreeMap<String, TargetSeries>,
    pub weights: BTreeMap<String, TargetSeries>,
    pub fills: Vec<Fill>,
    pub snapshots: Vec<PortfolioSnapshot>,
}

impl MultiBacktestResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.snapshots.last().map(|s| s.equity)
    }

    pub fn metrics(&self, risk_free_rate: f64) -> Metrics {
        Metrics::compute(&self.snapshots, &self.fills, risk_free_rate)
    }
}

/// One symbol, one signal, no allocation step.
pub struct BacktestEngine {
    signal: Box<dyn SignalGenerator>,
    execution: Box<dyn ExecutionModel>,
}

impl BacktestEngine {
    pub fn new(signal: Box<dyn SignalGenerator>, execution: Box<dyn ExecutionModel>) -> Self {
        Self { signal, execution }
    }

    pub fn run(
        &self,
        data: &dyn DataPort,
        symbol: &str,
        config: &BacktestConfig,
    ) -> Result<BacktestResult, TradesimError> {
        let bars = data.fetch_bars(symbol, config.start_date, config.end_date)?;
        self.run_on_bars(bars, config.initial_cash)
    }

    pub fn run_on_bars(
        &self,
        bars: PriceBarSeries,
        initial_cash: f64,
    ) -> Result<BacktestResult, TradesimError> {
        tracing::info!(
            "backtest {}: {} bars, strategy {}",
            bars.symbol(),
            bars.len(),
            self.signal.name()
        );

        let signal = self.signal.generate(&bars)?;
        let outcome = self
            .execution
            .execute(&bars, &signal, &PortfolioState::new(initial_cash))?;

        Ok(BacktestResult {
            bars,
            signal,
            fills: outcome.fills,
            snapshots: outcome.snapshots,
        })
    }
}

/// Several symbols over one cash pool. Raw signals are generated per symbol
/// in parallel, then combined into weights one timestamp at a time.
pub struct MultiBacktestEngine {
    signal: Box<dyn SignalGenerator>,
    allocator: Box<dyn Allocator>,
    budget: f64,
    execution: Box<dyn MultiExecutionModel>,
}

impl MultiBacktestEngine {
    pub fn new(
        signal: Box<dyn SignalGenerator>,
        allocator: Box<dyn Allocator>,
        budget: f64,
        execution: Box<dyn MultiExecutionModel>,
    ) -> Result<Self, TradesimError> {
        if !(budget > 0.0 && budget <= 1.0) {
            return Err(TradesimError::config_invalid(
                "allocation",
                "budget",
                format!("budget must be in (0, 1], got {budget}"),
            ));
        }
        Ok(Self {
            signal,
            allocator,
            budget,
            execution,
        })
    }

    /// Symbols trade in the order given here.
    pub fn run(
        &self,
        data: &dyn DataPort,
        symbols: &[String],
        config: &BacktestConfig,
    ) -> Result<MultiBacktestResult, TradesimError> {
        let bars = fetch_multi(data, symbols, config.start_date, config.end_date)?;
        self.run_on_bars(bars, config.initial_cash)
    }

    pub fn run_on_bars(
        &self,
        bars: MultiBarSet,
        initial_cash: f64,
    ) -> Result<MultiBacktestResult, TradesimError> {
        let order = bars.symbols();
        tracing::info!(
            "multi backtest: {} symbols, {} bars, strategy {}",
            order.len(),
            bars.len(),
            self.signal.name()
        );

        let raw_signals: BTreeMap<String, TargetSeries> = bars
            .series()
            .par_iter()
            .map(|series| {
                let signal = self.signal.generate(series)?;
                if !signal.is_aligned_with(bars.index()) {
                    return Err(TradesimError::Alignment {
                        symbol: series.symbol().to_string(),
                        reason: "signal index does not match shared bar index".into(),
                    });
                }
                Ok((series.symbol().to_string(), signal))
            })
            .collect::<Result<_, TradesimError>>()?;

        let weights = self.allocate_over_time(&bars, &raw_signals)?;

        let outcome = self.execution.execute(
            &bars,
            &weights,
            &order,
            &PortfolioState::new(initial_cash),
        )?;

        Ok(MultiBacktestResult {
            bars,
            raw_signals,
            weights,
            fills: outcome.fills,
            snapshots: outcome.snapshots,
        })
    }

    fn allocate_over_time(
        &self,
        bars: &MultiBarSet,
        raw_signals: &BTreeMap<String, TargetSeries>,
    ) -> Result<BTreeMap<String, TargetSeries>, TradesimError> {
        let mut columns: BTreeMap<String, Vec<f64>> = raw_signals
            .keys()
            .map(|symbol| (symbol.clone(), Vec::with_capacity(bars.len())))
            .collect();

        for i in 0..bars.len() {
            let intents: BTreeMap<String, f64> = raw_signals
                .iter()
                .map(|(symbol, series)| (symbol.clone(), series.values()[i]))
                .collect();
            let weights = self.allocator.allocate(&intents, self.budget);
            for (symbol, column) in columns.iter_mut() {
                // Rounding in renormalization can land a hair above 1.
                let w = weights.get(symbol).copied().unwrap_or(0.0);
                column.push(w.clamp(0.0, 1.0));
            }
        }

        columns
            .into_iter()
            .map(|(symbol, values)| {
                let series = TargetSeries::new(bars.index().to_vec(), values)?;
                Ok((symbol, series))
            })
            .collect()
    }
}
