//! Trade execution and fill simulation.
//!
//! Both execution models drive the same per-symbol rebalance step: size the
//! position from the target fraction of current equity at the bar's close,
//! execute the difference at the configured price column with slippage and
//! fees, and never let a buy spend more cash than is available.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use super::bar_series::{MultiBarSet, PriceBarSeries};
use super::error::TradesimError;
use super::ohlcv::OhlcvBar;
use super::portfolio::{Fill, PortfolioSnapshot, PortfolioState};
use super::target::TargetSeries;

const BPS: f64 = 10_000.0;

/// Which column of the current bar a trade executes at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPrice {
    Open,
    Close,
}

impl FillPrice {
    pub fn price(self, bar: &OhlcvBar) -> f64 {
        match self {
            FillPrice::Open => bar.open,
            FillPrice::Close => bar.close,
        }
    }
}

impl FromStr for FillPrice {
    type Err = TradesimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(FillPrice::Open),
            "close" => Ok(FillPrice::Close),
            other => Err(TradesimError::config_invalid(
                "execution",
                "fill_price",
                format!("fill_price must be 'open' or 'close', got '{other}'"),
            )),
        }
    }
}

impl fmt::Display for FillPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillPrice::Open => write!(f, "open"),
            FillPrice::Close => write!(f, "close"),
        }
    }
}

/// Cost and tolerance parameters for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub fee_bps: f64,
    pub slippage_bps: f64,
    pub fill_price: FillPrice,
    pub eps: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            fee_bps: 1.0,
            slippage_bps: 1.0,
            fill_price: FillPrice::Open,
            eps: 1e-9,
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), TradesimError> {
        if !(self.fee_bps.is_finite() && self.fee_bps >= 0.0) {
            return Err(TradesimError::config_invalid(
                "execution",
                "fee_bps",
                "fee_bps must be non-negative",
            ));
        }
        if !(self.slippage_bps.is_finite() && self.slippage_bps >= 0.0) {
            return Err(TradesimError::config_invalid(
                "execution",
                "slippage_bps",
                "slippage_bps must be non-negative",
            ));
        }
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(TradesimError::config_invalid(
                "execution",
                "eps",
                "eps must be positive",
            ));
        }
        Ok(())
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_bps / BPS
    }
}

/// Fee on a traded notional: notional * fee_bps / 10_000.
pub fn calculate_fee(notional: f64, fee_bps: f64) -> f64 {
    notional * fee_bps / BPS
}

/// Buys pay more: price * (1 + slippage_bps / 10_000).
pub fn apply_slippage_buy(market_price: f64, slippage_bps: f64) -> f64 {
    market_price * (1.0 + slippage_bps / BPS)
}

/// Sells receive less: price * (1 - slippage_bps / 10_000).
pub fn apply_slippage_sell(market_price: f64, slippage_bps: f64) -> f64 {
    market_price * (1.0 - slippage_bps / BPS)
}

/// Fills and one snapshot per bar produced by a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionOutcome {
    pub fills: Vec<Fill>,
    pub snapshots: Vec<PortfolioSnapshot>,
}

/// Executes one symbol's target series against its bars.
pub trait ExecutionModel {
    fn execute(
        &self,
        bars: &PriceBarSeries,
        targets: &TargetSeries,
        initial: &PortfolioState,
    ) -> Result<ExecutionOutcome, TradesimError>;
}

/// Executes several symbols against one shared cash pool. `order` fixes who
/// trades first within a bar.
pub trait MultiExecutionModel {
    fn execute(
        &self,
        bars: &MultiBarSet,
        targets: &BTreeMap<String, TargetSeries>,
        order: &[String],
        initial: &PortfolioState,
    ) -> Result<ExecutionOutcome, TradesimError>;
}

fn resolve_fraction(symbol: &str, date: NaiveDate, raw: f64) -> Result<f64, TradesimError> {
    if raw.is_nan() {
        return Ok(0.0);
    }
    if !(0.0..=1.0).contains(&raw) {
        return Err(TradesimError::FractionOutOfRange {
            symbol: symbol.to_string(),
            date,
            value: raw,
        });
    }
    Ok(raw)
}

/// Moves `symbol` toward `fraction` of current equity.
///
/// The caller has already marked every symbol for this bar. Returns the fill
/// if a trade happened.
pub fn rebalance(
    state: &mut PortfolioState,
    symbol: &str,
    bar: &OhlcvBar,
    raw_fraction: f64,
    config: &ExecutionConfig,
) -> Result<Option<Fill>, TradesimError> {
    let fraction = resolve_fraction(symbol, bar.date, raw_fraction)?;
    let equity_for_sizing = state.equity();

    let close = bar.close;
    if !(close > 0.0) {
        return Err(TradesimError::NonPositivePrice {
            symbol: symbol.to_string(),
            date: bar.date,
            price: close,
        });
    }

    let current_qty = state.quantity(symbol);
    let desired_qty = fraction * equity_for_sizing / close;
    let mut delta = desired_qty - current_qty;
    if delta.abs() <= config.eps {
        return Ok(None);
    }

    let raw_price = config.fill_price.price(bar);
    let execution_price = if delta > 0.0 {
        apply_slippage_buy(raw_price, config.slippage_bps)
    } else {
        apply_slippage_sell(raw_price, config.slippage_bps)
    };

    if delta > 0.0 {
        let cost_per_unit = execution_price * (1.0 + config.fee_rate());
        let max_buy_qty = if cost_per_unit > 0.0 {
            (state.cash / cost_per_unit).max(0.0)
        } else {
            0.0
        };
        if delta > max_buy_qty {
            tracing::debug!(
                "{} {}: buy of {:.6} clamped to {:.6} by available cash {:.2}",
                symbol,
                bar.date,
                delta,
                max_buy_qty,
                state.cash
            );
            delta = max_buy_qty;
        }
        if delta.abs() <= config.eps {
            return Ok(None);
        }
    }

    let fee = calculate_fee(delta.abs() * execution_price, config.fee_bps);
    state.cash -= delta * execution_price;
    state.cash -= fee;
    if state.cash.abs() < config.eps {
        state.cash = 0.0;
    }
    state.set_quantity(symbol, current_qty + delta, config.eps);

    tracing::debug!(
        "fill {} {}: qty {:.6} @ {:.4} fee {:.4}",
        symbol,
        bar.date,
        delta,
        execution_price,
        fee
    );

    Ok(Some(Fill {
        symbol: symbol.to_string(),
        date: bar.date,
        price: execution_price,
        quantity: delta,
        fee,
    }))
}

/// Single-symbol execution: trades on the same bar the target is read.
/// Callers lag their targets to avoid look-ahead.
#[derive(Debug, Clone, PartialEq)]
pub struct NextBarExecution {
    config: ExecutionConfig,
}

impl NextBarExecution {
    pub fn new(config: ExecutionConfig) -> Result<Self, TradesimError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }
}

impl ExecutionModel for NextBarExecution {
    fn execute(
        &self,
        bars: &PriceBarSeries,
        targets: &TargetSeries,
        initial: &PortfolioState,
    ) -> Result<ExecutionOutcome, TradesimError> {
        let symbol = bars.symbol();
        if !targets.is_aligned_with(&bars.index()) {
            return Err(TradesimError::Alignment {
                symbol: symbol.to_string(),
                reason: "target index must match bar index".into(),
            });
        }

        let mut state = initial.clone();
        let mut outcome = ExecutionOutcome {
            fills: Vec::new(),
            snapshots: Vec::with_capacity(bars.len()),
        };

        for (bar, &target) in bars.bars().iter().zip(targets.values()) {
            state.mark(symbol, bar.close);
            if let Some(fill) = rebalance(&mut state, symbol, bar, target, &self.config)? {
                outcome.fills.push(fill);
            }
            outcome.snapshots.push(state.snapshot(bar.date));
        }

        tracing::info!(
            "{}: executed {} bars, {} fills",
            symbol,
            outcome.snapshots.len(),
            outcome.fills.len()
        );
        Ok(outcome)
    }
}

/// Multi-symbol execution over a shared cash pool.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiNextBarExecution {
    config: ExecutionConfig,
}

impl MultiNextBarExecution {
    pub fn new(config: ExecutionConfig) -> Result<Self, TradesimError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }
}

fn check_order(bars: &MultiBarSet, order: &[String]) -> Result<(), TradesimError> {
    let symbols = bars.symbols();
    let mut seen = HashSet::new();
    for symbol in order {
        if !seen.insert(symbol.as_str()) {
            return Err(TradesimError::config_invalid(
                "execution",
                "order",
                format!("{symbol} listed more than once"),
            ));
        }
        if !symbols.contains(symbol) {
            return Err(TradesimError::config_invalid(
                "execution",
                "order",
                format!("{symbol} has no bars"),
            ));
        }
    }
    if order.len() != symbols.len() {
        return Err(TradesimError::config_invalid(
            "execution",
            "order",
            format!(
                "order names {} symbols but the bar set has {}",
                order.len(),
                symbols.len()
            ),
        ));
    }
    Ok(())
}

impl MultiExecutionModel for MultiNextBarExecution {
    fn execute(
        &self,
        bars: &MultiBarSet,
        targets: &BTreeMap<String, TargetSeries>,
        order: &[String],
        initial: &PortfolioState,
    ) -> Result<ExecutionOutcome, TradesimError> {
        for symbol in bars.symbols() {
            let series = targets
                .get(&symbol)
                .ok_or_else(|| TradesimError::MissingSignal {
                    symbol: symbol.clone(),
                })?;
            if !series.is_aligned_with(bars.index()) {
                return Err(TradesimError::Alignment {
                    symbol,
                    reason: "target index must match shared bar index".into(),
                });
            }
        }
        check_order(bars, order)?;

        // Resolve lookups once; the loop below only indexes.
        let lanes: Vec<(&str, &PriceBarSeries, &TargetSeries)> = order
            .iter()
            .filter_map(|symbol| {
                Some((symbol.as_str(), bars.get(symbol)?, targets.get(symbol)?))
            })
            .collect();

        let mut state = initial.clone();
        let mut outcome = ExecutionOutcome {
            fills: Vec::new(),
            snapshots: Vec::with_capacity(bars.len()),
        };

        for (i, &date) in bars.index().iter().enumerate() {
            for (symbol, series, _) in &lanes {
                state.mark(symbol, series.bars()[i].close);
            }

            for (symbol, series, target) in &lanes {
                let bar = &series.bars()[i];
                let raw = target.values()[i];
                if let Some(fill) = rebalance(&mut state, symbol, bar, raw, &self.config)? {
                    outcome.fills.push(fill);
                }
            }

            outcome.snapshots.push(state.snapshot(date));
        }

        tracing::info!(
            "executed {} bars across {} symbols, {} fills",
            outcome.snapshots.len(),
            lanes.len(),
            outcome.fills.len()
        );
        Ok(outcome)
    }
}
