//! Signal generators: turn one symbol's bars into a target-fraction series.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::bar_series::PriceBarSeries;
use crate::domain::error::TradesimError;
use crate::domain::indicator::{IndicatorSeries, calculate_ema, calculate_sma};
use crate::domain::target::TargetSeries;

/// Produces the raw target series for one symbol. Implementations must not
/// look at bars after the one they emit a value for, and apply their own
/// execution lag.
pub trait SignalGenerator: Send + Sync {
    fn name(&self) -> String;

    fn generate(&self, bars: &PriceBarSeries) -> Result<TargetSeries, TradesimError>;
}

/// Strategy selected by the `[strategy] kind` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    SmaCross,
    EmaCross,
    BuyAndHold,
}

impl FromStr for StrategyKind {
    type Err = TradesimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sma_cross" => Ok(StrategyKind::SmaCross),
            "ema_cross" => Ok(StrategyKind::EmaCross),
            "buy_and_hold" => Ok(StrategyKind::BuyAndHold),
            other => Err(TradesimError::config_invalid(
                "strategy",
                "kind",
                format!("unknown strategy kind '{other}'"),
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::SmaCross => write!(f, "sma_cross"),
            StrategyKind::EmaCross => write!(f, "ema_cross"),
            StrategyKind::BuyAndHold => write!(f, "buy_and_hold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaKind {
    Sma,
    Ema,
}

impl MaKind {
    fn calculate(self, bars: &PriceBarSeries, period: usize) -> IndicatorSeries {
        match self {
            MaKind::Sma => calculate_sma(bars.bars(), period),
            MaKind::Ema => calculate_ema(bars.bars(), period),
        }
    }
}

/// Long (target 1) while the fast average is above the slow one, flat
/// otherwise, lagged by `shift` bars.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageCross {
    fast: usize,
    slow: usize,
    kind: MaKind,
    shift: usize,
}

impl MovingAverageCross {
    pub const DEFAULT_FAST: usize = 10;
    pub const DEFAULT_SLOW: usize = 40;

    pub fn new(fast: usize, slow: usize, kind: MaKind, shift: usize) -> Result<Self, TradesimError> {
        if fast == 0 {
            return Err(TradesimError::config_invalid(
                "strategy",
                "fast",
                "fast window must be positive",
            ));
        }
        if slow == 0 {
            return Err(TradesimError::config_invalid(
                "strategy",
                "slow",
                "slow window must be positive",
            ));
        }
        if fast >= slow {
            return Err(TradesimError::config_invalid(
                "strategy",
                "fast",
                format!("fast ({fast}) must be less than slow ({slow})"),
            ));
        }
        Ok(Self {
            fast,
            slow,
            kind,
            shift,
        })
    }

    pub fn fast(&self) -> usize {
        self.fast
    }

    pub fn slow(&self) -> usize {
        self.slow
    }

    pub fn shift(&self) -> usize {
        self.shift
    }
}

impl SignalGenerator for MovingAverageCross {
    fn name(&self) -> String {
        let label = match self.kind {
            MaKind::Sma => "SMA",
            MaKind::Ema => "EMA",
        };
        format!("{label} cross({},{}) shift {}", self.fast, self.slow, self.shift)
    }

    fn generate(&self, bars: &PriceBarSeries) -> Result<TargetSeries, TradesimError> {
        let fast = self.kind.calculate(bars, self.fast);
        let slow = self.kind.calculate(bars, self.slow);

        let raw: Vec<f64> = (0..bars.len())
            .map(|i| match (fast.value_at(i), slow.value_at(i)) {
                (Some(f), Some(s)) if f > s => 1.0,
                _ => 0.0,
            })
            .collect();

        Ok(TargetSeries::for_bars(bars, raw)?.shift(self.shift))
    }
}

/// Fully invested from the first bar the lag allows.
#[derive(Debug, Clone, PartialEq)]
pub struct BuyAndHold {
    shift: usize,
}

impl BuyAndHold {
    pub fn new(shift: usize) -> Self {
        Self { shift }
    }
}

impl SignalGenerator for BuyAndHold {
    fn name(&self) -> String {
        format!("buy and hold shift {}", self.shift)
    }

    fn generate(&self, bars: &PriceBarSeries) -> Result<TargetSeries, TradesimError> {
        Ok(TargetSeries::constant(bars.index(), 1.0).shift(self.shift))
    }
}

/// Precomputed per-symbol targets, returned as given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixedTargets {
    targets: BTreeMap<String, TargetSeries>,
}

impl FixedTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, symbol: &str, series: TargetSeries) -> Self {
        self.targets.insert(symbol.to_string(), series);
        self
    }
}

impl SignalGenerator for FixedTargets {
    fn name(&self) -> String {
        "fixed targets".to_string()
    }

    fn generate(&self, bars: &PriceBarSeries) -> Result<TargetSeries, TradesimError> {
        let series = self
            .targets
            .get(bars.symbol())
            .ok_or_else(|| TradesimError::MissingSignal {
                symbol: bars.symbol().to_string(),
            })?;
        if !series.is_aligned_with(&bars.index()) {
            return Err(TradesimError::Alignment {
                symbol: bars.symbol().to_string(),
                reason: "fixed target index does not match bar index".into(),
            });
        }
        Ok(series.clone())
    }
}
