//! Per-symbol bar series and the aligned multi-symbol bar set.

use crate::domain::error::TradesimError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};

/// Bars for one symbol with a strictly increasing date index.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBarSeries {
    symbol: String,
    bars: Vec<OhlcvBar>,
}

impl PriceBarSeries {
    /// Validates ordering and OHLC values. Bars are taken as given; callers
    /// that read unordered sources sort before constructing.
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, TradesimError> {
        let symbol = symbol.into();

        for (i, bar) in bars.iter().enumerate() {
            if !bar.has_finite_prices() {
                return Err(TradesimError::InvalidData {
                    symbol,
                    reason: format!("non-finite OHLC value on {}", bar.date),
                });
            }
            if i > 0 && bars[i - 1].date >= bar.date {
                return Err(TradesimError::InvalidData {
                    symbol,
                    reason: format!(
                        "index not strictly increasing: {} followed by {}",
                        bars[i - 1].date, bar.date
                    ),
                });
            }
        }

        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn index(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    fn restrict_to(&self, dates: &BTreeSet<NaiveDate>) -> PriceBarSeries {
        PriceBarSeries {
            symbol: self.symbol.clone(),
            bars: self
                .bars
                .iter()
                .filter(|b| dates.contains(&b.date))
                .cloned()
                .collect(),
        }
    }
}

/// Several symbols sharing one date index. Keeps the caller's symbol order.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiBarSet {
    series: Vec<PriceBarSeries>,
    index: Vec<NaiveDate>,
}

impl MultiBarSet {
    /// Intersects the date indices of every series and trims each series to
    /// the common dates.
    pub fn align(series: Vec<PriceBarSeries>) -> Result<Self, TradesimError> {
        let mut seen = HashSet::new();
        for s in &series {
            if !seen.insert(s.symbol().to_string()) {
                return Err(TradesimError::Alignment {
                    symbol: s.symbol().to_string(),
                    reason: "symbol appears more than once".into(),
                });
            }
        }

        let mut common: Option<BTreeSet<NaiveDate>> = None;
        for s in &series {
            let dates: BTreeSet<NaiveDate> = s.bars.iter().map(|b| b.date).collect();
            common = Some(match common {
                None => dates,
                Some(acc) => acc.intersection(&dates).copied().collect(),
            });
        }

        let common = match common {
            Some(c) if !c.is_empty() => c,
            _ => {
                return Err(TradesimError::NoCommonTimestamps {
                    symbols: series
                        .iter()
                        .map(|s| s.symbol().to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                });
            }
        };

        let aligned: Vec<PriceBarSeries> = series
            .iter()
            .map(|s| {
                let trimmed = s.restrict_to(&common);
                if trimmed.len() < s.len() {
                    tracing::warn!(
                        "alignment dropped {} of {} bars for {}",
                        s.len() - trimmed.len(),
                        s.len(),
                        s.symbol()
                    );
                }
                trimmed
            })
            .collect();

        Ok(Self {
            series: aligned,
            index: common.into_iter().collect(),
        })
    }

    pub fn symbols(&self) -> Vec<String> {
        self.series.iter().map(|s| s.symbol.clone()).collect()
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn series(&self) -> &[PriceBarSeries] {
        &self.series
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceBarSeries> {
        self.series.iter().find(|s| s.symbol == symbol)
    }
}
