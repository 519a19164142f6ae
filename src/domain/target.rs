//! Target-position series: desired portfolio fraction per bar.

use crate::domain::bar_series::PriceBarSeries;
use crate::domain::error::TradesimError;
use chrono::NaiveDate;

/// One desired fraction per date. `NaN` means "no intent" and is executed as flat.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSeries {
    index: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TargetSeries {
    pub fn new(index: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, TradesimError> {
        if index.len() != values.len() {
            return Err(TradesimError::Alignment {
                symbol: String::new(),
                reason: format!(
                    "target series has {} dates but {} values",
                    index.len(),
                    values.len()
                ),
            });
        }
        Ok(Self { index, values })
    }

    /// A series over the bar index of `bars`, one value per bar.
    pub fn for_bars(bars: &PriceBarSeries, values: Vec<f64>) -> Result<Self, TradesimError> {
        Self::new(bars.index(), values).map_err(|e| match e {
            TradesimError::Alignment { reason, .. } => TradesimError::Alignment {
                symbol: bars.symbol().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Same value on every date of `index`.
    pub fn constant(index: Vec<NaiveDate>, value: f64) -> Self {
        let values = vec![value; index.len()];
        Self { index, values }
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied()
    }

    /// Delays every value by `bars` positions; the vacated leading slots are NaN.
    pub fn shift(&self, bars: usize) -> Self {
        let n = self.values.len();
        let values = (0..n)
            .map(|i| if i >= bars { self.values[i - bars] } else { f64::NAN })
            .collect();
        Self {
            index: self.index.clone(),
            values,
        }
    }

    pub fn is_aligned_with(&self, index: &[NaiveDate]) -> bool {
        self.index.as_slice() == index
    }
}
