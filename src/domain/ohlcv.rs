//! OHLCV bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// True when open, high, low and close are all finite numbers.
    pub fn has_finite_prices(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn finite_prices() {
        assert!(sample_bar().has_finite_prices());
    }

    #[test]
    fn nan_close_is_not_finite() {
        let bar = OhlcvBar {
            close: f64::NAN,
            ..sample_bar()
        };
        assert!(!bar.has_finite_prices());
    }

    #[test]
    fn volume_is_not_checked() {
        let bar = OhlcvBar {
            volume: f64::NAN,
            ..sample_bar()
        };
        assert!(bar.has_finite_prices());
    }
}
