//! Data access port trait.

use crate::domain::bar_series::PriceBarSeries;
use crate::domain::error::TradesimError;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `symbol` from `start_date` through `end_date` (open-ended if
    /// `None`), validated and in date order.
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<PriceBarSeries, TradesimError>;

    fn list_symbols(&self) -> Result<Vec<String>, TradesimError>;

    /// First date, last date and bar count, or `None` if the symbol is unknown.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TradesimError>;
}
