//! Portfolio working state, trade facts and per-bar snapshots.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// An executed trade. Positive quantity buys, negative sells.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub symbol: String,
    pub date: NaiveDate,
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
}

impl Fill {
    pub fn is_buy(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn notional(&self) -> f64 {
        self.quantity.abs() * self.price
    }
}

/// Frozen end-of-bar view of the portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    pub date: NaiveDate,
    pub cash: f64,
    pub positions: BTreeMap<String, f64>,
    pub last_prices: BTreeMap<String, f64>,
    pub equity: f64,
}

impl PortfolioSnapshot {
    pub fn quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }
}

/// Mutable cash/position/mark state owned by a single execution run.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    pub positions: BTreeMap<String, f64>,
    pub last_prices: BTreeMap<String, f64>,
}

impl PortfolioState {
    pub fn new(initial_cash: f64) -> Self {
        PortfolioState {
            cash: initial_cash,
            positions: BTreeMap::new(),
            last_prices: BTreeMap::new(),
        }
    }

    pub fn quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn mark(&mut self, symbol: &str, price: f64) {
        self.last_prices.insert(symbol.to_string(), price);
    }

    /// Sets the held quantity, dropping the entry when it is within `eps` of zero.
    pub fn set_quantity(&mut self, symbol: &str, quantity: f64, eps: f64) {
        if quantity.abs() < eps {
            self.positions.remove(symbol);
        } else {
            self.positions.insert(symbol.to_string(), quantity);
        }
    }

    /// cash + sum(qty * last price). Positions without a mark contribute nothing.
    pub fn equity(&self) -> f64 {
        let position_value: f64 = self
            .positions
            .iter()
            .filter_map(|(symbol, qty)| self.last_prices.get(symbol).map(|price| qty * price))
            .sum();
        self.cash + position_value
    }

    pub fn snapshot(&self, date: NaiveDate) -> PortfolioSnapshot {
        PortfolioSnapshot {
            date,
            cash: self.cash,
            positions: self.positions.clone(),
            last_prices: self.last_prices.clone(),
            equity: self.equity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn new_state() {
        let state = PortfolioState::new(10_000.0);
        assert!((state.cash - 10_000.0).abs() < f64::EPSILON);
        assert!(state.positions.is_empty());
        assert!(state.last_prices.is_empty());
        assert!((state.equity() - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn equity_marks_positions() {
        let mut state = PortfolioState::new(1_000.0);
        state.set_quantity("BHP", 10.0, 1e-9);
        state.mark("BHP", 50.0);
        assert!((state.equity() - 1_500.0).abs() < 1e-9);
    }

    #[test]
    fn equity_ignores_unmarked_positions() {
        let mut state = PortfolioState::new(1_000.0);
        state.set_quantity("BHP", 10.0, 1e-9);
        assert!((state.equity() - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn set_quantity_drops_dust() {
        let mut state = PortfolioState::new(0.0);
        state.set_quantity("BHP", 5.0, 1e-9);
        assert!(state.positions.contains_key("BHP"));
        state.set_quantity("BHP", 1e-12, 1e-9);
        assert!(!state.positions.contains_key("BHP"));
        assert_eq!(state.quantity("BHP"), 0.0);
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let mut state = PortfolioState::new(1_000.0);
        state.set_quantity("BHP", 2.0, 1e-9);
        state.mark("BHP", 100.0);
        let snap = state.snapshot(date());

        state.cash = 0.0;
        state.set_quantity("BHP", 7.0, 1e-9);
        state.mark("BHP", 1.0);

        assert!((snap.cash - 1_000.0).abs() < f64::EPSILON);
        assert_eq!(snap.quantity("BHP"), 2.0);
        assert_eq!(snap.last_prices["BHP"], 100.0);
        assert!((snap.equity - 1_200.0).abs() < 1e-9);
    }

    #[test]
    fn fill_helpers() {
        let fill = Fill {
            symbol: "BHP".into(),
            date: date(),
            price: 10.0,
            quantity: -3.0,
            fee: 0.1,
        };
        assert!(!fill.is_buy());
        assert!((fill.notional() - 30.0).abs() < f64::EPSILON);
    }
}
