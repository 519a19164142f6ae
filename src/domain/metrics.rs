//! Performance metrics computed from a run's snapshots and fills.
//!
//! Annualization is calendar based: periods per year are estimated from the
//! median spacing between snapshots over a 365.25-day year, so daily bars
//! that skip weekends still scale consistently across strategies.

use super::portfolio::{Fill, PortfolioSnapshot};
use chrono::NaiveDate;
use std::collections::BTreeMap;

const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: i64,
    pub total_trades: usize,
    pub total_fees: f64,
    pub turnover: f64,
}

impl Metrics {
    pub fn compute(snapshots: &[PortfolioSnapshot], fills: &[Fill], risk_free_rate: f64) -> Self {
        let first = snapshots.first().map(|s| s.equity).unwrap_or(0.0);
        let last = snapshots.last().map(|s| s.equity).unwrap_or(first);

        let total_return = if first > 0.0 {
            (last - first) / first
        } else {
            0.0
        };

        let years = match (snapshots.first(), snapshots.last()) {
            (Some(a), Some(b)) => (b.date - a.date).num_days() as f64 / DAYS_PER_YEAR,
            _ => 0.0,
        };
        let cagr = if years > 0.0 && first > 0.0 && last >= 0.0 {
            (last / first).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let dates: Vec<NaiveDate> = snapshots.iter().map(|s| s.date).collect();
        let ppy = periods_per_year(&dates);
        let (volatility, sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(snapshots, risk_free_rate / ppy, ppy);

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(snapshots);

        let total_fees: f64 = fills.iter().map(|f| f.fee).sum();
        let traded: f64 = fills.iter().map(Fill::notional).sum();
        let mean_equity = if snapshots.is_empty() {
            0.0
        } else {
            snapshots.iter().map(|s| s.equity).sum::<f64>() / snapshots.len() as f64
        };
        let turnover = if mean_equity > 0.0 {
            traded / mean_equity
        } else {
            0.0
        };

        Metrics {
            total_return,
            cagr,
            volatility,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades: fills.len(),
            total_fees,
            turnover,
        }
    }
}

/// Fill activity for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct FillSummary {
    pub symbol: String,
    pub fills: usize,
    pub buys: usize,
    pub sells: usize,
    pub total_fees: f64,
    pub traded_notional: f64,
}

impl FillSummary {
    /// One summary per traded symbol, sorted by symbol.
    pub fn per_symbol(fills: &[Fill]) -> Vec<FillSummary> {
        let mut by_symbol: BTreeMap<&str, FillSummary> = BTreeMap::new();
        for fill in fills {
            let entry = by_symbol
                .entry(fill.symbol.as_str())
                .or_insert_with(|| FillSummary {
                    symbol: fill.symbol.clone(),
                    fills: 0,
                    buys: 0,
                    sells: 0,
                    total_fees: 0.0,
                    traded_notional: 0.0,
                });
            entry.fills += 1;
            if fill.is_buy() {
                entry.buys += 1;
            } else {
                entry.sells += 1;
            }
            entry.total_fees += fill.fee;
            entry.traded_notional += fill.notional();
        }
        by_symbol.into_values().collect()
    }
}

/// Drawdown from the running equity peak at each snapshot, as a value <= 0.
pub fn drawdown_curve(snapshots: &[PortfolioSnapshot]) -> Vec<(NaiveDate, f64)> {
    let mut peak = f64::NEG_INFINITY;
    snapshots
        .iter()
        .map(|s| {
            peak = peak.max(s.equity);
            let dd = if peak > 0.0 { s.equity / peak - 1.0 } else { 0.0 };
            (s.date, dd)
        })
        .collect()
}

fn periods_per_year(dates: &[NaiveDate]) -> f64 {
    if dates.len() < 2 {
        return DAYS_PER_YEAR;
    }
    let mut deltas: Vec<i64> = dates.windows(2).map(|w| (w[1] - w[0]).num_days()).collect();
    deltas.sort_unstable();
    let mid = deltas.len() / 2;
    let median = if deltas.len() % 2 == 0 {
        (deltas[mid - 1] + deltas[mid]) as f64 / 2.0
    } else {
        deltas[mid] as f64
    };
    if median > 0.0 {
        DAYS_PER_YEAR / median
    } else {
        DAYS_PER_YEAR
    }
}

/// Max drawdown as a positive fraction and the longest run of bars spent
/// below a prior peak.
fn compute_drawdown(snapshots: &[PortfolioSnapshot]) -> (f64, i64) {
    if snapshots.is_empty() {
        return (0.0, 0);
    }

    let mut peak = snapshots[0].equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for snap in snapshots {
        if snap.equity >= peak {
            peak = snap.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - snap.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

/// (annualized volatility, sharpe, sortino) from per-bar simple returns,
/// population standard deviation.
fn compute_risk_adjusted(snapshots: &[PortfolioSnapshot], period_rf: f64, ppy: f64) -> (f64, f64, f64) {
    if snapshots.len() < 2 {
        return (0.0, 0.0, 0.0);
    }

    let returns: Vec<f64> = snapshots
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let annual = ppy.sqrt();

    let excess_return = mean - period_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * annual
    } else {
        0.0
    };

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sq / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * annual
    } else {
        0.0
    };

    (stddev * annual, sharpe, sortino)
}
