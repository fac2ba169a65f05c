//! Performance metrics over a closed-trade ledger.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::position::Trade;
use crate::domain::table::{CLOSE, MarketTable};

pub const DEFAULT_INITIAL_CASH: f64 = 10_000.0;

/// Column compared against Close for the forecast-error metric.
pub const FORECAST_COLUMN: &str = "Pt";

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary statistics for one strategy run. An empty ledger reports
/// neutral zeros rather than an error so optimization trials stay
/// comparable.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Inclusive span from first entry to last exit.
    pub duration_days: i64,
    pub equity_final: f64,
    pub total_return_pct: f64,
    pub num_trades: usize,
    pub win_rate_pct: f64,
    pub avg_trade_pct: f64,
    pub sharpe: f64,
    /// Worst peak-to-trough equity loss, as a non-positive percentage.
    pub max_drawdown_pct: f64,
    pub sqrt_mse: f64,
}

impl Metrics {
    /// Compute metrics from a ledger. Trade returns use the initial cash
    /// as a constant denominator; the equity curve is the cumulative PnL
    /// sampled once per trade exit.
    pub fn compute(trades: &[Trade], table: &MarketTable, initial_cash: f64) -> Metrics {
        let sqrt_mse = forecast_error(table);
        if trades.is_empty() {
            return Metrics {
                start: None,
                end: None,
                duration_days: 0,
                equity_final: initial_cash,
                total_return_pct: 0.0,
                num_trades: 0,
                win_rate_pct: 0.0,
                avg_trade_pct: 0.0,
                sharpe: 0.0,
                max_drawdown_pct: 0.0,
                sqrt_mse: 0.0,
            };
        }

        let mut equity = Vec::with_capacity(trades.len());
        let mut balance = initial_cash;
        for trade in trades {
            balance += trade.pnl;
            equity.push(balance);
        }
        let returns: Vec<f64> = trades.iter().map(|t| t.pnl / initial_cash).collect();

        let equity_final = *equity.last().unwrap_or(&initial_cash);
        let total_return_pct = (equity_final - initial_cash) / initial_cash * 100.0;
        let wins = trades.iter().filter(|t| t.is_winner()).count();
        let win_rate_pct = wins as f64 / trades.len() as f64 * 100.0;
        let avg_trade = mean(&returns);
        let volatility = sample_std(&returns, avg_trade);
        let sharpe = if volatility > 0.0 {
            avg_trade / volatility * TRADING_DAYS_PER_YEAR.sqrt()
        } else {
            0.0
        };

        let start = trades.first().map(|t| t.entry_date);
        let end = trades.last().map(|t| t.exit_date);
        let duration_days = match (start, end) {
            (Some(s), Some(e)) => (e - s).num_days() + 1,
            _ => 0,
        };

        Metrics {
            start,
            end,
            duration_days,
            equity_final,
            total_return_pct,
            num_trades: trades.len(),
            win_rate_pct,
            avg_trade_pct: avg_trade * 100.0,
            sharpe,
            max_drawdown_pct: max_drawdown_pct(&equity),
            sqrt_mse,
        }
    }

    /// Metric value under its optimization key, if the key is known.
    pub fn objective_value(&self, key: &str) -> Option<f64> {
        match key {
            "AccReturn" => Some(self.total_return_pct),
            "Sharpe" => Some(self.sharpe),
            "Max Drawdown" => Some(self.max_drawdown_pct),
            "Accuracy" => Some(self.win_rate_pct),
            "SqrtMSE" => Some(self.sqrt_mse),
            _ => None,
        }
    }

    /// Weighted sum of objective metrics. Unknown keys contribute zero.
    pub fn score(&self, weights: &HashMap<String, f64>) -> f64 {
        weights
            .iter()
            .map(|(key, weight)| weight * self.objective_value(key).unwrap_or(0.0))
            .sum()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1). Fewer than two values yields zero.
fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Minimum of equity / running-max - 1, in percent. Zero for a curve that
/// never declines.
fn max_drawdown_pct(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min(value / peak - 1.0);
        }
    }
    worst * 100.0
}

/// Root mean squared error between the forecast column and Close, skipping
/// rows where either cell is null. Zero when the forecast column is absent
/// or no row is comparable.
fn forecast_error(table: &MarketTable) -> f64 {
    let (Some(forecast), Some(close)) = (table.column(FORECAST_COLUMN), table.column(CLOSE)) else {
        return 0.0;
    };
    let mut sum = 0.0;
    let mut count = 0usize;
    for (p, c) in forecast.iter().zip(close.iter()) {
        let diff = p - c;
        if diff.is_finite() {
            sum += diff * diff;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt()
    }
}
