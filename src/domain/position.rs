//! Open positions and closed trades.

use chrono::NaiveDate;

use crate::domain::rule::Side;

/// How a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    StopLoss,
    TakeProfit,
    Signal,
}

impl std::fmt::Display for ExitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExitKind::StopLoss => "stop-loss",
            ExitKind::TakeProfit => "take-profit",
            ExitKind::Signal => "signal",
        };
        write!(f, "{name}")
    }
}

/// A position currently held. At most one exists at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub side: Side,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub entry_row: usize,
}

impl OpenPosition {
    pub fn close(self, exit_date: NaiveDate, exit_price: f64, exit_kind: ExitKind) -> Trade {
        let pnl = match self.side {
            Side::Buy => exit_price - self.entry_price,
            Side::Sell => self.entry_price - exit_price,
        };
        Trade {
            side: self.side,
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            exit_date,
            exit_price,
            exit_kind,
            pnl,
        }
    }
}

/// A completed round trip. PnL is per unit, price difference signed by
/// side.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub side: Side,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub exit_kind: ExitKind,
    pub pnl: f64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
