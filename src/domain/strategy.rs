//! Single-position strategy executor.
//!
//! Walks the table once, bar by bar. Flat: entry groups are evaluated in
//! table order and the first that holds opens a position at its action
//! price. Holding: exit groups for the held side run in stop-loss,
//! take-profit, exit order and the first that holds closes the position.
//! The bar a position opens on is also checked for an exit. A condition
//! that cannot be evaluated (missing column, null cell) counts as not
//! holding and is recorded.

use crate::domain::diagnostics::{Diagnostics, SkipReason};
use crate::domain::error::RolltraderError;
use crate::domain::position::{ExitKind, OpenPosition, Trade};
use crate::domain::rule::RuleKey;
use crate::domain::rule_compiler::CompiledRules;
use crate::domain::rule_eval::any_holds;
use crate::domain::table::{CellError, MarketTable};

/// Run the compiled rules over the table and return the closed-trade
/// ledger. A position still open at the last bar is discarded.
pub fn run_strategy(
    table: &MarketTable,
    rules: &CompiledRules,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Trade>, RolltraderError> {
    if rules.is_empty() {
        return Err(RolltraderError::EmptyRules);
    }
    if table.is_empty() {
        return Err(RolltraderError::NoData);
    }

    let mut trades = Vec::new();
    let mut position: Option<OpenPosition> = None;

    for row in 0..table.len() {
        if position.is_none() {
            for (key, expressions) in rules.entries() {
                if holds(key, expressions, table, row, diagnostics) {
                    if let Some(price) = action_price(key, table, row, diagnostics) {
                        position = Some(OpenPosition {
                            side: key.category.side(),
                            entry_date: table.date(row),
                            entry_price: price,
                            entry_row: row,
                        });
                    }
                    break;
                }
            }
        }
        // Exits run even on the entry bar.
        if let Some(side) = position.as_ref().map(|p| p.side) {
            for (key, expressions) in rules.exits_for(side) {
                if holds(key, expressions, table, row, diagnostics) {
                    if let Some(price) = action_price(key, table, row, diagnostics) {
                        if let Some(open) = position.take() {
                            let kind = match key.category.exit_rank() {
                                Some(0) => ExitKind::StopLoss,
                                Some(1) => ExitKind::TakeProfit,
                                _ => ExitKind::Signal,
                            };
                            trades.push(open.close(table.date(row), price, kind));
                        }
                    }
                    break;
                }
            }
        }
    }

    Ok(trades)
}

fn holds(
    key: &RuleKey,
    expressions: &[crate::domain::rule::Condition],
    table: &MarketTable,
    row: usize,
    diagnostics: &mut Diagnostics,
) -> bool {
    match any_holds(expressions, table, row) {
        Ok(result) => result,
        Err(err) => {
            record_cell_error(key, err, diagnostics);
            false
        }
    }
}

/// Price the key's action executes at. Custom action fields fall back to
/// the category default when the column is absent.
fn action_price(
    key: &RuleKey,
    table: &MarketTable,
    row: usize,
    diagnostics: &mut Diagnostics,
) -> Option<f64> {
    let default = if key.category.is_entry() {
        crate::domain::table::OPEN
    } else {
        crate::domain::table::CLOSE
    };
    match table.value_or(key.price_field(), default, row) {
        Ok(price) => Some(price),
        Err(err) => {
            record_cell_error(key, err, diagnostics);
            None
        }
    }
}

fn record_cell_error(key: &RuleKey, err: CellError, diagnostics: &mut Diagnostics) {
    let context = key.category.to_string();
    let reason = match err {
        CellError::MissingColumn(column) => SkipReason::MissingRuleColumn { column },
        CellError::Null { column, row } => SkipReason::NullOperand { column, row },
        CellError::RowOutOfBounds { row, len } => SkipReason::LengthMismatch {
            expected: len,
            got: row,
        },
    };
    diagnostics.record(&context, reason);
}
