//! Row-wise evaluation of compiled conditions against a market table.

use crate::domain::rule::{Condition, Operand};
use crate::domain::table::{CellError, MarketTable};

/// Evaluate one condition tree at `row`. And/Or short-circuit; a missing
/// column or null cell surfaces as an error for the caller to treat as
/// "does not hold".
pub fn evaluate(condition: &Condition, table: &MarketTable, row: usize) -> Result<bool, CellError> {
    match condition {
        Condition::Cmp { left, op, right } => {
            let lhs = table.value(left, row)?;
            let rhs = match right {
                Operand::Literal(v) => *v,
                Operand::Column(name) => table.value(name, row)?,
            };
            Ok(op.apply(lhs, rhs))
        }
        Condition::All(children) => {
            for child in children {
                if !evaluate(child, table, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Any(children) => {
            for child in children {
                if evaluate(child, table, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// True when any expression of a group holds at `row`.
pub fn any_holds(
    expressions: &[Condition],
    table: &MarketTable,
    row: usize,
) -> Result<bool, CellError> {
    for expression in expressions {
        if evaluate(expression, table, row)? {
            return Ok(true);
        }
    }
    Ok(false)
}
