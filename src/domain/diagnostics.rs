//! Per-run diagnostic log.
//!
//! Recoverable failures (an indicator step whose operand resolves to
//! nothing, a rule comparison over a null cell) are recorded here instead
//! of aborting the surrounding loop. Callers can inspect, count, and print
//! the events after a run.

use std::fmt;

/// Why a step, function, or rule evaluation was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Arithmetic step left column not present in the table.
    MissingLeftColumn { column: String },
    /// Right operand resolved to neither a parameter, a column, nor a number.
    UnresolvedOperand { operand: String },
    /// Right operand is a literal zero under division.
    DivisionByZeroLiteral,
    /// Function not registered under this name.
    UnknownFunction { function: String },
    /// One or more declared input columns are absent.
    MissingInputColumn { column: String },
    /// Function output length does not match the table row count.
    LengthMismatch { expected: usize, got: usize },
    /// Function returned a different number of series than declared outputs.
    OutputCountMismatch { declared: usize, returned: usize },
    /// Function invocation itself failed (arity, bad parameter).
    FunctionFailed { message: String },
    /// Rule comparison referenced a column the table does not have.
    MissingRuleColumn { column: String },
    /// Rule comparison hit a null (NaN) cell.
    NullOperand { column: String, row: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingLeftColumn { column } => {
                write!(f, "left column '{column}' not in table")
            }
            SkipReason::UnresolvedOperand { operand } => {
                write!(f, "operand '{operand}' is neither a parameter, column, nor number")
            }
            SkipReason::DivisionByZeroLiteral => write!(f, "division by literal zero"),
            SkipReason::UnknownFunction { function } => {
                write!(f, "function '{function}' not registered")
            }
            SkipReason::MissingInputColumn { column } => {
                write!(f, "input column '{column}' not in table")
            }
            SkipReason::LengthMismatch { expected, got } => {
                write!(f, "output length {got} != table length {expected}")
            }
            SkipReason::OutputCountMismatch { declared, returned } => {
                write!(f, "function returned {returned} series, {declared} declared")
            }
            SkipReason::FunctionFailed { message } => {
                write!(f, "function invocation failed: {message}")
            }
            SkipReason::MissingRuleColumn { column } => {
                write!(f, "rule column '{column}' not in table")
            }
            SkipReason::NullOperand { column, row } => {
                write!(f, "null value in '{column}' at row {row}")
            }
        }
    }
}

/// One recorded skip: where it happened and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipEvent {
    /// Indicator output name or rule key the event belongs to.
    pub context: String,
    pub reason: SkipReason,
}

impl fmt::Display for SkipEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.reason)
    }
}

/// Accumulated skips for one run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    events: Vec<SkipEvent>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, context: impl Into<String>, reason: SkipReason) {
        self.events.push(SkipEvent {
            context: context.into(),
            reason,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[SkipEvent] {
        &self.events
    }

    /// Fold another run's events into this log.
    pub fn merge(&mut self, other: Diagnostics) {
        self.events.extend(other.events);
    }
}
