//! Indicator specification tables.
//!
//! Two flavors mirror the two builder tables: arithmetic chains (steps
//! folded into one output column) and registry-function calls (one or more
//! output columns from a named series function).

/// Binary operator an arithmetic step applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub fn parse(text: &str) -> Option<BinOp> {
        match text.trim() {
            "+" => Some(BinOp::Add),
            "-" => Some(BinOp::Sub),
            "*" => Some(BinOp::Mul),
            "/" => Some(BinOp::Div),
            "**" => Some(BinOp::Pow),
            _ => None,
        }
    }

    pub fn apply(&self, left: f64, right: f64) -> f64 {
        match self {
            BinOp::Add => left + right,
            BinOp::Sub => left - right,
            BinOp::Mul => left * right,
            BinOp::Div => left / right,
            BinOp::Pow => left.powf(right),
        }
    }
}

/// How a step's result folds into the running chain result. `End`
/// terminates (or resets) the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    Op(BinOp),
    End,
}

impl Combine {
    /// Unrecognized text reads as End, matching the builder table's
    /// blank-cell behavior.
    pub fn parse(text: &str) -> Combine {
        match BinOp::parse(text) {
            Some(op) => Combine::Op(op),
            None => Combine::End,
        }
    }
}

/// One step of an arithmetic indicator chain. Steps sharing an output name
/// form an ordered group evaluated in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticStep {
    /// Output column the chain writes.
    pub output: String,
    /// Left operand column.
    pub left: String,
    pub op: BinOp,
    /// Parameter name, column name, or numeric literal — resolved in that
    /// order at build time.
    pub operand: String,
    pub combine: Combine,
}

/// A registry-function indicator: named function over ordered input
/// columns with ordered parameters, producing one column per output name.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSpec {
    pub outputs: Vec<String>,
    pub function: String,
    pub inputs: Vec<String>,
    pub params: Vec<String>,
}

impl FunctionSpec {
    /// Split a comma-separated cell into trimmed, non-empty names.
    pub fn split_names(cell: &str) -> Vec<String> {
        cell.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
