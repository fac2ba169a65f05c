//! Table loading port trait.

use crate::domain::error::RolltraderError;
use crate::domain::rule::RuleRow;
use crate::domain::spec::{ArithmeticStep, FunctionSpec};
use crate::domain::table::MarketTable;

pub trait TablePort {
    fn load_market(&self) -> Result<MarketTable, RolltraderError>;
    fn load_rules(&self) -> Result<Vec<RuleRow>, RolltraderError>;
    /// Arithmetic indicator steps; an absent table means none.
    fn load_arithmetic(&self) -> Result<Vec<ArithmeticStep>, RolltraderError>;
    /// Function indicator specs; an absent table means none.
    fn load_functions(&self) -> Result<Vec<FunctionSpec>, RolltraderError>;
}
