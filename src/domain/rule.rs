//! Trading rule rows and the compiled condition tree.
//!
//! A rule table row names a category ("Enter-Buy", "StopLoss-long", ...),
//! a comparison between a column and a column-or-literal, an optional
//! connective chaining it to the next row, and the price field the action
//! executes at. Rows compile into [`Condition`] trees grouped per
//! (category, action-at) key.

use std::fmt;

/// Which side of the market a rule concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Rule category: what the rule triggers when its condition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCategory {
    EnterBuy,
    EnterSell,
    StopLossLong,
    StopLossShort,
    TakeProfitLong,
    TakeProfitShort,
    ExitLong,
    ExitShort,
}

impl RuleCategory {
    /// Parse the rule table's category cell. Matching is case-insensitive
    /// and ignores hyphen placement, so the canonical "StopLoss-long" and
    /// the spelled-out "stop-loss-long" both resolve.
    pub fn parse(text: &str) -> Option<RuleCategory> {
        let folded: String = text
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "enterbuy" => Some(RuleCategory::EnterBuy),
            "entersell" => Some(RuleCategory::EnterSell),
            "stoplosslong" => Some(RuleCategory::StopLossLong),
            "stoplossshort" => Some(RuleCategory::StopLossShort),
            "takeprofitlong" => Some(RuleCategory::TakeProfitLong),
            "takeprofitshort" => Some(RuleCategory::TakeProfitShort),
            "exitlong" => Some(RuleCategory::ExitLong),
            "exitshort" => Some(RuleCategory::ExitShort),
            _ => None,
        }
    }

    /// True for the two entry categories.
    pub fn is_entry(&self) -> bool {
        matches!(self, RuleCategory::EnterBuy | RuleCategory::EnterSell)
    }

    /// The position side this category opens or closes.
    pub fn side(&self) -> Side {
        match self {
            RuleCategory::EnterBuy
            | RuleCategory::StopLossLong
            | RuleCategory::TakeProfitLong
            | RuleCategory::ExitLong => Side::Buy,
            RuleCategory::EnterSell
            | RuleCategory::StopLossShort
            | RuleCategory::TakeProfitShort
            | RuleCategory::ExitShort => Side::Sell,
        }
    }

    /// Exit priority class, lowest evaluates first.
    pub fn exit_rank(&self) -> Option<u8> {
        match self {
            RuleCategory::StopLossLong | RuleCategory::StopLossShort => Some(0),
            RuleCategory::TakeProfitLong | RuleCategory::TakeProfitShort => Some(1),
            RuleCategory::ExitLong | RuleCategory::ExitShort => Some(2),
            RuleCategory::EnterBuy | RuleCategory::EnterSell => None,
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleCategory::EnterBuy => "Enter-Buy",
            RuleCategory::EnterSell => "Enter-Sell",
            RuleCategory::StopLossLong => "StopLoss-long",
            RuleCategory::StopLossShort => "StopLoss-short",
            RuleCategory::TakeProfitLong => "TakeProfit-long",
            RuleCategory::TakeProfitShort => "TakeProfit-short",
            RuleCategory::ExitLong => "Exit-long",
            RuleCategory::ExitShort => "Exit-short",
        };
        write!(f, "{name}")
    }
}

/// Comparison operator between a rule's two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn parse(text: &str) -> Option<CmpOp> {
        match text.trim() {
            ">" => Some(CmpOp::Gt),
            "<" => Some(CmpOp::Lt),
            ">=" => Some(CmpOp::Ge),
            "<=" => Some(CmpOp::Le),
            "==" | "=" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            _ => None,
        }
    }

    pub fn apply(&self, left: f64, right: f64) -> bool {
        match self {
            CmpOp::Gt => left > right,
            CmpOp::Lt => left < right,
            CmpOp::Ge => left >= right,
            CmpOp::Le => left <= right,
            CmpOp::Eq => left == right,
            CmpOp::Ne => left != right,
        }
    }
}

/// Connective linking a rule row to the one after it. AND binds tighter
/// than OR when rows compile into a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn parse(text: &str) -> Option<Connective> {
        match text.trim().to_ascii_lowercase().as_str() {
            "and" | "&" => Some(Connective::And),
            "or" | "|" => Some(Connective::Or),
            _ => None,
        }
    }
}

/// One row of the rule table, as loaded. Compilation turns consecutive
/// rows of a key into a [`Condition`].
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRow {
    pub category: RuleCategory,
    pub left: String,
    pub op: CmpOp,
    /// Column name or non-negative numeric literal.
    pub right: String,
    /// Connective to the following row of the same key, if any.
    pub connective: Option<Connective>,
    /// Price field the triggered action executes at; None means the
    /// category default (Open for entries, Close for exits).
    pub action_at: Option<String>,
}

/// Identity of a compiled rule group. Distinct action-at fields under the
/// same category stay separate so each fires at its own price.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub category: RuleCategory,
    pub action_at: Option<String>,
}

impl RuleKey {
    /// The price column this key's action executes at.
    pub fn price_field(&self) -> &str {
        match &self.action_at {
            Some(field) => field,
            None if self.category.is_entry() => crate::domain::table::OPEN,
            None => crate::domain::table::CLOSE,
        }
    }
}

/// Right-hand operand of a compiled comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Literal(f64),
}

/// Compiled boolean condition over a table row.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Cmp {
        left: String,
        op: CmpOp,
        right: Operand,
    },
    /// Every child must hold.
    All(Vec<Condition>),
    /// At least one child must hold.
    Any(Vec<Condition>),
}
