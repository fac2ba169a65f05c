//! Compiles rule table rows into condition trees.
//!
//! Rows are grouped by (category, action-at) key in first-seen order.
//! Within a key, consecutive rows linked by connectives form one
//! expression; a row without a connective closes the expression and the
//! next row starts a new one. A key holds a list of expressions and fires
//! when any of them holds. AND binds tighter than OR.

use crate::domain::rule::{Condition, Connective, Operand, RuleKey, RuleRow, Side};

/// Rule groups in table order, each with its compiled expressions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledRules {
    groups: Vec<(RuleKey, Vec<Condition>)>,
}

impl CompiledRules {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = (&RuleKey, &[Condition])> {
        self.groups.iter().map(|(k, c)| (k, c.as_slice()))
    }

    /// Entry keys in table order.
    pub fn entries(&self) -> impl Iterator<Item = (&RuleKey, &[Condition])> {
        self.groups().filter(|(k, _)| k.category.is_entry())
    }

    /// Exit keys for a held side, ordered stop-loss, take-profit, exit.
    /// Ties keep table order.
    pub fn exits_for(&self, side: Side) -> Vec<(&RuleKey, &[Condition])> {
        let mut exits: Vec<_> = self
            .groups()
            .filter(|(k, _)| !k.category.is_entry() && k.category.side() == side)
            .collect();
        exits.sort_by_key(|(k, _)| k.category.exit_rank());
        exits
    }

    /// Every column name the compiled conditions read, deduplicated.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for (_, conditions) in &self.groups {
            for condition in conditions {
                collect_columns(condition, &mut names);
            }
        }
        names.sort_unstable();
        names.dedup();
        names
    }
}

fn collect_columns<'a>(condition: &'a Condition, names: &mut Vec<&'a str>) {
    match condition {
        Condition::Cmp { left, right, .. } => {
            names.push(left.as_str());
            if let Operand::Column(column) = right {
                names.push(column.as_str());
            }
        }
        Condition::All(children) | Condition::Any(children) => {
            for child in children {
                collect_columns(child, names);
            }
        }
    }
}

/// Compile rows into grouped condition trees. A dangling connective on the
/// last row of a key is dropped.
pub fn compile_rules(rows: &[RuleRow]) -> CompiledRules {
    let mut groups: Vec<(RuleKey, Vec<&RuleRow>)> = Vec::new();
    for row in rows {
        let key = RuleKey {
            category: row.category,
            action_at: row.action_at.clone(),
        };
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    CompiledRules {
        groups: groups
            .into_iter()
            .map(|(key, rows)| {
                let expressions = compile_expressions(&rows);
                (key, expressions)
            })
            .collect(),
    }
}

/// Split a key's rows into expressions at rows without a connective, then
/// build each expression's tree.
fn compile_expressions(rows: &[&RuleRow]) -> Vec<Condition> {
    let mut expressions = Vec::new();
    let mut current: Vec<(&RuleRow, Option<Connective>)> = Vec::new();
    for row in rows {
        current.push((row, row.connective));
        if row.connective.is_none() {
            expressions.push(build_tree(&current));
            current.clear();
        }
    }
    if !current.is_empty() {
        // Last row carried a connective with nothing after it.
        expressions.push(build_tree(&current));
    }
    expressions
}

/// OR over runs of AND-linked comparisons.
fn build_tree(rows: &[(&RuleRow, Option<Connective>)]) -> Condition {
    let mut or_terms: Vec<Condition> = Vec::new();
    let mut and_run: Vec<Condition> = Vec::new();
    for (row, connective) in rows {
        and_run.push(leaf(row));
        match connective {
            Some(Connective::And) => {}
            _ => {
                or_terms.push(collapse_all(std::mem::take(&mut and_run)));
            }
        }
    }
    if !and_run.is_empty() {
        or_terms.push(collapse_all(and_run));
    }
    if or_terms.len() == 1 {
        or_terms.pop().unwrap()
    } else {
        Condition::Any(or_terms)
    }
}

fn collapse_all(mut run: Vec<Condition>) -> Condition {
    if run.len() == 1 {
        run.pop().unwrap()
    } else {
        Condition::All(run)
    }
}

fn leaf(row: &RuleRow) -> Condition {
    Condition::Cmp {
        left: row.left.clone(),
        op: row.op,
        right: classify_operand(&row.right),
    }
}

/// A right operand is a literal only when it is a plain non-negative
/// number: digits with at most one decimal point. Everything else is a
/// column reference, including negative-looking text.
pub fn classify_operand(text: &str) -> Operand {
    let trimmed = text.trim();
    if is_plain_number(trimmed) {
        if let Ok(v) = trimmed.parse::<f64>() {
            return Operand::Literal(v);
        }
    }
    Operand::Column(trimmed.to_string())
}

fn is_plain_number(text: &str) -> bool {
    !text.is_empty()
        && text.chars().all(|c| c.is_ascii_digit() || c == '.')
        && text.chars().filter(|c| *c == '.').count() <= 1
        && text.chars().any(|c| c.is_ascii_digit())
}
