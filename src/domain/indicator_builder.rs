//! Builds derived indicator columns from arithmetic chains and registry
//! function specs. Construction never fails the run: a step or spec that
//! cannot be applied is skipped and recorded in the diagnostics log.

use std::collections::HashMap;

use crate::domain::diagnostics::{Diagnostics, SkipReason};
use crate::domain::functions::FunctionRegistry;
use crate::domain::params::{ParamMap, ParamValue};
use crate::domain::spec::{ArithmeticStep, BinOp, Combine, FunctionSpec};
use crate::domain::table::MarketTable;

/// Right operand of an arithmetic step after resolution.
enum Operand<'a> {
    Scalar(f64),
    Series(&'a [f64]),
}

/// Apply every arithmetic chain and function spec to a copy of `table`,
/// returning the enriched table. Column insertion order is deterministic:
/// arithmetic outputs in first-seen chain order, then function outputs in
/// spec order.
pub fn build_indicators(
    table: &MarketTable,
    params: &ParamMap,
    arithmetic: &[ArithmeticStep],
    functions: &[FunctionSpec],
    registry: &FunctionRegistry,
    diagnostics: &mut Diagnostics,
) -> MarketTable {
    let mut out = table.clone();
    apply_arithmetic(&mut out, params, arithmetic, diagnostics);
    apply_functions(&mut out, params, functions, registry, diagnostics);
    out
}

fn apply_arithmetic(
    table: &mut MarketTable,
    params: &ParamMap,
    steps: &[ArithmeticStep],
    diagnostics: &mut Diagnostics,
) {
    for (output, chain) in group_by_output(steps) {
        // The combination operator on a row governs how the NEXT row's
        // result is folded in; END resets the running series. A skipped
        // row leaves the operator of the last applied row in force.
        let mut running: Option<Vec<f64>> = None;
        let mut pending: Option<Combine> = None;
        for step in chain {
            let Some(left) = table.column(&step.left) else {
                diagnostics.record(
                    &output,
                    SkipReason::MissingLeftColumn {
                        column: step.left.clone(),
                    },
                );
                continue;
            };
            let operand = match resolve_operand(table, params, &step.operand) {
                Some(operand) => operand,
                None => {
                    diagnostics.record(
                        &output,
                        SkipReason::UnresolvedOperand {
                            operand: step.operand.clone(),
                        },
                    );
                    continue;
                }
            };
            if step.op == BinOp::Div {
                if let Operand::Scalar(v) = operand {
                    if v == 0.0 {
                        diagnostics.record(&output, SkipReason::DivisionByZeroLiteral);
                        continue;
                    }
                }
            }
            let step_result = apply_step(left, step.op, &operand);
            running = Some(match (running.take(), &pending) {
                (Some(acc), Some(Combine::Op(op))) => fold(&acc, *op, &step_result),
                // END discards the accumulator.
                _ => step_result,
            });
            pending = Some(step.combine);
        }
        if let Some(series) = running {
            table.insert_column(&output, series);
        }
    }
}

/// Chains keyed by output column, preserving first-seen order.
fn group_by_output(steps: &[ArithmeticStep]) -> Vec<(String, Vec<&ArithmeticStep>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&ArithmeticStep>> = HashMap::new();
    for step in steps {
        if !groups.contains_key(&step.output) {
            order.push(step.output.clone());
        }
        groups.entry(step.output.clone()).or_default().push(step);
    }
    order
        .into_iter()
        .map(|name| {
            let chain = groups.remove(&name).unwrap_or_default();
            (name, chain)
        })
        .collect()
}

/// Parameter name first, then column name, then numeric literal.
fn resolve_operand<'a>(
    table: &'a MarketTable,
    params: &ParamMap,
    operand: &str,
) -> Option<Operand<'a>> {
    if let Some(value) = params.get(operand) {
        return Some(Operand::Scalar(value.as_f64()));
    }
    if let Some(series) = table.column(operand) {
        return Some(Operand::Series(series));
    }
    operand.trim().parse::<f64>().ok().map(Operand::Scalar)
}

fn apply_step(left: &[f64], op: BinOp, operand: &Operand<'_>) -> Vec<f64> {
    match operand {
        Operand::Scalar(v) => left.iter().map(|l| normalize(op.apply(*l, *v))).collect(),
        Operand::Series(rhs) => left
            .iter()
            .zip(rhs.iter())
            .map(|(l, r)| normalize(op.apply(*l, *r)))
            .collect(),
    }
}

fn fold(acc: &[f64], op: BinOp, step: &[f64]) -> Vec<f64> {
    acc.iter()
        .zip(step.iter())
        .map(|(a, s)| normalize(op.apply(*a, *s)))
        .collect()
}

/// Non-finite results are stored as null (NaN).
fn normalize(v: f64) -> f64 {
    if v.is_finite() { v } else { f64::NAN }
}

fn apply_functions(
    table: &mut MarketTable,
    params: &ParamMap,
    specs: &[FunctionSpec],
    registry: &FunctionRegistry,
    diagnostics: &mut Diagnostics,
) {
    for spec in specs {
        if spec.outputs.is_empty() || spec.function.is_empty() {
            continue;
        }
        let context = spec.outputs.join(",");
        let Some(function) = registry.get(&spec.function) else {
            diagnostics.record(
                &context,
                SkipReason::UnknownFunction {
                    function: spec.function.clone(),
                },
            );
            continue;
        };
        let mut inputs: Vec<&[f64]> = Vec::with_capacity(spec.inputs.len());
        let mut missing = false;
        for name in &spec.inputs {
            match table.column(name) {
                Some(series) => inputs.push(series),
                None => {
                    diagnostics.record(
                        &context,
                        SkipReason::MissingInputColumn {
                            column: name.clone(),
                        },
                    );
                    missing = true;
                }
            }
        }
        if missing {
            continue;
        }
        let mut resolved = Vec::with_capacity(spec.params.len());
        let mut unresolved = false;
        for name in &spec.params {
            match params.get(name).copied().or_else(|| ParamValue::parse(name)) {
                Some(value) => resolved.push(value),
                None => {
                    diagnostics.record(
                        &context,
                        SkipReason::UnresolvedOperand {
                            operand: name.clone(),
                        },
                    );
                    unresolved = true;
                }
            }
        }
        if unresolved {
            continue;
        }
        let produced = match function(&inputs, &resolved) {
            Ok(series) => series,
            Err(err) => {
                diagnostics.record(
                    &context,
                    SkipReason::FunctionFailed {
                        message: err.to_string(),
                    },
                );
                continue;
            }
        };
        if produced.len() != spec.outputs.len() {
            diagnostics.record(
                &context,
                SkipReason::OutputCountMismatch {
                    declared: spec.outputs.len(),
                    returned: produced.len(),
                },
            );
            continue;
        }
        for (name, series) in spec.outputs.iter().zip(produced) {
            if series.len() != table.len() {
                diagnostics.record(
                    name,
                    SkipReason::LengthMismatch {
                        expected: table.len(),
                        got: series.len(),
                    },
                );
                continue;
            }
            let series = series.into_iter().map(normalize).collect();
            table.insert_column(name, series);
        }
    }
}
