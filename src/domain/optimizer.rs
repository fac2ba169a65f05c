//! Rolling-window (walk-forward) parameter optimization.
//!
//! The series is tiled into train/test window pairs stepping by the test
//! width. Each window runs a budget of search trials on the train slice,
//! then replays the best assignment on both slices for reporting. The
//! test slice never influences the search.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::diagnostics::Diagnostics;
use crate::domain::error::RolltraderError;
use crate::domain::functions::FunctionRegistry;
use crate::domain::indicator_builder::build_indicators;
use crate::domain::metrics::Metrics;
use crate::domain::params::{ParamMap, ParamRange};
use crate::domain::position::Trade;
use crate::domain::rule::RuleRow;
use crate::domain::rule_compiler::{CompiledRules, compile_rules};
use crate::domain::search::{SearchSpace, Searcher};
use crate::domain::spec::{ArithmeticStep, FunctionSpec};
use crate::domain::strategy::run_strategy;
use crate::domain::table::MarketTable;

/// Whether a larger or smaller score is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Objective {
    #[default]
    Max,
    Min,
}

impl Objective {
    /// Case-insensitive; anything other than "min" maximizes.
    pub fn parse(text: &str) -> Objective {
        if text.trim().eq_ignore_ascii_case("min") {
            Objective::Min
        } else {
            Objective::Max
        }
    }

    /// Loss is minimized internally regardless of direction.
    pub fn loss(&self, score: f64) -> f64 {
        match self {
            Objective::Max => -score,
            Objective::Min => score,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizerSettings {
    pub train_window: usize,
    pub test_window: usize,
    pub max_evals: usize,
    pub objective: Objective,
    pub initial_cash: f64,
    pub seed: u64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        OptimizerSettings {
            train_window: 20,
            test_window: 5,
            max_evals: 100,
            objective: Objective::Max,
            initial_cash: crate::domain::metrics::DEFAULT_INITIAL_CASH,
            seed: 0,
        }
    }
}

/// Everything one optimization run reads. Slices and maps are borrowed
/// from the loaded workbook tables.
pub struct OptimizeJob<'a> {
    pub table: &'a MarketTable,
    /// Fixed parameter values; trial assignments are layered on top.
    pub static_params: &'a ParamMap,
    /// Parameters the search varies, in declaration order.
    pub optimize_params: &'a [String],
    pub ranges: &'a HashMap<String, ParamRange>,
    pub rules: &'a [RuleRow],
    pub arithmetic: &'a [ArithmeticStep],
    pub functions: &'a [FunctionSpec],
    pub registry: &'a FunctionRegistry,
    pub weights: &'a HashMap<String, f64>,
    pub settings: OptimizerSettings,
}

/// Outcome of one train/test window.
#[derive(Debug, Clone)]
pub struct WindowResult {
    pub window: usize,
    pub train_range: Range<usize>,
    pub test_range: Range<usize>,
    pub best_params: ParamMap,
    pub best_loss: f64,
    pub trials_run: usize,
    pub train_metrics: Metrics,
    pub train_trades: Vec<Trade>,
    pub test_metrics: Metrics,
    pub test_trades: Vec<Trade>,
}

#[derive(Debug, Clone, Default)]
pub struct OptimizationReport {
    pub windows: Vec<WindowResult>,
    /// Diagnostics from the best-parameter replays. Trial-loop
    /// diagnostics are discarded to keep the report bounded.
    pub diagnostics: Diagnostics,
    pub interrupted: bool,
}

impl OptimizationReport {
    /// Test-slice trades from every window, concatenated in window order.
    pub fn combined_test_trades(&self) -> Vec<Trade> {
        self.windows
            .iter()
            .flat_map(|w| w.test_trades.iter().cloned())
            .collect()
    }

    /// The window whose best trial achieved the lowest loss.
    pub fn best_window(&self) -> Option<&WindowResult> {
        self.windows
            .iter()
            .min_by(|a, b| a.best_loss.total_cmp(&b.best_loss))
    }
}

/// Train/test index ranges tiling the series, stepping by the test width.
/// Bars past the last full pair are dropped.
pub fn tile_windows(
    bars: usize,
    train: usize,
    test: usize,
) -> Result<Vec<(Range<usize>, Range<usize>)>, RolltraderError> {
    if train == 0 || test == 0 || bars < train + test {
        return Err(RolltraderError::WindowTooLarge { train, test, bars });
    }
    let mut windows = Vec::new();
    let mut offset = 0;
    while offset + train + test <= bars {
        windows.push((offset..offset + train, offset + train..offset + train + test));
        offset += test;
    }
    Ok(windows)
}

/// Run the walk-forward optimization. `make_searcher` builds a fresh
/// searcher per window from a derived seed so windows are independent.
/// The stop flag is honored between trials and between windows; a stopped
/// run returns the windows finished so far.
pub fn optimize<F>(
    job: &OptimizeJob<'_>,
    mut make_searcher: F,
    stop: &AtomicBool,
) -> Result<OptimizationReport, RolltraderError>
where
    F: FnMut(u64) -> Box<dyn Searcher>,
{
    let space = search_space(job)?;
    let rules = compile_rules(job.rules);
    if rules.is_empty() {
        return Err(RolltraderError::EmptyRules);
    }
    let settings = &job.settings;
    let windows = tile_windows(job.table.len(), settings.train_window, settings.test_window)?;

    let mut report = OptimizationReport::default();
    for (window_idx, (train_range, test_range)) in windows.into_iter().enumerate() {
        if stop.load(Ordering::Relaxed) {
            report.interrupted = true;
            break;
        }
        let train = job.table.slice(train_range.clone());
        let test = job.table.slice(test_range.clone());
        let mut searcher = make_searcher(settings.seed.wrapping_add(window_idx as u64));

        let mut best: Option<(ParamMap, f64)> = None;
        let mut trials_run = 0;
        for _ in 0..settings.max_evals {
            if stop.load(Ordering::Relaxed) {
                report.interrupted = true;
                break;
            }
            let assignment = searcher.suggest(&space);
            let params = overlay(job.static_params, &assignment);
            let mut scratch = Diagnostics::new();
            let (metrics, _) = evaluate(job, &rules, &train, &params, &mut scratch)?;
            let loss = settings.objective.loss(metrics.score(job.weights));
            searcher.observe(&assignment, loss);
            trials_run += 1;
            let improved = best.as_ref().map(|(_, b)| loss < *b).unwrap_or(true);
            if improved {
                best = Some((params, loss));
            }
        }
        let Some((best_params, best_loss)) = best else {
            // Stopped before the first trial of this window.
            break;
        };

        let (train_metrics, train_trades) =
            evaluate(job, &rules, &train, &best_params, &mut report.diagnostics)?;
        let (test_metrics, test_trades) =
            evaluate(job, &rules, &test, &best_params, &mut report.diagnostics)?;

        report.windows.push(WindowResult {
            window: window_idx,
            train_range,
            test_range,
            best_params,
            best_loss,
            trials_run,
            train_metrics,
            train_trades,
            test_metrics,
            test_trades,
        });
    }
    Ok(report)
}

/// Ordered search dimensions from the declared optimize parameters.
/// Parameters without a usable range are left out; none remaining is an
/// error since no search could run.
fn search_space(job: &OptimizeJob<'_>) -> Result<SearchSpace, RolltraderError> {
    let space: SearchSpace = job
        .optimize_params
        .iter()
        .filter_map(|name| {
            job.ranges
                .get(name)
                .filter(|range| range.is_usable())
                .map(|range| (name.clone(), *range))
        })
        .collect();
    if space.is_empty() {
        return Err(RolltraderError::NoOptimizableParams {
            params: job.optimize_params.to_vec(),
        });
    }
    Ok(space)
}

fn overlay(static_params: &ParamMap, assignment: &ParamMap) -> ParamMap {
    let mut merged = static_params.clone();
    for (name, value) in assignment {
        merged.insert(name.clone(), *value);
    }
    merged
}

/// Build indicators with the assignment, run the strategy, score the
/// ledger against the slice.
fn evaluate(
    job: &OptimizeJob<'_>,
    rules: &CompiledRules,
    slice: &MarketTable,
    params: &ParamMap,
    diagnostics: &mut Diagnostics,
) -> Result<(Metrics, Vec<Trade>), RolltraderError> {
    let enriched = build_indicators(
        slice,
        params,
        job.arithmetic,
        job.functions,
        job.registry,
        diagnostics,
    );
    let trades = run_strategy(&enriched, rules, diagnostics)?;
    let metrics = Metrics::compute(&trades, &enriched, job.settings.initial_cash);
    Ok((metrics, trades))
}
