//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};

use crate::adapters::csv_tables::{CsvTableAdapter, write_ledger_csv};
use crate::adapters::file_config_adapter::{
    FileConfigAdapter, load_optimize_params, load_params, load_ranges, load_settings,
    load_weights,
};
use crate::domain::diagnostics::Diagnostics;
use crate::domain::error::RolltraderError;
use crate::domain::functions::FunctionRegistry;
use crate::domain::indicator_builder::build_indicators;
use crate::domain::metrics::Metrics;
use crate::domain::optimizer::{OptimizeJob, optimize};
use crate::domain::rule::RuleRow;
use crate::domain::rule_compiler::compile_rules;
use crate::domain::search::RandomSearch;
use crate::domain::spec::{ArithmeticStep, FunctionSpec};
use crate::domain::strategy::run_strategy;
use crate::domain::table::MarketTable;
use crate::ports::table_port::TablePort;

#[derive(Parser, Debug)]
#[command(name = "rolltrader", about = "Walk-forward strategy optimizer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the strategy once over the whole series with static parameters
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the trade ledger to this CSV file
        #[arg(short, long)]
        ledger: Option<PathBuf>,
    },
    /// Run rolling-window optimization
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Check that config and tables load and reference each other
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest { config, ledger } => run_backtest(&config, ledger.as_deref()),
        Command::Optimize { config } => run_optimize(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = RolltraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

struct Tables {
    market: MarketTable,
    rules: Vec<RuleRow>,
    arithmetic: Vec<ArithmeticStep>,
    functions: Vec<FunctionSpec>,
}

fn load_tables(config: &FileConfigAdapter) -> Result<Tables, RolltraderError> {
    let adapter = CsvTableAdapter::from_config(config)?;
    let market = adapter.load_market()?;
    eprintln!(
        "Loaded {} bars ({} to {})",
        market.len(),
        market.date(0),
        market.date(market.len() - 1)
    );
    let rules = adapter.load_rules()?;
    let arithmetic = adapter.load_arithmetic()?;
    let functions = adapter.load_functions()?;
    eprintln!(
        "Loaded {} rule rows, {} arithmetic steps, {} function specs",
        rules.len(),
        arithmetic.len(),
        functions.len()
    );
    Ok(Tables {
        market,
        rules,
        arithmetic,
        functions,
    })
}

fn run_backtest(config_path: &PathBuf, ledger: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match backtest(&config, ledger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn backtest(config: &FileConfigAdapter, ledger: Option<&Path>) -> Result<(), RolltraderError> {
    let tables = load_tables(config)?;
    let params = load_params(config)?;
    let settings = load_settings(config)?;
    let registry = FunctionRegistry::with_builtins();

    let mut diagnostics = Diagnostics::new();
    let enriched = build_indicators(
        &tables.market,
        &params,
        &tables.arithmetic,
        &tables.functions,
        &registry,
        &mut diagnostics,
    );
    let rules = compile_rules(&tables.rules);
    let trades = run_strategy(&enriched, &rules, &mut diagnostics)?;
    let metrics = Metrics::compute(&trades, &enriched, settings.initial_cash);

    println!("Trades:");
    for trade in &trades {
        println!(
            "  {} {} @ {:.4} -> {} @ {:.4}  pnl {:+.4}",
            trade.side,
            trade.entry_date,
            trade.entry_price,
            trade.exit_date,
            trade.exit_price,
            trade.pnl
        );
    }
    print_metrics(&metrics);
    if let Some(path) = ledger {
        write_ledger_csv(path, &trades)?;
        eprintln!("Wrote {} trades to {}", trades.len(), path.display());
    }
    report_diagnostics(&diagnostics);
    Ok(())
}

fn run_optimize(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match walk_forward(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn walk_forward(config: &FileConfigAdapter) -> Result<(), RolltraderError> {
    let tables = load_tables(config)?;
    let static_params = load_params(config)?;
    let optimize_params = load_optimize_params(config)?;
    let ranges = load_ranges(config)?;
    let weights = load_weights(config)?;
    let settings = load_settings(config)?;
    let registry = FunctionRegistry::with_builtins();

    eprintln!(
        "Optimizing {:?} over train {} / test {} bars, {} trials per window",
        optimize_params, settings.train_window, settings.test_window, settings.max_evals
    );

    let job = OptimizeJob {
        table: &tables.market,
        static_params: &static_params,
        optimize_params: &optimize_params,
        ranges: &ranges,
        rules: &tables.rules,
        arithmetic: &tables.arithmetic,
        functions: &tables.functions,
        registry: &registry,
        weights: &weights,
        settings,
    };
    let stop = AtomicBool::new(false);
    let report = optimize(&job, |seed| Box::new(RandomSearch::seeded(seed)), &stop)?;

    for window in &report.windows {
        let mut params: Vec<_> = window.best_params.iter().collect();
        params.sort_by(|a, b| a.0.cmp(b.0));
        let rendered: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!(
            "Window {} train {:?} test {:?}",
            window.window + 1,
            window.train_range,
            window.test_range
        );
        println!("  best params: {}", rendered.join(", "));
        println!(
            "  train: return {:+.4}%  sharpe {:.4}  trades {}",
            window.train_metrics.total_return_pct,
            window.train_metrics.sharpe,
            window.train_metrics.num_trades
        );
        println!(
            "  test:  return {:+.4}%  sharpe {:.4}  drawdown {:.4}%  trades {}",
            window.test_metrics.total_return_pct,
            window.test_metrics.sharpe,
            window.test_metrics.max_drawdown_pct,
            window.test_metrics.num_trades
        );
    }
    let combined = report.combined_test_trades();
    let combined_metrics = Metrics::compute(&combined, &tables.market, job.settings.initial_cash);
    println!("Combined out-of-sample ({} windows):", report.windows.len());
    print_metrics(&combined_metrics);
    if let Some(best) = report.best_window() {
        println!(
            "Best window: {} (loss {:.6})",
            best.window + 1,
            best.best_loss
        );
    }
    if report.interrupted {
        eprintln!("optimization interrupted; partial results above");
    }
    report_diagnostics(&report.diagnostics);
    Ok(())
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match validate(&config) {
        Ok(()) => {
            println!("OK");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load every table, compile the rules, and check that each column the
/// rules read will exist once indicators are built. Unknown columns only
/// warn since a custom registry could still provide them.
fn validate(config: &FileConfigAdapter) -> Result<(), RolltraderError> {
    let tables = load_tables(config)?;
    load_params(config)?;
    load_ranges(config)?;
    load_weights(config)?;
    load_settings(config)?;

    let rules = compile_rules(&tables.rules);
    if rules.is_empty() {
        return Err(RolltraderError::EmptyRules);
    }

    let mut available: Vec<&str> = tables
        .market
        .column_names()
        .iter()
        .map(String::as_str)
        .collect();
    available.extend(tables.arithmetic.iter().map(|s| s.output.as_str()));
    for spec in &tables.functions {
        available.extend(spec.outputs.iter().map(String::as_str));
    }
    for column in rules.referenced_columns() {
        if !available.contains(&column) {
            eprintln!("warning: rules reference column '{column}' that no table provides");
        }
    }
    Ok(())
}

fn print_metrics(metrics: &Metrics) {
    println!("Metrics:");
    println!("  trades:        {}", metrics.num_trades);
    println!("  return:        {:+.4}%", metrics.total_return_pct);
    println!("  win rate:      {:.2}%", metrics.win_rate_pct);
    println!("  avg trade:     {:+.4}%", metrics.avg_trade_pct);
    println!("  sharpe:        {:.4}", metrics.sharpe);
    println!("  max drawdown:  {:.4}%", metrics.max_drawdown_pct);
    println!("  sqrt mse:      {:.4}", metrics.sqrt_mse);
    if let (Some(start), Some(end)) = (metrics.start, metrics.end) {
        println!("  span:          {start} to {end} ({} days)", metrics.duration_days);
    }
}

fn report_diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    eprintln!("{} skipped evaluations:", diagnostics.len());
    for event in diagnostics.events() {
        eprintln!("  {event}");
    }
}
