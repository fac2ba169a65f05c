//! Integration tests.
//!
//! Tests cover:
//! - Full pipeline from INI config and CSV tables to a trade ledger
//! - Indicator construction feeding rule evaluation end to end
//! - Walk-forward optimization over a generated series
//! - Ledger invariants: one position at a time, PnL sign by side

mod common;

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use common::*;
use rolltrader::adapters::csv_tables::CsvTableAdapter;
use rolltrader::adapters::file_config_adapter::{
    FileConfigAdapter, load_optimize_params, load_params, load_ranges, load_settings,
    load_weights,
};
use rolltrader::domain::diagnostics::Diagnostics;
use rolltrader::domain::functions::FunctionRegistry;
use rolltrader::domain::indicator_builder::build_indicators;
use rolltrader::domain::metrics::Metrics;
use rolltrader::domain::optimizer::{OptimizeJob, optimize};
use rolltrader::domain::params::ParamMap;
use rolltrader::domain::position::ExitKind;
use rolltrader::domain::rule::Side;
use rolltrader::domain::rule_compiler::compile_rules;
use rolltrader::domain::search::RandomSearch;
use rolltrader::domain::strategy::run_strategy;
use rolltrader::ports::table_port::TablePort;

mod full_pipeline {
    use super::*;

    #[test]
    fn csv_and_ini_to_trade_ledger() {
        let dir = tempfile::tempdir().unwrap();
        write_market_csv(&dir.path().join("market.csv"), &[10.0, 50.0, 60.0, 5.0]);
        write_file(
            &dir.path().join("rules.csv"),
            "Category,Left,Operator,Right,Connective,ActionAt\n\
             Enter-Buy,Close,>,40,,\n\
             Exit-long,Close,<,8,,\n",
        );
        let config_path = write_config(dir.path(), "[params]\n");
        let config = FileConfigAdapter::from_file(&config_path).unwrap();

        let adapter = CsvTableAdapter::from_config(&config).unwrap();
        let market = adapter.load_market().unwrap();
        let rule_rows = adapter.load_rules().unwrap();
        let params = load_params(&config).unwrap();

        let registry = FunctionRegistry::with_builtins();
        let mut diagnostics = Diagnostics::new();
        let enriched = build_indicators(&market, &params, &[], &[], &registry, &mut diagnostics);
        let rules = compile_rules(&rule_rows);
        let trades = run_strategy(&enriched, &rules, &mut diagnostics).unwrap();

        assert_eq!(trades.len(), 1);
        let trade = &trades[0];
        assert_eq!(trade.side, Side::Buy);
        assert_eq!(trade.entry_date, date(2024, 1, 2));
        assert_eq!(trade.exit_date, date(2024, 1, 4));
        assert_eq!(trade.entry_price, 50.0);
        assert_eq!(trade.exit_price, 5.0);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn entry_that_never_exits_leaves_empty_ledger() {
        let table = table_from_closes(&[10.0, 50.0, 60.0]);
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("rules.csv"),
            "Category,Left,Operator,Right\nEnter-Buy,Close,>,40\n",
        );
        let rule_rows =
            rolltrader::adapters::csv_tables::load_rules_csv(&dir.path().join("rules.csv"))
                .unwrap();
        let rules = compile_rules(&rule_rows);
        let mut diagnostics = Diagnostics::new();
        let trades = run_strategy(&table, &rules, &mut diagnostics).unwrap();
        assert!(trades.is_empty());
        let metrics = Metrics::compute(&trades, &table, 10_000.0);
        assert_eq!(metrics.num_trades, 0);
        assert_eq!(metrics.total_return_pct, 0.0);
    }

    #[test]
    fn canonically_spelled_stop_loss_closes_the_trade() {
        let table = table_from_closes(&[50.0, 10.0]);
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("rules.csv"),
            "Category,Left,Operator,Right\n\
             Enter-Buy,Close,>,40\n\
             StopLoss-long,Close,<,20\n\
             Exit-long,Close,<,20\n",
        );
        let rule_rows =
            rolltrader::adapters::csv_tables::load_rules_csv(&dir.path().join("rules.csv"))
                .unwrap();
        assert_eq!(rule_rows.len(), 3);
        let rules = compile_rules(&rule_rows);
        let mut diagnostics = Diagnostics::new();
        let trades = run_strategy(&table, &rules, &mut diagnostics).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_kind, ExitKind::StopLoss);
    }

    #[test]
    fn rising_bars_leave_position_unrealized() {
        // Enter-Buy when Close > Open at the bar's Open; Exit-long when
        // Close < Open. Three rising bars open a position on day one and
        // never close it, so the ledger stays empty.
        let table = rolltrader::domain::table::MarketTable::from_ohlcv(
            vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)],
            vec![10.0, 11.0, 12.0],
            vec![12.0, 13.0, 14.0],
            vec![9.0, 10.0, 11.0],
            vec![11.0, 12.0, 13.0],
            vec![100.0, 100.0, 100.0],
        );
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("rules.csv"),
            "Category,Left,Operator,Right,Connective,ActionAt\n\
             Enter-Buy,Close,>,Open,,Open\n\
             Exit-long,Close,<,Open,,Close\n",
        );
        let rule_rows =
            rolltrader::adapters::csv_tables::load_rules_csv(&dir.path().join("rules.csv"))
                .unwrap();
        let rules = compile_rules(&rule_rows);
        let mut diagnostics = Diagnostics::new();
        let trades = run_strategy(&table, &rules, &mut diagnostics).unwrap();
        assert!(trades.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn indicator_construction_is_deterministic() {
        let table = table_from_closes(&(0..30).map(|i| 40.0 + (i as f64) * 1.7).collect::<Vec<_>>());
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("arithmetic.csv"),
            "Output,Left,Operator,Operand,Combine\n\
             Mom,Close,-,Open,+\n\
             Mom,Close,/,Open,END\n",
        );
        write_file(
            &dir.path().join("functions.csv"),
            "Outputs,Function,Inputs,Params\nSmooth,EMA,Close,5\n",
        );
        let arithmetic =
            rolltrader::adapters::csv_tables::load_arithmetic_csv(&dir.path().join("arithmetic.csv"))
                .unwrap();
        let functions =
            rolltrader::adapters::csv_tables::load_functions_csv(&dir.path().join("functions.csv"))
                .unwrap();
        let registry = FunctionRegistry::with_builtins();
        let params = ParamMap::new();

        let mut first_diag = Diagnostics::new();
        let first =
            build_indicators(&table, &params, &arithmetic, &functions, &registry, &mut first_diag);
        let mut second_diag = Diagnostics::new();
        let second =
            build_indicators(&table, &params, &arithmetic, &functions, &registry, &mut second_diag);
        for name in ["Mom", "Smooth"] {
            let a = first.column(name).unwrap();
            let b = second.column(name).unwrap();
            assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(b) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    #[test]
    fn indicator_table_feeds_rules() {
        let dir = tempfile::tempdir().unwrap();
        write_market_csv(
            &dir.path().join("market.csv"),
            &[10.0, 12.0, 14.0, 16.0, 18.0, 4.0],
        );
        write_file(
            &dir.path().join("arithmetic.csv"),
            "Output,Left,Operator,Operand,Combine\nLevel,Close,*,scale,END\n",
        );
        write_file(
            &dir.path().join("rules.csv"),
            "Category,Left,Operator,Right,Connective,ActionAt\n\
             Enter-Buy,Close,>,Level,,\n\
             Exit-long,Close,<,6,,\n",
        );
        let config_path = write_config(dir.path(), "[params]\nscale = 0.9\n");
        let config = FileConfigAdapter::from_file(&config_path).unwrap();
        let adapter = CsvTableAdapter::from_config(&config).unwrap();

        let market = adapter.load_market().unwrap();
        let arithmetic = adapter.load_arithmetic().unwrap();
        let rule_rows = adapter.load_rules().unwrap();
        let params = load_params(&config).unwrap();

        let registry = FunctionRegistry::with_builtins();
        let mut diagnostics = Diagnostics::new();
        let enriched =
            build_indicators(&market, &params, &arithmetic, &[], &registry, &mut diagnostics);
        assert!(enriched.has_column("Level"));

        let rules = compile_rules(&rule_rows);
        let trades = run_strategy(&enriched, &rules, &mut diagnostics).unwrap();
        // Close > 0.9 * Close holds from the first bar; exit when Close < 6.
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].entry_date, date(2024, 1, 1));
        assert_eq!(trades[0].exit_date, date(2024, 1, 6));
    }
}

mod walk_forward {
    use super::*;

    fn cyclical(len: usize) -> Vec<f64> {
        (0..len).map(|i| 50.0 + 10.0 * ((i % 5) as f64)).collect()
    }

    #[test]
    fn optimization_from_config_files() {
        let dir = tempfile::tempdir().unwrap();
        write_market_csv(&dir.path().join("market.csv"), &cyclical(40));
        write_file(
            &dir.path().join("rules.csv"),
            "Category,Left,Operator,Right,Connective,ActionAt\n\
             Enter-Buy,Close,<,55,,\n\
             Exit-long,Close,>,Target,,\n",
        );
        write_file(
            &dir.path().join("arithmetic.csv"),
            "Output,Left,Operator,Operand,Combine\nTarget,Close,+,margin,END\n",
        );
        let config_path = write_config(
            dir.path(),
            "[params]\n\
             [ranges]\nmargin = 0,30,10\n\
             [weights]\nAccReturn = 1.0\n\
             [optimize]\nparams = margin\ntrain_window = 15\ntest_window = 5\nmax_evals = 6\nseed = 3\n",
        );
        let config = FileConfigAdapter::from_file(&config_path).unwrap();
        let adapter = CsvTableAdapter::from_config(&config).unwrap();

        let market = adapter.load_market().unwrap();
        let rules = adapter.load_rules().unwrap();
        let arithmetic = adapter.load_arithmetic().unwrap();
        let functions = adapter.load_functions().unwrap();
        let static_params = load_params(&config).unwrap();
        let optimize_params = load_optimize_params(&config).unwrap();
        let ranges = load_ranges(&config).unwrap();
        let weights = load_weights(&config).unwrap();
        let settings = load_settings(&config).unwrap();
        let registry = FunctionRegistry::with_builtins();

        let job = OptimizeJob {
            table: &market,
            static_params: &static_params,
            optimize_params: &optimize_params,
            ranges: &ranges,
            rules: &rules,
            arithmetic: &arithmetic,
            functions: &functions,
            registry: &registry,
            weights: &weights,
            settings,
        };
        let stop = AtomicBool::new(false);
        let report = optimize(&job, |seed| Box::new(RandomSearch::seeded(seed)), &stop).unwrap();

        // 40 bars, train 15, test 5: windows at offsets 0, 5, 10, 15, 20.
        assert_eq!(report.windows.len(), 5);
        for window in &report.windows {
            assert_eq!(window.trials_run, 6);
            assert!(window.best_params.contains_key("margin"));
            assert_eq!(window.test_range.len(), 5);
            // Train slice always directly precedes the test slice.
            assert_eq!(window.train_range.end, window.test_range.start);
        }
    }

    #[test]
    fn identical_seeds_reproduce_results() {
        let market = table_from_closes(&cyclical(30));
        let rules_csv = tempfile::tempdir().unwrap();
        write_file(
            &rules_csv.path().join("rules.csv"),
            "Category,Left,Operator,Right\nEnter-Buy,Close,<,55\nExit-long,Close,>,75\n",
        );
        let rules =
            rolltrader::adapters::csv_tables::load_rules_csv(&rules_csv.path().join("rules.csv"))
                .unwrap();
        let static_params = ParamMap::new();
        let optimize_params = vec!["margin".to_string()];
        let mut ranges = HashMap::new();
        ranges.insert(
            "margin".to_string(),
            rolltrader::domain::params::ParamRange::new(0.0, 30.0, 10.0),
        );
        let mut weights = HashMap::new();
        weights.insert("AccReturn".to_string(), 1.0);
        let registry = FunctionRegistry::with_builtins();
        let settings = rolltrader::domain::optimizer::OptimizerSettings {
            train_window: 12,
            test_window: 6,
            max_evals: 5,
            seed: 11,
            ..Default::default()
        };

        let run = || {
            let job = OptimizeJob {
                table: &market,
                static_params: &static_params,
                optimize_params: &optimize_params,
                ranges: &ranges,
                rules: &rules,
                arithmetic: &[],
                functions: &[],
                registry: &registry,
                weights: &weights,
                settings: settings.clone(),
            };
            let stop = AtomicBool::new(false);
            optimize(&job, |seed| Box::new(RandomSearch::seeded(seed)), &stop).unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.windows.len(), second.windows.len());
        for (a, b) in first.windows.iter().zip(&second.windows) {
            assert_eq!(a.best_params, b.best_params);
            assert_eq!(a.best_loss, b.best_loss);
        }
    }
}

mod ledger_invariants {
    use super::*;

    #[test]
    fn trades_never_overlap() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 50.0 + 30.0 * ((i as f64) * 0.7).sin())
            .collect();
        let table = table_from_closes(&closes);
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("rules.csv"),
            "Category,Left,Operator,Right\n\
             Enter-Buy,Close,<,30\n\
             Exit-long,Close,>,70\n\
             Stop-loss-long,Close,<,22\n",
        );
        let rules = compile_rules(
            &rolltrader::adapters::csv_tables::load_rules_csv(&dir.path().join("rules.csv"))
                .unwrap(),
        );
        let mut diagnostics = Diagnostics::new();
        let trades = run_strategy(&table, &rules, &mut diagnostics).unwrap();
        assert!(!trades.is_empty());
        for trade in &trades {
            assert!(trade.exit_date >= trade.entry_date);
        }
        for pair in trades.windows(2) {
            // Next entry only after the previous exit.
            assert!(pair[1].entry_date >= pair[0].exit_date);
        }
    }

    #[test]
    fn pnl_sign_matches_side_and_prices() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 50.0 + 30.0 * ((i as f64) * 0.9).cos())
            .collect();
        let table = table_from_closes(&closes);
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("rules.csv"),
            "Category,Left,Operator,Right\n\
             Enter-Sell,Close,>,70\n\
             Exit-short,Close,<,30\n",
        );
        let rules = compile_rules(
            &rolltrader::adapters::csv_tables::load_rules_csv(&dir.path().join("rules.csv"))
                .unwrap(),
        );
        let mut diagnostics = Diagnostics::new();
        let trades = run_strategy(&table, &rules, &mut diagnostics).unwrap();
        assert!(!trades.is_empty());
        for trade in &trades {
            assert_eq!(trade.side, Side::Sell);
            let expected = trade.entry_price - trade.exit_price;
            assert!((trade.pnl - expected).abs() < 1e-12);
        }
    }
}
