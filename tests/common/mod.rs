//! Shared helpers for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rolltrader::domain::table::MarketTable;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// One bar per consecutive day from 2024-01-01, Open equal to Close.
pub fn table_from_closes(closes: &[f64]) -> MarketTable {
    let start = date(2024, 1, 1);
    let dates = (0..closes.len())
        .map(|i| start + chrono::Days::new(i as u64))
        .collect();
    MarketTable::from_ohlcv(
        dates,
        closes.to_vec(),
        closes.iter().map(|c| c + 1.0).collect(),
        closes.iter().map(|c| c - 1.0).collect(),
        closes.to_vec(),
        vec![1_000.0; closes.len()],
    )
}

/// Write a market CSV with the same shape as [`table_from_closes`].
pub fn write_market_csv(path: &Path, closes: &[f64]) {
    let start = date(2024, 1, 1);
    let mut content = String::from("Date,Open,High,Low,Close,Volume\n");
    for (i, close) in closes.iter().enumerate() {
        let day = start + chrono::Days::new(i as u64);
        content.push_str(&format!(
            "{day},{close},{},{},{close},1000\n",
            close + 1.0,
            close - 1.0
        ));
    }
    fs::write(path, content).unwrap();
}

pub fn write_file(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

/// Config file pointing at tables inside `dir`, plus extra sections.
pub fn write_config(dir: &Path, extra_sections: &str) -> PathBuf {
    let config_path = dir.join("job.ini");
    let mut content = format!(
        "[data]\nmarket = {}\nrules = {}\n",
        dir.join("market.csv").display(),
        dir.join("rules.csv").display()
    );
    if dir.join("arithmetic.csv").exists() {
        content.push_str(&format!(
            "arithmetic = {}\n",
            dir.join("arithmetic.csv").display()
        ));
    }
    if dir.join("functions.csv").exists() {
        content.push_str(&format!(
            "functions = {}\n",
            dir.join("functions.csv").display()
        ));
    }
    content.push_str(extra_sections);
    fs::write(&config_path, content).unwrap();
    config_path
}
