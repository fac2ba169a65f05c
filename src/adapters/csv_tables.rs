//! CSV table adapter.
//!
//! Market data carries Date,Open,High,Low,Close,Volume plus any number of
//! extra numeric columns (a forecast column, precomputed signals). Rule
//! and indicator tables are one row per line with a header row.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::error::RolltraderError;
use crate::domain::position::Trade;
use crate::domain::rule::{CmpOp, Connective, RuleCategory, RuleRow};
use crate::domain::spec::{ArithmeticStep, BinOp, Combine, FunctionSpec};
use crate::domain::table::MarketTable;
use crate::ports::config_port::ConfigPort;
use crate::ports::table_port::TablePort;

pub struct CsvTableAdapter {
    market: PathBuf,
    rules: PathBuf,
    arithmetic: Option<PathBuf>,
    functions: Option<PathBuf>,
}

impl CsvTableAdapter {
    pub fn new(
        market: PathBuf,
        rules: PathBuf,
        arithmetic: Option<PathBuf>,
        functions: Option<PathBuf>,
    ) -> Self {
        Self {
            market,
            rules,
            arithmetic,
            functions,
        }
    }

    /// Paths from the [data] section; market and rules are required.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RolltraderError> {
        let required = |key: &str| {
            config
                .get_string("data", key)
                .ok_or_else(|| RolltraderError::ConfigMissing {
                    section: "data".into(),
                    key: key.into(),
                })
        };
        Ok(Self {
            market: PathBuf::from(required("market")?),
            rules: PathBuf::from(required("rules")?),
            arithmetic: config.get_string("data", "arithmetic").map(PathBuf::from),
            functions: config.get_string("data", "functions").map(PathBuf::from),
        })
    }
}

impl TablePort for CsvTableAdapter {
    fn load_market(&self) -> Result<MarketTable, RolltraderError> {
        load_market_csv(&self.market)
    }

    fn load_rules(&self) -> Result<Vec<RuleRow>, RolltraderError> {
        load_rules_csv(&self.rules)
    }

    fn load_arithmetic(&self) -> Result<Vec<ArithmeticStep>, RolltraderError> {
        match &self.arithmetic {
            Some(path) => load_arithmetic_csv(path),
            None => Ok(Vec::new()),
        }
    }

    fn load_functions(&self) -> Result<Vec<FunctionSpec>, RolltraderError> {
        match &self.functions {
            Some(path) => load_functions_csv(path),
            None => Ok(Vec::new()),
        }
    }
}

fn data_error(path: &Path, reason: impl Into<String>) -> RolltraderError {
    RolltraderError::Data {
        file: path.display().to_string(),
        reason: reason.into(),
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, RolltraderError> {
    csv::Reader::from_path(path).map_err(|e| data_error(path, e.to_string()))
}

fn header_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn field<'a>(record: &'a csv::StringRecord, index: Option<usize>) -> &'a str {
    index.and_then(|i| record.get(i)).unwrap_or("").trim()
}

/// Load the market table. Base OHLCV columns are required; every other
/// header becomes an extra f64 column with blanks and non-numbers as null.
pub fn load_market_csv(path: &Path) -> Result<MarketTable, RolltraderError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|e| data_error(path, e.to_string()))?
        .clone();

    let date_idx = header_index(&headers, "Date")
        .ok_or_else(|| data_error(path, "missing Date column"))?;
    let mut base_idx = [0usize; 5];
    let base_names = ["Open", "High", "Low", "Close", "Volume"];
    for (slot, name) in base_idx.iter_mut().zip(base_names) {
        *slot = header_index(&headers, name)
            .ok_or_else(|| data_error(path, format!("missing {name} column")))?;
    }
    let extra: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_idx && !base_idx.contains(i))
        .map(|(i, name)| (i, name.trim().to_string()))
        .filter(|(_, name)| !name.is_empty())
        .collect();

    struct Row {
        date: NaiveDate,
        base: [f64; 5],
        extra: Vec<f64>,
    }
    let mut rows: Vec<Row> = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| data_error(path, e.to_string()))?;
        let date_str = field(&record, Some(date_idx));
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|e| data_error(path, format!("row {}: invalid date: {e}", line + 1)))?;
        let mut base = [0.0; 5];
        for (value, (idx, name)) in base.iter_mut().zip(base_idx.iter().zip(base_names)) {
            let raw = field(&record, Some(*idx));
            *value = raw.parse().map_err(|_| {
                data_error(path, format!("row {}: invalid {name} value '{raw}'", line + 1))
            })?;
        }
        let extra_values = extra
            .iter()
            .map(|(idx, _)| field(&record, Some(*idx)).parse().unwrap_or(f64::NAN))
            .collect();
        rows.push(Row {
            date,
            base,
            extra: extra_values,
        });
    }
    if rows.is_empty() {
        return Err(RolltraderError::NoData);
    }
    rows.sort_by_key(|r| r.date);

    let dates = rows.iter().map(|r| r.date).collect();
    let column = |i: usize| rows.iter().map(|r| r.base[i]).collect();
    let mut table = MarketTable::from_ohlcv(
        dates,
        column(0),
        column(1),
        column(2),
        column(3),
        column(4),
    );
    for (slot, (_, name)) in extra.iter().enumerate() {
        table.insert_column(name, rows.iter().map(|r| r.extra[slot]).collect());
    }
    Ok(table)
}

/// Load rule rows. An unrecognized category or operator is an error; a
/// dropped row would silently disable the rule it carried.
pub fn load_rules_csv(path: &Path) -> Result<Vec<RuleRow>, RolltraderError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|e| data_error(path, e.to_string()))?
        .clone();
    let category_idx = header_index(&headers, "Category");
    let left_idx = header_index(&headers, "Left");
    let op_idx = header_index(&headers, "Operator");
    let right_idx = header_index(&headers, "Right");
    let connective_idx = header_index(&headers, "Connective");
    let action_idx = header_index(&headers, "ActionAt");

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| data_error(path, e.to_string()))?;
        let category_str = field(&record, category_idx);
        let category = RuleCategory::parse(category_str).ok_or_else(|| {
            data_error(
                path,
                format!("row {}: unknown category '{category_str}'", line + 1),
            )
        })?;
        let op_str = field(&record, op_idx);
        let op = CmpOp::parse(op_str).ok_or_else(|| {
            data_error(path, format!("row {}: invalid operator '{op_str}'", line + 1))
        })?;
        let action = field(&record, action_idx);
        rows.push(RuleRow {
            category,
            left: field(&record, left_idx).to_string(),
            op,
            right: field(&record, right_idx).to_string(),
            connective: Connective::parse(field(&record, connective_idx)),
            action_at: (!action.is_empty()).then(|| action.to_string()),
        });
    }
    Ok(rows)
}

/// Load arithmetic steps: Output,Left,Operator,Operand,Combine.
pub fn load_arithmetic_csv(path: &Path) -> Result<Vec<ArithmeticStep>, RolltraderError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|e| data_error(path, e.to_string()))?
        .clone();
    let output_idx = header_index(&headers, "Output");
    let left_idx = header_index(&headers, "Left");
    let op_idx = header_index(&headers, "Operator");
    let operand_idx = header_index(&headers, "Operand");
    let combine_idx = header_index(&headers, "Combine");

    let mut steps = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| data_error(path, e.to_string()))?;
        let output = field(&record, output_idx);
        if output.is_empty() {
            continue;
        }
        let op_str = field(&record, op_idx);
        let op = BinOp::parse(op_str).ok_or_else(|| {
            data_error(path, format!("row {}: invalid operator '{op_str}'", line + 1))
        })?;
        steps.push(ArithmeticStep {
            output: output.to_string(),
            left: field(&record, left_idx).to_string(),
            op,
            operand: field(&record, operand_idx).to_string(),
            combine: Combine::parse(field(&record, combine_idx)),
        });
    }
    Ok(steps)
}

/// Load function specs: Outputs,Function,Inputs,Params, names comma-joined
/// within a cell.
pub fn load_functions_csv(path: &Path) -> Result<Vec<FunctionSpec>, RolltraderError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|e| data_error(path, e.to_string()))?
        .clone();
    let outputs_idx = header_index(&headers, "Outputs");
    let function_idx = header_index(&headers, "Function");
    let inputs_idx = header_index(&headers, "Inputs");
    let params_idx = header_index(&headers, "Params");

    let mut specs = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| data_error(path, e.to_string()))?;
        let outputs = FunctionSpec::split_names(field(&record, outputs_idx));
        let function = field(&record, function_idx).to_string();
        if outputs.is_empty() || function.is_empty() {
            continue;
        }
        specs.push(FunctionSpec {
            outputs,
            function,
            inputs: FunctionSpec::split_names(field(&record, inputs_idx)),
            params: FunctionSpec::split_names(field(&record, params_idx)),
        });
    }
    Ok(specs)
}

/// Write a trade ledger as CSV, one row per closed trade.
pub fn write_ledger_csv(path: &Path, trades: &[Trade]) -> Result<(), RolltraderError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| data_error(path, e.to_string()))?;
    writer
        .write_record([
            "Side",
            "EntryDate",
            "EntryPrice",
            "ExitDate",
            "ExitPrice",
            "ExitKind",
            "Pnl",
        ])
        .map_err(|e| data_error(path, e.to_string()))?;
    for trade in trades {
        writer
            .write_record([
                trade.side.to_string(),
                trade.entry_date.to_string(),
                trade.entry_price.to_string(),
                trade.exit_date.to_string(),
                trade.exit_price.to_string(),
                trade.exit_kind.to_string(),
                trade.pnl.to_string(),
            ])
            .map_err(|e| data_error(path, e.to_string()))?;
    }
    writer.flush().map_err(|e| data_error(path, e.to_string()))?;
    Ok(())
}
