//! Date-indexed market table.
//!
//! One row per bar, columns addressable by name. Base columns are the
//! OHLCV fields; indicator construction appends derived columns and never
//! removes anything. Cells are f64 with NaN standing for null (warmup
//! periods, failed computations).

use chrono::NaiveDate;
use std::collections::HashMap;

pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const CLOSE: &str = "Close";
pub const VOLUME: &str = "Volume";

/// Why a scalar lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellError {
    #[error("column '{0}' not in table")]
    MissingColumn(String),
    #[error("null value in '{column}' at row {row}")]
    Null { column: String, row: usize },
    #[error("row {row} out of bounds (table has {len} rows)")]
    RowOutOfBounds { row: usize, len: usize },
}

/// Ordered, column-addressable time series of bars.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketTable {
    dates: Vec<NaiveDate>,
    /// Column order as first inserted; base columns come first.
    order: Vec<String>,
    columns: HashMap<String, Vec<f64>>,
}

impl MarketTable {
    /// Build a table from parallel OHLCV vectors. Rows are sorted by date.
    pub fn from_ohlcv(
        dates: Vec<NaiveDate>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
    ) -> Self {
        let mut table = MarketTable {
            dates,
            order: Vec::new(),
            columns: HashMap::new(),
        };
        table.insert_column(OPEN, open);
        table.insert_column(HIGH, high);
        table.insert_column(LOW, low);
        table.insert_column(CLOSE, close);
        table.insert_column(VOLUME, volume);
        table.sort_by_date();
        table
    }

    fn sort_by_date(&mut self) {
        let mut idx: Vec<usize> = (0..self.dates.len()).collect();
        idx.sort_by_key(|&i| self.dates[i]);
        if idx.windows(2).all(|w| w[0] < w[1]) {
            return;
        }
        self.dates = idx.iter().map(|&i| self.dates[i]).collect();
        for values in self.columns.values_mut() {
            *values = idx.iter().map(|&i| values[i]).collect();
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn date(&self, row: usize) -> NaiveDate {
        self.dates[row]
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.order
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Insert or replace a column. New names append to the column order;
    /// existing names keep their position. Values shorter than the table
    /// are padded with NaN, longer ones truncated.
    pub fn insert_column(&mut self, name: &str, mut values: Vec<f64>) {
        values.resize(self.dates.len(), f64::NAN);
        if !self.columns.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.columns.insert(name.to_string(), values);
    }

    /// Scalar lookup guaranteeing a finite value.
    pub fn value(&self, name: &str, row: usize) -> Result<f64, CellError> {
        let column = self
            .columns
            .get(name)
            .ok_or_else(|| CellError::MissingColumn(name.to_string()))?;
        let v = *column.get(row).ok_or(CellError::RowOutOfBounds {
            row,
            len: self.dates.len(),
        })?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(CellError::Null {
                column: name.to_string(),
                row,
            })
        }
    }

    /// Like [`value`](Self::value) but falling back to another column when
    /// the first is absent (action-at price fields default to Open/Close).
    pub fn value_or(&self, name: &str, fallback: &str, row: usize) -> Result<f64, CellError> {
        match self.value(name, row) {
            Err(CellError::MissingColumn(_)) => self.value(fallback, row),
            other => other,
        }
    }

    /// Copy of the rows in `range`, preserving all columns and order.
    pub fn slice(&self, range: std::ops::Range<usize>) -> MarketTable {
        let dates = self.dates[range.clone()].to_vec();
        let mut columns = HashMap::with_capacity(self.columns.len());
        for (name, values) in &self.columns {
            columns.insert(name.clone(), values[range.clone()].to_vec());
        }
        MarketTable {
            dates,
            order: self.order.clone(),
            columns,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::tests_support::naive;
    use super::*;

    fn sample_table() -> MarketTable {
        MarketTable::from_ohlcv(
            vec![naive(1), naive(2), naive(3)],
            vec![10.0, 11.0, 12.0],
            vec![12.0, 13.0, 14.0],
            vec![9.0, 10.0, 11.0],
            vec![11.0, 12.0, 13.0],
            vec![100.0, 200.0, 300.0],
        )
    }

    #[test]
    fn base_columns_in_order() {
        let table = sample_table();
        assert_eq!(
            table.column_names(),
            &["Open", "High", "Low", "Close", "Volume"]
        );
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn rows_sorted_by_date() {
        let table = MarketTable::from_ohlcv(
            vec![naive(3), naive(1), naive(2)],
            vec![3.0, 1.0, 2.0],
            vec![3.0, 1.0, 2.0],
            vec![3.0, 1.0, 2.0],
            vec![3.0, 1.0, 2.0],
            vec![3.0, 1.0, 2.0],
        );
        assert_eq!(table.dates(), &[naive(1), naive(2), naive(3)]);
        assert_eq!(table.column(OPEN).unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn value_returns_scalar() {
        let table = sample_table();
        assert_eq!(table.value("Close", 1).unwrap(), 12.0);
    }

    #[test]
    fn value_missing_column_is_named_error() {
        let table = sample_table();
        assert_eq!(
            table.value("Sma", 0),
            Err(CellError::MissingColumn("Sma".into()))
        );
    }

    #[test]
    fn value_null_cell_is_error() {
        let mut table = sample_table();
        table.insert_column("Sma", vec![f64::NAN, 10.5, 11.5]);
        assert!(matches!(
            table.value("Sma", 0),
            Err(CellError::Null { row: 0, .. })
        ));
        assert_eq!(table.value("Sma", 1).unwrap(), 10.5);
    }

    #[test]
    fn value_or_falls_back_only_when_missing() {
        let table = sample_table();
        // Missing column falls back.
        assert_eq!(table.value_or("Mid", CLOSE, 0).unwrap(), 11.0);
        // Present column does not.
        assert_eq!(table.value_or("Open", CLOSE, 0).unwrap(), 10.0);
    }

    #[test]
    fn insert_column_appends_and_pads() {
        let mut table = sample_table();
        table.insert_column("Short", vec![1.0]);
        assert_eq!(table.column_names().last().unwrap(), "Short");
        let col = table.column("Short").unwrap();
        assert_eq!(col[0], 1.0);
        assert!(col[1].is_nan());
        assert!(col[2].is_nan());
    }

    #[test]
    fn insert_column_replaces_keeping_position() {
        let mut table = sample_table();
        table.insert_column("X", vec![1.0, 2.0, 3.0]);
        table.insert_column("Y", vec![4.0, 5.0, 6.0]);
        table.insert_column("X", vec![7.0, 8.0, 9.0]);
        let names = table.column_names();
        assert_eq!(&names[5..], &["X", "Y"]);
        assert_eq!(table.column("X").unwrap(), &[7.0, 8.0, 9.0]);
    }

    #[test]
    fn slice_preserves_columns() {
        let mut table = sample_table();
        table.insert_column("Pt", vec![10.0, 11.0, 12.0]);
        let sliced = table.slice(1..3);
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced.dates(), &[naive(2), naive(3)]);
        assert_eq!(sliced.column("Pt").unwrap(), &[11.0, 12.0]);
        assert_eq!(sliced.column_names(), table.column_names());
    }
}
