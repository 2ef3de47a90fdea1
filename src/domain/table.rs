//! Tabular time series consumed by expression evaluation.
//!
//! A `Table` is an ordered set of equally long, named columns. Row order is
//! time order; rows are addressed by integer position so that lags can be
//! applied by shifting. Missing numeric values are stored as `NaN`.

use crate::domain::error::{EvalError, TableError};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Boolean(Vec<bool>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Boolean(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(rows.iter().map(|&i| v[i]).collect()),
            Column::Boolean(v) => Column::Boolean(rows.iter().map(|&i| v[i]).collect()),
            Column::Text(v) => Column::Text(rows.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    fn label(&self, row: usize) -> String {
        match self {
            Column::Numeric(v) => v[row].to_string(),
            Column::Boolean(v) => v[row].to_string(),
            Column::Text(v) => v[row].clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<(String, Column)>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. The first column fixes the row count.
    pub fn with_column(mut self, name: &str, column: Column) -> Result<Self, TableError> {
        if self.index.contains_key(name) {
            return Err(TableError::DuplicateColumn { name: name.into() });
        }
        if !self.columns.is_empty() && column.len() != self.rows {
            return Err(TableError::LengthMismatch {
                name: name.into(),
                expected: self.rows,
                found: column.len(),
            });
        }
        self.rows = column.len();
        self.index.insert(name.to_string(), self.columns.len());
        self.columns.push((name.to_string(), column));
        Ok(self)
    }

    pub fn with_numeric(self, name: &str, values: Vec<f64>) -> Result<Self, TableError> {
        self.with_column(name, Column::Numeric(values))
    }

    pub fn with_boolean(self, name: &str, values: Vec<bool>) -> Result<Self, TableError> {
        self.with_column(name, Column::Boolean(values))
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, EvalError> {
        self.index
            .get(name)
            .map(|&i| &self.columns[i].1)
            .ok_or_else(|| EvalError::MissingColumn { name: name.into() })
    }

    /// Numeric view of a column; booleans coerce to 1/0.
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>, EvalError> {
        match self.column(name)? {
            Column::Numeric(v) => Ok(v.clone()),
            Column::Boolean(v) => Ok(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()),
            Column::Text(_) => Err(EvalError::NonNumericColumn { name: name.into() }),
        }
    }

    /// Rows at the given positions, in the given order.
    pub fn take(&self, rows: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|(name, col)| (name.clone(), col.take(rows)))
                .collect(),
            index: self.index.clone(),
            rows: rows.len(),
        }
    }

    /// Rows where `mask` is true. Positions past the end of `mask` are dropped.
    pub fn filter(&self, mask: &[bool]) -> Table {
        let rows: Vec<usize> = mask
            .iter()
            .take(self.rows)
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.take(&rows)
    }

    /// Human-readable label for a row: the value of `label_column` if present,
    /// otherwise the row position.
    pub fn row_label(&self, row: usize, label_column: Option<&str>) -> String {
        label_column
            .and_then(|name| self.index.get(name))
            .map(|&i| self.columns[i].1.label(row))
            .unwrap_or_else(|| row.to_string())
    }
}

/// Shift `values` down by `lag` rows (up when negative), filling with `NaN`.
pub fn shift(values: &[f64], lag: i64) -> Vec<f64> {
    let n = values.len() as i64;
    (0..n)
        .map(|i| match i.checked_sub(lag) {
            Some(src) if (0..n).contains(&src) => values[src as usize],
            _ => f64::NAN,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new()
            .with_column(
                "date",
                Column::Text(vec!["2024-01-15".into(), "2024-01-16".into(), "2024-01-17".into()]),
            )
            .unwrap()
            .with_numeric("close", vec![105.0, 110.0, 115.0])
            .unwrap()
            .with_boolean("first", vec![true, false, false])
            .unwrap()
    }

    #[test]
    fn columns_keep_insertion_order() {
        let t = sample();
        assert_eq!(t.column_names(), vec!["date", "close", "first"]);
        assert_eq!(t.len(), 3);
        assert!(!t.is_empty());
    }

    #[test]
    fn length_mismatch_rejected() {
        let err = sample().with_numeric("open", vec![1.0]).unwrap_err();
        assert_eq!(
            err,
            TableError::LengthMismatch {
                name: "open".into(),
                expected: 3,
                found: 1
            }
        );
    }

    #[test]
    fn duplicate_column_rejected() {
        let err = sample().with_numeric("close", vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, TableError::DuplicateColumn { .. }));
    }

    #[test]
    fn numeric_coerces_booleans() {
        let t = sample();
        assert_eq!(t.numeric("first").unwrap(), vec![1.0, 0.0, 0.0]);
        assert_eq!(t.numeric("close").unwrap(), vec![105.0, 110.0, 115.0]);
    }

    #[test]
    fn numeric_rejects_text_and_missing() {
        let t = sample();
        assert_eq!(
            t.numeric("date").unwrap_err(),
            EvalError::NonNumericColumn { name: "date".into() }
        );
        assert_eq!(
            t.numeric("volume").unwrap_err(),
            EvalError::MissingColumn { name: "volume".into() }
        );
    }

    #[test]
    fn filter_selects_rows() {
        let t = sample().filter(&[false, true, true]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.numeric("close").unwrap(), vec![110.0, 115.0]);
        assert_eq!(t.row_label(0, Some("date")), "2024-01-16");
    }

    #[test]
    fn row_label_falls_back_to_position() {
        let t = sample();
        assert_eq!(t.row_label(2, None), "2");
        assert_eq!(t.row_label(2, Some("missing")), "2");
    }

    #[test]
    fn shift_lag_and_lead() {
        let v = [1.0, 2.0, 3.0];
        let lagged = shift(&v, 1);
        assert!(lagged[0].is_nan());
        assert_eq!(&lagged[1..], &[1.0, 2.0]);

        let lead = shift(&v, -1);
        assert_eq!(&lead[..2], &[2.0, 3.0]);
        assert!(lead[2].is_nan());

        assert_eq!(shift(&v, 0), v.to_vec());
        assert!(shift(&v, 5).iter().all(|x| x.is_nan()));
    }
}
