#![allow(dead_code)]

use barsignal::domain::error::BarsignalError;
use barsignal::domain::table::{Column, Table};
use barsignal::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub tables: HashMap<String, Table>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_table(mut self, source: &str, table: Table) -> Self {
        self.tables.insert(source.to_string(), table);
        self
    }

    pub fn with_error(mut self, source: &str, reason: &str) -> Self {
        self.errors.insert(source.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_table(&self, source: &str) -> Result<Table, BarsignalError> {
        if let Some(reason) = self.errors.get(source) {
            return Err(BarsignalError::Data {
                reason: reason.clone(),
            });
        }
        self.tables
            .get(source)
            .cloned()
            .ok_or_else(|| BarsignalError::Data {
                reason: format!("no such source: {}", source),
            })
    }

    fn list_sources(&self) -> Result<Vec<String>, BarsignalError> {
        let mut sources: Vec<String> = self.tables.keys().cloned().collect();
        sources.sort();
        Ok(sources)
    }
}

/// Daily bars starting 2024-01-01 with `open = close - 0.5` on up days.
pub fn make_bars(closes: &[f64]) -> Table {
    let dates: Vec<String> = (0..closes.len())
        .map(|i| format!("2024-01-{:02}", i + 1))
        .collect();
    let opens: Vec<f64> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| if i % 2 == 0 { c - 0.5 } else { c + 0.5 })
        .collect();
    let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
    let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
    let first: Vec<bool> = (0..closes.len()).map(|i| i == 0).collect();

    Table::new()
        .with_column("date", Column::Text(dates))
        .unwrap()
        .with_numeric("open", opens)
        .unwrap()
        .with_numeric("high", highs)
        .unwrap()
        .with_numeric("low", lows)
        .unwrap()
        .with_numeric("close", closes.to_vec())
        .unwrap()
        .with_boolean("first", first)
        .unwrap()
}

/// A table with a single stochastic `J` column.
pub fn j_table(values: &[f64]) -> Table {
    Table::new().with_numeric("J", values.to_vec()).unwrap()
}

/// Positions of the true entries.
pub fn hit_rows(hits: &[bool]) -> Vec<usize> {
    hits.iter()
        .enumerate()
        .filter_map(|(i, &h)| h.then_some(i))
        .collect()
}

pub const BAR_CSV: &str = "date,open,high,low,close,J\n\
    2024-01-03,10.0,10.8,9.6,10.5,-4.0\n\
    2024-01-01,10.0,10.4,9.2,9.5,20.0\n\
    2024-01-02,9.5,10.0,9.0,9.8,5.0\n\
    2024-01-04,10.5,11.2,10.4,11.0,12.0\n\
    2024-01-05,11.0,11.1,10.2,10.4,-1.0\n";
