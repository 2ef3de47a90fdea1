//! CSV file data adapter.
//!
//! Each `<source>.csv` under the base directory is one table. Column types
//! are inferred per column: numeric if every non-empty cell parses as a
//! number (empty cells become `NaN`), boolean if every non-empty cell is
//! `true`/`false`, text otherwise.

use crate::domain::error::BarsignalError;
use crate::domain::table::{Column, Table};
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
    date_column: Option<String>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            date_column: None,
        }
    }

    /// Sort rows by this column after loading.
    pub fn with_date_column(mut self, name: &str) -> Self {
        self.date_column = Some(name.to_string());
        self
    }

    fn csv_path(&self, source: &str) -> PathBuf {
        if Path::new(source).extension().is_some_and(|ext| ext == "csv") {
            self.base_path.join(source)
        } else {
            self.base_path.join(format!("{}.csv", source))
        }
    }

    fn read_table(&self, path: &Path) -> Result<Table, BarsignalError> {
        let content = fs::read_to_string(path).map_err(|e| BarsignalError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| BarsignalError::Data {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for result in rdr.records() {
            let record = result.map_err(|e| BarsignalError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            for (column, value) in cells.iter_mut().zip(record.iter()) {
                column.push(value.trim().to_string());
            }
        }

        let mut table = Table::new();
        for (name, values) in headers.iter().zip(cells) {
            table = table.with_column(name, infer_column(values))?;
        }

        if let Some(date_column) = &self.date_column {
            table = sort_by_date(table, date_column)?;
        }

        debug!(
            "loaded {} rows x {} columns from {}",
            table.len(),
            headers.len(),
            path.display()
        );
        Ok(table)
    }
}

fn infer_column(values: Vec<String>) -> Column {
    let filled = || values.iter().filter(|v| !v.is_empty());

    if filled().all(|v| v.parse::<f64>().is_ok()) {
        return Column::Numeric(
            values
                .iter()
                .map(|v| v.parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        );
    }
    if filled().all(|v| parse_bool(v).is_some()) {
        return Column::Boolean(
            values
                .iter()
                .map(|v| parse_bool(v).unwrap_or(false))
                .collect(),
        );
    }
    Column::Text(values)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn sort_by_date(table: Table, date_column: &str) -> Result<Table, BarsignalError> {
    if !table.has_column(date_column) {
        return Err(BarsignalError::Data {
            reason: format!("missing date column '{}'", date_column),
        });
    }
    let labels: Vec<String> = (0..table.len())
        .map(|row| table.row_label(row, Some(date_column)))
        .collect();

    let mut keyed = Vec::with_capacity(labels.len());
    for (row, label) in labels.iter().enumerate() {
        let stamp = parse_timestamp(label).ok_or_else(|| BarsignalError::Data {
            reason: format!("invalid date '{}' in column '{}'", label, date_column),
        })?;
        keyed.push((stamp, row));
    }
    keyed.sort_by_key(|&(stamp, _)| stamp);

    let order: Vec<usize> = keyed.into_iter().map(|(_, row)| row).collect();
    Ok(table.take(&order))
}

impl DataPort for CsvAdapter {
    fn fetch_table(&self, source: &str) -> Result<Table, BarsignalError> {
        self.read_table(&self.csv_path(source))
    }

    fn list_sources(&self) -> Result<Vec<String>, BarsignalError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BarsignalError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut sources = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BarsignalError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    sources.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        sources.sort();
        Ok(sources)
    }
}
