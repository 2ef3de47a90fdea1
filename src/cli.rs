//! CLI definition and dispatch.

use clap::{ArgAction, Parser, Subcommand};
use log::{LevelFilter, debug};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::condition::Expr;
use crate::domain::condition_parser;
use crate::domain::error::BarsignalError;
use crate::domain::registry::Registry;
use crate::domain::signal_set::SignalSet;
use crate::domain::table::Table;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "barsignal", about = "Evaluate trading conditions over bar tables")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a condition and print its canonical form
    Check {
        #[arg(short, long)]
        condition: String,
    },
    /// Evaluate a condition over a CSV table
    Eval {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        condition: String,
        /// Sort rows by this column and use it to label matches
        #[arg(long)]
        date_column: Option<String>,
        /// Print every row with its value instead of matches only
        #[arg(long)]
        all: bool,
    },
    /// Evaluate the signals of a signal file
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        signal: Option<String>,
    },
}

pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // A second initialisation (tests driving `run` repeatedly) is a no-op.
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);
    match cli.command {
        Command::Check { condition } => run_check(&condition),
        Command::Eval {
            data,
            condition,
            date_column,
            all,
        } => run_eval(&data, &condition, date_column.as_deref(), all),
        Command::Run { config, signal } => run_signals(&config, signal.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = BarsignalError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Load a single CSV file, optionally sorted by `date_column`.
pub fn load_table(path: &Path, date_column: Option<&str>) -> Result<Table, BarsignalError> {
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .ok_or_else(|| BarsignalError::Data {
            reason: format!("not a file path: {}", path.display()),
        })?;
    let mut adapter = CsvAdapter::new(dir);
    if let Some(name) = date_column {
        adapter = adapter.with_date_column(name);
    }
    adapter.fetch_table(&file)
}

/// CSV sources in the directory of `path`.
fn available_sources(path: &Path) -> Vec<String> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    CsvAdapter::new(dir).list_sources().unwrap_or_default()
}

fn report_load_error(path: &Path, err: &BarsignalError) -> ExitCode {
    eprintln!("error: {err}");
    let sources = available_sources(path);
    if !sources.is_empty() {
        eprintln!("available sources: {}", sources.join(", "));
    }
    err.into()
}

/// Labels of the matching rows, at most `max_rows` of them (0 shows all).
fn hit_lines(table: &Table, hits: &[bool], label_column: Option<&str>, max_rows: usize) -> Vec<String> {
    let rows: Vec<usize> = hits
        .iter()
        .enumerate()
        .filter_map(|(i, &h)| h.then_some(i))
        .collect();
    let shown = if max_rows == 0 {
        rows.len()
    } else {
        max_rows.min(rows.len())
    };
    let mut lines: Vec<String> = rows[..shown]
        .iter()
        .map(|&row| table.row_label(row, label_column))
        .collect();
    if shown < rows.len() {
        lines.push(format!("... {} more", rows.len() - shown));
    }
    lines
}

fn parse_condition(text: &str, registry: &Registry) -> Result<Expr, ExitCode> {
    condition_parser::parse(text, registry).map_err(|e| {
        eprintln!("error: failed to parse condition:\n{}", e.display_with_context(text));
        ExitCode::from(&BarsignalError::from(e))
    })
}

fn run_check(condition: &str) -> ExitCode {
    let registry = Registry::new();
    let expr = match parse_condition(condition, &registry) {
        Ok(e) => e,
        Err(code) => return code,
    };
    println!("{}", expr);
    let columns = expr.columns();
    if columns.is_empty() {
        println!("columns: (none)");
    } else {
        println!("columns: {}", columns.join(", "));
    }
    ExitCode::SUCCESS
}

fn run_eval(data: &Path, condition: &str, date_column: Option<&str>, all: bool) -> ExitCode {
    let registry = Registry::new();
    let expr = match parse_condition(condition, &registry) {
        Ok(e) => e,
        Err(code) => return code,
    };

    eprintln!("Loading data from {}", data.display());
    let table = match load_table(data, date_column) {
        Ok(t) => t,
        Err(e) => return report_load_error(data, &e),
    };

    let hits = match expr.evaluate(&table) {
        Ok(h) => h,
        Err(e) => {
            let err = BarsignalError::from(e);
            eprintln!("error: {err}");
            return (&err).into();
        }
    };

    for (row, hit) in hits.iter().enumerate() {
        if all {
            println!("{}\t{}", table.row_label(row, date_column), hit);
        } else if *hit {
            println!("{}", table.row_label(row, date_column));
        }
    }
    eprintln!(
        "{}: {}/{} rows",
        expr,
        hits.iter().filter(|&&h| h).count(),
        hits.len()
    );
    ExitCode::SUCCESS
}

fn run_signals(config_path: &Path, only: Option<&str>) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading signals from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Build signals
    let registry = Registry::new();
    let signals = match SignalSet::from_config(&adapter, &registry) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let selected: Vec<(&str, &Expr)> = match only {
        Some(name) => match signals.get(&name.to_lowercase()) {
            Some(expr) => vec![(name, expr)],
            None => {
                let err = BarsignalError::ConfigMissing {
                    section: "signals".into(),
                    key: name.to_string(),
                };
                eprintln!("error: {err}");
                return (&err).into();
            }
        },
        None => signals
            .names()
            .into_iter()
            .filter_map(|n| signals.get(n).map(|e| (n, e)))
            .collect(),
    };

    // Stage 3: Load data
    let Some(data_path) = adapter.get_string("data", "path") else {
        let err = BarsignalError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        };
        eprintln!("error: {err}");
        return (&err).into();
    };
    let data_path = config_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(data_path);
    let date_column = adapter.get_string("data", "date_column");
    let strict = adapter.get_bool("data", "strict", true);
    let max_rows = usize::try_from(adapter.get_int("output", "max_rows", 0)).unwrap_or(0);
    eprintln!("Loading data from {}", data_path.display());
    let table = match load_table(&data_path, date_column.as_deref()) {
        Ok(t) => t,
        Err(e) => return report_load_error(&data_path, &e),
    };
    debug!("table columns: {:?}", table.column_names());

    // Stage 4: Evaluate
    for (name, expr) in selected {
        let hits = match expr.evaluate(&table) {
            Ok(h) => h,
            // Non-strict files skip signals the table cannot answer.
            Err(e) if !strict => {
                eprintln!("warning: skipping signal '{name}': {e}");
                continue;
            }
            Err(e) => {
                let err = BarsignalError::from(e);
                eprintln!("error: signal '{name}': {err}");
                return (&err).into();
            }
        };
        let count = hits.iter().filter(|&&h| h).count();
        println!("{}\t{}/{}", name, count, hits.len());
        for line in hit_lines(&table, &hits, date_column.as_deref(), max_rows) {
            println!("  {}", line);
        }
    }
    ExitCode::SUCCESS
}
