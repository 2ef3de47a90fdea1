//! Domain error types.

/// A parse error with position information for condition parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Failure to build an expression. Nothing is interned when one of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("unknown comparison '{token}' (expected lt, le, gt, ge, eq, ne or a symbol)")]
    UnknownComparison { token: String },

    #[error("unknown direction '{token}' (expected cross_up, touch_up, cross_down or touch_down)")]
    UnknownDirection { token: String },

    #[error("negation requires at least one member")]
    EmptyNegation,

    #[error("count requires at least one member")]
    EmptyCount,

    #[error("level must be a finite number, got {value}")]
    NonNumericLevel { value: f64 },

    #[error("invalid interval [{left}, {right}]: {reason}")]
    InvalidInterval { left: f64, right: f64, reason: String },

    #[error("'{expr}' is an aggregate and cannot be used as a condition without a comparison")]
    AggregateNotPredicate { expr: String },

    #[error("'{expr}' cannot be shifted")]
    UnsupportedShift { expr: String },

    #[error("shifting '{expr}' by {rows} rows overflows its lag")]
    LagOverflow { expr: String, rows: i64 },
}

/// Failure while evaluating an expression against a table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("column '{name}' not found in table")]
    MissingColumn { name: String },

    #[error("column '{name}' is not numeric")]
    NonNumericColumn { name: String },
}

/// Failure while assembling a table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("column '{name}' has {found} rows, table has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("duplicate column '{name}'")]
    DuplicateColumn { name: String },
}

/// Top-level error type for barsignal.
#[derive(Debug, thiserror::Error)]
pub enum BarsignalError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BarsignalError> for std::process::ExitCode {
    fn from(err: &BarsignalError) -> Self {
        let code: u8 = match err {
            BarsignalError::Io(_) => 1,
            BarsignalError::ConfigParse { .. }
            | BarsignalError::ConfigMissing { .. }
            | BarsignalError::ConfigInvalid { .. } => 2,
            BarsignalError::Data { .. } | BarsignalError::Table(_) => 3,
            BarsignalError::Parse(_) | BarsignalError::Condition(_) => 4,
            BarsignalError::Eval(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
