use thiserror::Error;

/// A broken mapping or registry misuse. These abort the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("field '{field}' misconfigured: mapped from both '{first}' and '{second}'")]
    DuplicateTarget {
        field: String,
        first: String,
        second: String,
    },
    #[error("source column '{0}' appears more than once in mapping")]
    DuplicateSource(String),
    #[error("mapping names '{0}', which is not a canonical field")]
    UnknownField(String),
}

/// Structural misuse of a [`crate::table::Table`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),
    #[error("row {row} has {actual} cell(s), expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("column '{column}' given {actual} value(s) for {expected} row(s)")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{} duplicate timeseries key(s), first: {}", .keys.len(), .keys.first().map(String::as_str).unwrap_or(""))]
pub struct DuplicateKeysError {
    pub keys: Vec<String>,
}
