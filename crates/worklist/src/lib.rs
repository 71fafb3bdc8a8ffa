//! Identifier worklists drawn from spreadsheet and CSV tables.

mod builder;
mod table;

pub use builder::{normalize_cell, MalformedPolicy, WorklistBuilder, DEFAULT_EXEMPT_MARKER};
pub use table::{read_table, read_table_file, Cell, Table, TableFormat};

#[derive(Debug, thiserror::Error)]
pub enum WorklistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read table: {0}")]
    Read(String),
    #[error("unsupported table format for {0:?}, expected .xlsx, .xls, .ods or .csv")]
    UnsupportedFormat(String),
    #[error("no header row after skipping {skip_rows} rows")]
    MissingHeader { skip_rows: usize },
    #[error("column {column:?} not found (available: {})", available.join(", "))]
    Schema { column: String, available: Vec<String> },
    #[error("row {row}, column {column:?}: {value:?} is not a valid identifier")]
    MalformedIdentifier { row: usize, column: String, value: String },
}

pub type WorklistResult<T> = Result<T, WorklistError>;
