/// sqlbind Error Module
///
/// This module defines the error type shared by the decoding engine and the
/// execution layer around it.
use thiserror::Error;

/// Comprehensive error type for sqlbind.
///
/// Decoding failures are split the way callers need to react to them:
/// - the destination handed to an entry point has the wrong shape
/// - a row was required but the result was empty
/// - the row-scan primitive rejected a cell
/// - the cursor itself failed independently of any row
///
/// The remaining variants belong to the configuration and connection layer.
#[derive(Error, Debug)]
pub enum SqlbindError {
    /// Destination kind not accepted by the entry point it was passed to
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// Zero rows where exactly one was required
    #[error("no rows in result set")]
    NoRows,

    /// The number of scan targets does not match the number of result columns
    #[error("Scan error: expected {expected} destination arguments, got {got}")]
    ColumnCount { expected: usize, got: usize },

    /// A cell could not be converted into its scan target
    #[error("Scan error on column `{column}`: {source}")]
    Scan {
        column: String,
        #[source]
        source: rusqlite::types::FromSqlError,
    },

    /// Strict decoding found a column with no destination field
    #[error("Unbound column: `{0}` has no destination field")]
    UnboundColumn(String),

    /// Cursor-level fault (stepping, reading column metadata, scanning without a row)
    #[error("Cursor error: {0}")]
    Cursor(String),

    /// Database-related errors from SQLite operations
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown dialect or a dialect without a linked driver
    #[error("Dialect error: {0}")]
    Dialect(String),

    /// Connection pool errors
    #[error("Pool error: {0}")]
    Pool(String),

    /// Transaction-related errors
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing and encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse classification of [`SqlbindError`] used by callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidDestination,
    NoRows,
    ScanFailure,
    CursorFailure,
    Other,
}

impl SqlbindError {
    /// Returns the decoding error kind this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlbindError::InvalidDestination(_) => ErrorKind::InvalidDestination,
            SqlbindError::NoRows => ErrorKind::NoRows,
            SqlbindError::ColumnCount { .. }
            | SqlbindError::Scan { .. }
            | SqlbindError::UnboundColumn(_) => ErrorKind::ScanFailure,
            SqlbindError::Cursor(_) => ErrorKind::CursorFailure,
            _ => ErrorKind::Other,
        }
    }

    /// Returns `true` for the "no rows" condition of row-or-none decoding.
    pub fn is_no_rows(&self) -> bool {
        matches!(self, SqlbindError::NoRows)
    }
}

/// Type alias for Result to use SqlbindError as the error type.
pub type Result<T> = std::result::Result<T, SqlbindError>;
