/// Dialect Module
///
/// Maps a client's configured dialect name to the connection string its
/// driver expects, and keeps the registry of opened clients.
///
/// ## Supported dialects
///
/// - `mysql`
/// - `mssql` / `sqlserver`
/// - `sqlite` / `sqlite3` (the only dialect with a linked driver)
pub mod mssql;
pub mod mysql;
pub mod registry;
pub mod sqlite;

pub use registry::Databases;

use crate::config::ClientOptions;
use crate::core::{Result, SqlbindError};
use std::fmt;
use std::str::FromStr;
use tracing::error;

/// A supported SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    SqlServer,
    Sqlite,
}

impl FromStr for Dialect {
    type Err = SqlbindError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "mysql" => Ok(Dialect::MySql),
            "mssql" | "sqlserver" => Ok(Dialect::SqlServer),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(SqlbindError::Dialect(format!("invalid dialect `{}`", other))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::MySql => "mysql",
            Dialect::SqlServer => "sqlserver",
            Dialect::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

impl Dialect {
    /// Parses the dialect of a resolved client configuration.
    pub fn of(options: &ClientOptions) -> Result<Self> {
        options.dialect.parse().map_err(|e| {
            error!(database = %options.database, dialect = %options.dialect, "invalid dialect");
            e
        })
    }

    /// Builds the driver connection string for `options`.
    ///
    /// # Returns
    ///
    /// The DSN, or `SqlbindError::Config` when no database name is configured.
    pub fn dsn(&self, options: &ClientOptions) -> Result<String> {
        if options.database.is_empty() {
            return Err(SqlbindError::Config("invalid database config".to_string()));
        }

        Ok(match self {
            Dialect::MySql => mysql::dsn(options),
            Dialect::SqlServer => mssql::dsn(options),
            Dialect::Sqlite => sqlite::dsn(options),
        })
    }

    /// The DSN with the password replaced by [`REDACTED_PASSWORD`], for
    /// error messages and logs.
    pub fn redacted_dsn(&self, options: &ClientOptions) -> Result<String> {
        if options.database.is_empty() {
            return Err(SqlbindError::Config("invalid database config".to_string()));
        }

        Ok(match self {
            Dialect::MySql => mysql::redacted_dsn(options),
            Dialect::SqlServer => mssql::redacted_dsn(options),
            Dialect::Sqlite => sqlite::dsn(options),
        })
    }

    /// Whether this build can open connections for the dialect.
    pub fn has_driver(&self) -> bool {
        matches!(self, Dialect::Sqlite)
    }
}

/// Stands in for the password in [`Dialect::redacted_dsn`].
pub const REDACTED_PASSWORD: &str = "***";

/// Escapes `input` for use inside a URL query component.
///
/// Unreserved characters pass through, spaces become `+`, everything else is
/// percent-encoded byte by byte.
pub fn query_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                escaped.push(byte as char)
            }
            b' ' => escaped.push('+'),
            other => escaped.push_str(&format!("%{:02X}", other)),
        }
    }
    escaped
}
