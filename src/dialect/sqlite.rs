//! SQLite targets.
//!
//! The "connection string" of a SQLite client is the database path itself;
//! dialect options become pragmas run on every new connection.

use crate::config::{ClientOptions, OptionValue};

pub const MEMORY_PATH: &str = ":memory:";

pub fn dsn(options: &ClientOptions) -> String {
    options.database.clone()
}

pub fn is_memory(path: &str) -> bool {
    path == MEMORY_PATH
}

/// `PRAGMA key = value` statements for the client's dialect options, in key order.
pub fn pragmas(options: &ClientOptions) -> Vec<String> {
    options
        .dialect_options
        .iter()
        .flatten()
        .map(|(key, value)| match value {
            OptionValue::Text(text) => format!("PRAGMA {} = '{}'", key, text.replace('\'', "''")),
            other => format!("PRAGMA {} = {}", key, other),
        })
        .collect()
}
