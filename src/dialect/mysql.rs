//! MySQL connection strings.

use super::{query_escape, REDACTED_PASSWORD};
use crate::config::{ClientOptions, OptionValue};

const DEFAULT_CHARSET: &str = "utf8mb4";

/// Builds `user:password@tcp(host:port)/database?charset=...&key=value...`.
///
/// Text option values are query-escaped; keys, numbers and booleans are
/// written as-is.
pub fn dsn(options: &ClientOptions) -> String {
    build(options, &options.password)
}

/// Same as [`dsn`] with the password masked.
pub fn redacted_dsn(options: &ClientOptions) -> String {
    build(options, REDACTED_PASSWORD)
}

fn build(options: &ClientOptions, password: &str) -> String {
    let charset = options
        .charset
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CHARSET);

    let mut dsn = format!(
        "{}:{}@tcp({}:{})/{}?charset={}",
        options.user, password, options.host, options.port, options.database, charset
    );

    for (key, value) in options.dialect_options.iter().flatten() {
        let value = match value {
            OptionValue::Text(text) => query_escape(text),
            other => other.to_string(),
        };
        dsn.push_str(&format!("&{}={}", key, value));
    }
    dsn
}
