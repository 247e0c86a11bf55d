use crate::core::{Result, SqlbindError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Pool defaults applied when a client leaves a setting unset or non-positive.
pub const DEFAULT_MAX_IDLE_CONNS: usize = 10;
pub const DEFAULT_MAX_OPEN_CONNS: usize = 50;
/// Maximum connection lifetime, in milliseconds.
pub const DEFAULT_MAX_LEFT_TIME: u64 = 7200;

/// Top-level configuration: named clients plus optional shared defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialectConfig {
    #[serde(default)]
    pub clients: HashMap<String, ClientOptions>,
    #[serde(default)]
    pub default: Option<ClientOptions>,
}

/// Connection settings for one named client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub dialect: String,
    pub logging: Option<bool>,
    pub pool: Option<PoolOptions>,
    pub charset: Option<String>,
    pub dialect_options: Option<BTreeMap<String, OptionValue>>,
}

/// Connection pool limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolOptions {
    pub max_idle_conns: i64,
    /// Maximum connection lifetime in milliseconds.
    pub max_left_time: i64,
    pub max_open_conns: i64,
}

/// A dialect option value as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Boolean(b) => write!(f, "{}", b),
            OptionValue::Integer(i) => write!(f, "{}", i),
            // Numeric options are always whole numbers on the wire.
            OptionValue::Real(r) => write!(f, "{}", r.trunc() as i64),
            OptionValue::Text(s) => write!(f, "{}", s),
        }
    }
}

fn positive_or(value: i64, fallback: u64) -> u64 {
    if value > 0 {
        value as u64
    } else {
        fallback
    }
}

impl PoolOptions {
    pub fn max_idle(&self) -> usize {
        positive_or(self.max_idle_conns, DEFAULT_MAX_IDLE_CONNS as u64) as usize
    }

    pub fn max_open(&self) -> usize {
        positive_or(self.max_open_conns, DEFAULT_MAX_OPEN_CONNS as u64) as usize
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_millis(positive_or(self.max_left_time, DEFAULT_MAX_LEFT_TIME))
    }
}

impl ClientOptions {
    /// Effective pool limits, defaults included.
    pub fn pool_limits(&self) -> PoolOptions {
        self.pool.unwrap_or_default()
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging.unwrap_or(false)
    }

    /// Fills the settings left unset from `defaults`.
    ///
    /// Only the dialect, pool, logging flag, dialect options, port and user
    /// are inherited; host, password, database and charset never are.
    pub fn merge_defaults(&mut self, defaults: &ClientOptions) {
        if self.dialect.is_empty() {
            self.dialect = defaults.dialect.clone();
        }
        if self.pool.is_none() {
            self.pool = defaults.pool;
        }
        if self.logging.is_none() {
            self.logging = defaults.logging;
        }
        if self.dialect_options.is_none() {
            self.dialect_options = defaults.dialect_options.clone();
        }
        if self.port == 0 {
            self.port = defaults.port;
        }
        if self.user.is_empty() {
            self.user = defaults.user.clone();
        }
    }
}

impl DialectConfig {
    /// Returns the effective options for client `name`, or `None` if it is not configured.
    pub fn resolve(&self, name: &str) -> Option<ClientOptions> {
        let mut options = self.clients.get(name)?.clone();
        if let Some(defaults) = &self.default {
            options.merge_defaults(defaults);
        }
        Some(options)
    }

    /// Configured client names in sorted order.
    pub fn client_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Default configuration file location: `<config dir>/sqlbind/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sqlbind").join("config.toml"))
}

/// Parses a configuration from TOML text.
pub fn from_toml_str(content: &str) -> Result<DialectConfig> {
    Ok(toml::from_str(content)?)
}

/// Parses a configuration from JSON text.
pub fn from_json_str(content: &str) -> Result<DialectConfig> {
    Ok(serde_json::from_str(content)?)
}

/// Loads configuration from a file.
///
/// # Arguments
///
/// * `path` - A `.toml` file is read as TOML, anything else as JSON.
///
/// # Returns
///
/// The parsed configuration, or `SqlbindError::Config` naming the file when
/// it cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DialectConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| SqlbindError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let parsed = if is_toml {
        from_toml_str(&content)
    } else {
        from_json_str(&content)
    };

    let config =
        parsed.map_err(|e| SqlbindError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    debug!(path = %path.display(), clients = config.clients.len(), "loaded configuration");
    Ok(config)
}
