//! Configuration management for the CLI.

use std::env;
use std::path::PathBuf;

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding one JSON file per carrier
    pub data_dir: PathBuf,
    /// Entry limit applied when opening a carrier (0 = unlimited)
    pub limit: usize,
    /// Use second instead of millisecond timestamp keys
    pub based_on_second: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./carrier_data"),
            limit: 0,
            based_on_second: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let data_dir = lookup("CARRIER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let limit = match lookup("CARRIER_LIMIT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidLimit(raw))?,
            None => defaults.limit,
        };

        let based_on_second = match lookup("CARRIER_BASED_ON_SECOND") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidBool {
                var: "CARRIER_BASED_ON_SECOND",
                value: raw,
            })?,
            None => defaults.based_on_second,
        };

        Ok(Self {
            data_dir,
            limit,
            based_on_second,
        })
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_overrides(
        mut self,
        data_dir: Option<PathBuf>,
        limit: Option<usize>,
        based_on_second: bool,
    ) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        if let Some(limit) = limit {
            self.limit = limit;
        }
        if based_on_second {
            self.based_on_second = true;
        }
        self
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid CARRIER_LIMIT value: {0:?}")]
    InvalidLimit(String),

    #[error("Invalid {var} value: {value:?}")]
    InvalidBool { var: &'static str, value: String },
}
