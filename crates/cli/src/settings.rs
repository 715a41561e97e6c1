//! Settings for the `splitledger` binary.
//!
//! Read from an optional TOML file (`splitledger.toml` by default), then from
//! `SPLITLEDGER_*` environment variables (`SPLITLEDGER_APP__LEVEL=debug`).
//!
//! ```toml
//! database = "memory"
//!
//! [app]
//! level = "info"
//! ```
//!
//! or, for a file-backed ledger:
//!
//! ```toml
//! [database]
//! sqlite = "splitledger.db"
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "splitledger.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite("splitledger.db".to_string())
    }
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Self::Memory => String::from("sqlite::memory:"),
            Self::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                File::with_name(path.unwrap_or(DEFAULT_CONFIG_PATH)).required(path.is_some()),
            )
            .add_source(Environment::with_prefix("SPLITLEDGER").separator("__"))
            .build()?
            .try_deserialize()
    }
}
