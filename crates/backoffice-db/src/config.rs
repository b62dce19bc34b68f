//! Back-office configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use backoffice_core::ESTIMATION_HISTORY_WINDOW;

use crate::pool::DbConfig;

/// Back-office configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// Seconds to wait for a pooled connection
    pub db_connect_timeout_secs: u64,

    /// Apply embedded migrations on startup
    pub run_migrations: bool,

    /// Number of recent FINAL tickets used for base-fare estimation
    pub history_window: i64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (environment, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = AppConfig {
            db_path: lookup("BACKOFFICE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./backoffice.db")),

            db_max_connections: parse_or(&lookup, "BACKOFFICE_DB_MAX_CONNECTIONS", 5)?,

            db_connect_timeout_secs: parse_or(&lookup, "BACKOFFICE_DB_CONNECT_TIMEOUT_SECS", 30)?,

            run_migrations: parse_or(&lookup, "BACKOFFICE_RUN_MIGRATIONS", true)?,

            history_window: parse_or(&lookup, "BACKOFFICE_HISTORY_WINDOW", ESTIMATION_HISTORY_WINDOW)?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("BACKOFFICE_DB_MAX_CONNECTIONS".to_string()));
        }

        if config.history_window <= 0 {
            return Err(ConfigError::InvalidValue("BACKOFFICE_HISTORY_WINDOW".to_string()));
        }

        Ok(config)
    }

    /// Builds the pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.db_path)
            .max_connections(self.db_max_connections)
            .connect_timeout(Duration::from_secs(self.db_connect_timeout_secs))
            .run_migrations(self.run_migrations)
            .history_window(self.history_window)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("./backoffice.db"));
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.db_connect_timeout_secs, 30);
        assert!(config.run_migrations);
        assert_eq!(config.history_window, 80);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("BACKOFFICE_DB_PATH", "/var/lib/agency/office.db"),
            ("BACKOFFICE_DB_MAX_CONNECTIONS", "8"),
            ("BACKOFFICE_RUN_MIGRATIONS", "false"),
            ("BACKOFFICE_HISTORY_WINDOW", "40"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/var/lib/agency/office.db"));
        assert_eq!(config.db_max_connections, 8);
        assert!(!config.run_migrations);

        let db = config.db_config();
        assert_eq!(db.max_connections, 8);
        assert_eq!(db.history_window, 40);
        assert!(!db.run_migrations);
    }

    #[test]
    fn test_invalid_values() {
        let err = AppConfig::from_lookup(lookup(&[("BACKOFFICE_DB_MAX_CONNECTIONS", "many")]));
        assert!(matches!(err, Err(ConfigError::InvalidValue(key)) if key == "BACKOFFICE_DB_MAX_CONNECTIONS"));

        assert!(AppConfig::from_lookup(lookup(&[("BACKOFFICE_HISTORY_WINDOW", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("BACKOFFICE_RUN_MIGRATIONS", "yes")])).is_err());
    }
}
