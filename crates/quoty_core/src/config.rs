//! Runtime configuration for embedding the quote cache.
//!
//! Values come from the environment (`QUOTY_*`) or are built in code; the
//! embedding app decides which.

use crate::logging::LogLevel;
use crate::repo::quote_repo::DEFAULT_FETCH_TIMEOUT;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "QUOTY_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "QUOTY_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "QUOTY_LOG_DIR";
pub const ENV_FETCH_TIMEOUT_MS: &str = "QUOTY_FETCH_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// SQLite file holding saved quotes.
    pub db_path: PathBuf,
    pub log_level: LogLevel,
    /// File logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub fetch_timeout: Duration,
}

impl CoreConfig {
    /// Config with default level and timeout, no file logging.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            log_level: LogLevel::default(),
            log_dir: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Reads configuration from the process environment.
    ///
    /// # Errors
    /// Returns a message naming the variable that is missing or invalid.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let db_path = lookup(ENV_DB_PATH)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| format!("{ENV_DB_PATH}: not set"))?;
        let mut config = Self::new(db_path.trim());

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log_level =
                LogLevel::parse(&level).map_err(|e| format!("{ENV_LOG_LEVEL}: {e}"))?;
        }
        config.log_dir = lookup(ENV_LOG_DIR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        if let Some(raw) = lookup(ENV_FETCH_TIMEOUT_MS) {
            let millis: u64 = raw
                .trim()
                .parse()
                .map_err(|e| format!("{ENV_FETCH_TIMEOUT_MS}: {e}"))?;
            if millis == 0 {
                return Err(format!("{ENV_FETCH_TIMEOUT_MS}: must be greater than zero"));
            }
            config.fetch_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }
}
