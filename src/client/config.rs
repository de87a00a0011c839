//! Client configuration loaded from the environment

use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration wrapper for the sync client
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
}

impl Config {
    /// Read the configuration from environment variables
    ///
    /// Durations are given in milliseconds. Unset variables keep their
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = AppConfig::builder();

        if let Ok(url) = std::env::var("SERVER_URL") {
            builder = builder.server_url(url);
        }
        if let Ok(url) = std::env::var("PROBE_URL") {
            builder = builder.probe_url(url);
        }
        if let Some(period) = env_millis("PING_PERIOD")? {
            builder = builder.ping_period(period);
        }
        if let Some(timeout) = env_millis("SYNC_RETRY_TIMEOUT")? {
            builder = builder.sync_retry_timeout(timeout);
        }
        if let Some(delay) = env_millis("INITIAL_RETRY_DELAY")? {
            builder = builder.initial_retry_delay(delay);
        }
        if let Some(period) = env_millis("DEADLINE_WATCH_PERIOD")? {
            builder = builder.deadline_watch_period(period);
        }
        if let Ok(path) = std::env::var("LOCAL_DB_PATH") {
            builder = builder.database_path(path);
        }

        Self::with_builder(builder)
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self {
            app: builder.build()?,
        })
    }

    pub fn into_app(self) -> AppConfig {
        self.app
    }

    /// Database location, falling back to the platform data directory
    pub fn database_path(&self) -> PathBuf {
        self.app
            .database_path
            .clone()
            .unwrap_or_else(crate::client::local_db::LocalDatabase::default_path)
    }
}

fn env_millis(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Ok(value) = std::env::var(name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(|millis| Some(Duration::from_millis(millis)))
        .map_err(|_| ConfigError::InvalidValue { name, value })
}
