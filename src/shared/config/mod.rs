//! Application configuration module
//!
//! Holds the values the sync engine consumes: where the server lives, how
//! often to probe it while offline, and how long to keep retrying a single
//! queued mutation before giving up on it.
//!
//! Configuration can be assembled with [`AppConfigBuilder`] or parsed from
//! TOML. Durations in TOML are expressed in milliseconds:
//!
//! ```toml
//! server_url = "https://api.example.com"
//! ping_period_ms = 5000
//! sync_retry_timeout_ms = 300000
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(5);
const DEFAULT_SYNC_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_INITIAL_RETRY_DELAY: Duration = Duration::from_millis(2048);
const DEFAULT_DEADLINE_WATCH_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Server base URL; mutations go to `{server_url}/graphql`
    pub server_url: String,
    /// URL used by the reachability probe
    pub probe_url: String,
    /// Interval between reachability probes while offline
    pub ping_period: Duration,
    /// Maximum time to keep retrying one queued mutation
    pub sync_retry_timeout: Duration,
    /// First backoff delay; doubled on every failed attempt
    pub initial_retry_delay: Duration,
    /// Interval between deadline sweeps
    pub deadline_watch_period: Duration,
    /// Location of the local cache database
    pub database_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            probe_url: DEFAULT_SERVER_URL.to_string(),
            ping_period: DEFAULT_PING_PERIOD,
            sync_retry_timeout: DEFAULT_SYNC_RETRY_TIMEOUT,
            initial_retry_delay: DEFAULT_INITIAL_RETRY_DELAY,
            deadline_watch_period: DEFAULT_DEADLINE_WATCH_PERIOD,
            database_path: None,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut builder = AppConfig::builder();
        if let Some(url) = file.server_url {
            builder = builder.server_url(url);
        }
        if let Some(url) = file.probe_url {
            builder = builder.probe_url(url);
        }
        if let Some(ms) = file.ping_period_ms {
            builder = builder.ping_period(Duration::from_millis(ms));
        }
        if let Some(ms) = file.sync_retry_timeout_ms {
            builder = builder.sync_retry_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = file.initial_retry_delay_ms {
            builder = builder.initial_retry_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = file.deadline_watch_period_ms {
            builder = builder.deadline_watch_period(Duration::from_millis(ms));
        }
        if let Some(path) = file.database_path {
            builder = builder.database_path(path);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [&self.server_url, &self.probe_url] {
            let parsed =
                reqwest::Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }

        let durations = [
            ("ping_period", self.ping_period),
            ("sync_retry_timeout", self.sync_retry_timeout),
            ("initial_retry_delay", self.initial_retry_delay),
            ("deadline_watch_period", self.deadline_watch_period),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        Ok(())
    }

    /// Full URL of the GraphQL endpoint
    pub fn graphql_url(&self) -> String {
        format!("{}/graphql", self.server_url.trim_end_matches('/'))
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    probe_url: Option<String>,
    ping_period: Option<Duration>,
    sync_retry_timeout: Option<Duration>,
    initial_retry_delay: Option<Duration>,
    deadline_watch_period: Option<Duration>,
    database_path: Option<PathBuf>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the reachability probe URL (defaults to the server URL)
    pub fn probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = Some(url.into());
        self
    }

    /// Set the offline probe interval
    pub fn ping_period(mut self, period: Duration) -> Self {
        self.ping_period = Some(period);
        self
    }

    /// Set the total retry budget for one queued operation
    pub fn sync_retry_timeout(mut self, timeout: Duration) -> Self {
        self.sync_retry_timeout = Some(timeout);
        self
    }

    /// Set the first backoff delay
    pub fn initial_retry_delay(mut self, delay: Duration) -> Self {
        self.initial_retry_delay = Some(delay);
        self
    }

    /// Set the deadline sweep interval
    pub fn deadline_watch_period(mut self, period: Duration) -> Self {
        self.deadline_watch_period = Some(period);
        self
    }

    /// Set the local database path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let server_url = self.server_url.unwrap_or(defaults.server_url);
        let probe_url = self.probe_url.unwrap_or_else(|| server_url.clone());

        let config = AppConfig {
            server_url,
            probe_url,
            ping_period: self.ping_period.unwrap_or(defaults.ping_period),
            sync_retry_timeout: self
                .sync_retry_timeout
                .unwrap_or(defaults.sync_retry_timeout),
            initial_retry_delay: self
                .initial_retry_delay
                .unwrap_or(defaults.initial_retry_delay),
            deadline_watch_period: self
                .deadline_watch_period
                .unwrap_or(defaults.deadline_watch_period),
            database_path: self.database_path,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    server_url: Option<String>,
    probe_url: Option<String>,
    ping_period_ms: Option<u64>,
    sync_retry_timeout_ms: Option<u64>,
    initial_retry_delay_ms: Option<u64>,
    deadline_watch_period_ms: Option<u64>,
    database_path: Option<PathBuf>,
}

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("duration must be greater than zero: {0}")]
    ZeroDuration(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}
