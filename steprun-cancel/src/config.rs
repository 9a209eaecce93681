//! Configuration for the cancellation coordinator.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::CANCELLED_BY_USER;
use crate::watcher::WatchConfig;

/// Environment variable overriding [`CancellationConfig::poll_interval_ms`].
pub const ENV_POLL_INTERVAL_MS: &str = "STEPRUN_CANCEL_POLL_INTERVAL_MS";
/// Environment variable overriding [`CancellationConfig::max_attempts`].
pub const ENV_MAX_ATTEMPTS: &str = "STEPRUN_CANCEL_MAX_ATTEMPTS";
/// Environment variable overriding [`CancellationConfig::queue`].
pub const ENV_QUEUE: &str = "STEPRUN_CANCEL_QUEUE";

/// Error raised when configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a malformed value.
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue {
        /// The variable name.
        key: &'static str,
        /// The raw value.
        value: String,
    },

    /// A JSON document could not be parsed.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for dispatch and convergence watching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationConfig {
    /// Delay before each convergence read, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum number of convergence reads.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Queue cancellation commands are published to.
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Reason code attached to commands.
    #[serde(default = "default_reason")]
    pub reason: String,
    /// Whether commands ask the worker to cancel child work as well.
    #[serde(default = "default_propagate")]
    pub propagate_to_children: bool,
}

const fn default_poll_interval_ms() -> u64 {
    100
}

const fn default_max_attempts() -> usize {
    5
}

fn default_queue() -> String {
    "job_processing_queue".to_string()
}

fn default_reason() -> String {
    CANCELLED_BY_USER.to_string()
}

const fn default_propagate() -> bool {
    true
}

impl Default for CancellationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            queue: default_queue(),
            reason: default_reason(),
            propagate_to_children: default_propagate(),
        }
    }
}

impl CancellationConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Sets the maximum number of convergence reads.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the queue.
    #[must_use]
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Sets the reason code.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Sets child propagation.
    #[must_use]
    pub const fn with_propagate_to_children(mut self, propagate: bool) -> Self {
        self.propagate_to_children = propagate;
        self
    }

    /// The watcher settings derived from this config.
    #[must_use]
    pub const fn watch(&self) -> WatchConfig {
        WatchConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_attempts,
        }
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults overlaid with the `STEPRUN_CANCEL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| env_value(key, std::env::var(key)))
    }

    fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<Option<String>, ConfigError>,
    {
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS)? {
            self.poll_interval_ms = parse(ENV_POLL_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_ATTEMPTS)? {
            self.max_attempts = parse(ENV_MAX_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_QUEUE)? {
            let value = value.trim();
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_QUEUE,
                    value: value.to_string(),
                });
            }
            self.queue = value.to_string();
        }
        Ok(self)
    }
}

/// Unset is `None`; a set but non-UTF-8 value is an error, not unset.
fn env_value(
    key: &'static str,
    value: Result<String, std::env::VarError>,
) -> Result<Option<String>, ConfigError> {
    match value {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(raw)) => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string_lossy().into_owned(),
        }),
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
