use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default silence after which a source is considered offline.
pub const DEFAULT_LIVENESS_TIMEOUT_SECS: u64 = 60;

/// Default tolerance for samples stamped ahead of the monitor clock.
pub const DEFAULT_MAX_FUTURE_SKEW_SECS: u64 = 300;

/// Monitor configuration loaded from environment variables.
///
/// All fields have defaults suitable for a single enclosure sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Silence longer than this marks a source Offline.
    pub liveness_timeout: Duration,
    /// Period of the liveness watchdog tick.
    pub watchdog_poll_interval: Duration,
    /// Samples stamped further ahead of "now" than this are refused.
    pub max_future_skew: Duration,
    /// JSON rule table; the built-in table is used when absent.
    pub rule_table_path: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let liveness_timeout = Duration::from_secs(DEFAULT_LIVENESS_TIMEOUT_SECS);
        Self {
            liveness_timeout,
            watchdog_poll_interval: default_poll_interval(liveness_timeout),
            max_future_skew: Duration::from_secs(DEFAULT_MAX_FUTURE_SKEW_SECS),
            rule_table_path: None,
        }
    }
}

/// A quarter of the timeout, but at least one second.
fn default_poll_interval(timeout: Duration) -> Duration {
    Duration::from_secs((timeout.as_secs() / 4).max(1))
}

impl MonitorConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                        | Default            |
    /// |--------------------------------|--------------------|
    /// | `LIVENESS_TIMEOUT_SECS`        | `60`               |
    /// | `WATCHDOG_POLL_INTERVAL_SECS`  | timeout / 4        |
    /// | `MAX_FUTURE_SKEW_SECS`         | `300`              |
    /// | `RULE_TABLE_PATH`              | unset (built-in)   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs = parse_secs(&lookup, "LIVENESS_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_LIVENESS_TIMEOUT_SECS);
        let liveness_timeout = Duration::from_secs(timeout_secs);

        let watchdog_poll_interval = parse_secs(&lookup, "WATCHDOG_POLL_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or_else(|| default_poll_interval(liveness_timeout));

        let max_future_skew = Duration::from_secs(
            parse_secs(&lookup, "MAX_FUTURE_SKEW_SECS")?.unwrap_or(DEFAULT_MAX_FUTURE_SKEW_SECS),
        );

        let rule_table_path = lookup("RULE_TABLE_PATH")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let config = Self {
            liveness_timeout,
            watchdog_poll_interval,
            max_future_skew,
            rule_table_path,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liveness_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "liveness timeout must be greater than zero".to_string(),
            ));
        }
        if self.watchdog_poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "watchdog poll interval must be greater than zero".to_string(),
            ));
        }
        if self.watchdog_poll_interval > self.liveness_timeout {
            return Err(ConfigError::Invalid(format!(
                "watchdog poll interval ({}s) must not exceed the liveness timeout ({}s)",
                self.watchdog_poll_interval.as_secs(),
                self.liveness_timeout.as_secs()
            )));
        }
        Ok(())
    }

    pub(crate) fn liveness_timeout_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.liveness_timeout).unwrap_or(chrono::Duration::MAX)
    }

    pub(crate) fn max_future_skew_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.max_future_skew).unwrap_or(chrono::Duration::MAX)
    }
}

fn parse_secs<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}
