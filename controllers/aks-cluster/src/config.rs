//! Controller configuration, read from environment variables at start-up.

use crate::error::ControllerError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings for the AKS Cluster Controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Requeue delay while Azure reports a create or update in progress
    pub poll_interval: Duration,
    /// Requeue delay after a converged pass, to notice out-of-band drift
    pub resync_interval: Duration,
    /// Maximum concurrent reconciliations
    pub concurrency: u16,
    pub backoff_min_minutes: u64,
    pub backoff_max_minutes: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            poll_interval: Duration::from_secs(30),
            resync_interval: Duration::from_secs(300),
            concurrency: 3,
            backoff_min_minutes: 1,
            backoff_max_minutes: 10,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty()),
            poll_interval: parse(&lookup, "POLL_INTERVAL_SECS")?
                .map_or(defaults.poll_interval, Duration::from_secs),
            resync_interval: parse(&lookup, "RESYNC_INTERVAL_SECS")?
                .map_or(defaults.resync_interval, Duration::from_secs),
            concurrency: parse(&lookup, "RECONCILE_CONCURRENCY")?.unwrap_or(defaults.concurrency),
            backoff_min_minutes: parse(&lookup, "ERROR_BACKOFF_MIN_MINUTES")?
                .unwrap_or(defaults.backoff_min_minutes),
            backoff_max_minutes: parse(&lookup, "ERROR_BACKOFF_MAX_MINUTES")?
                .unwrap_or(defaults.backoff_max_minutes),
        };

        if config.poll_interval.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        if config.backoff_min_minutes == 0 || config.backoff_min_minutes > config.backoff_max_minutes {
            return Err(ControllerError::InvalidConfig(format!(
                "error backoff bounds {}..{} minutes are invalid",
                config.backoff_min_minutes, config.backoff_max_minutes
            )));
        }
        Ok(config)
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ControllerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            ControllerError::InvalidConfig(format!("{key}={raw} is not valid: {e}"))
        }),
    }
}
