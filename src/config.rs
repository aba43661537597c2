//! Dispatcher configuration.
//!
//! Every value has a default; [`DispatchConfig::resolve`] overrides them from
//! `DISPATCH_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Dispatcher and pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of runtime slots. Fixed for the life of the pool.
    pub pool_size: usize,
    /// Number of dispatch workers pulling jobs off the queue. Must exceed
    /// `pool_size` so a saturated pool leaves a worker waiting in `Retrying`.
    pub workers: usize,
    /// Jobs that may wait in the queue before submissions are refused.
    pub queue_capacity: usize,
    /// Longest wait between acquisition passes when no release wakes us.
    pub poll_interval: Duration,
    /// Simulated execution time of the reference runtime.
    pub execution_delay: Duration,
    /// Give up on a job that waits this long for a slot. `None` waits forever.
    pub max_wait: Option<Duration>,
    /// Extra attempts for a failed store write before the dispatch is aborted.
    pub store_retry_attempts: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            workers: 8,
            queue_capacity: 1024,
            poll_interval: Duration::from_secs(1),
            execution_delay: Duration::from_secs(1),
            max_wait: None,
            store_retry_attempts: 3,
        }
    }
}

impl DispatchConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_execution_delay(mut self, delay: Duration) -> Self {
        self.execution_delay = delay;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn with_store_retry_attempts(mut self, attempts: u32) -> Self {
        self.store_retry_attempts = attempts;
        self
    }

    /// Reject settings the dispatcher cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("DISPATCH_POOL_SIZE", self.pool_size),
            ("DISPATCH_WORKERS", self.workers),
            ("DISPATCH_QUEUE_CAPACITY", self.queue_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        if self.workers <= self.pool_size {
            return Err(ConfigError::InvalidValue {
                key: "DISPATCH_WORKERS".to_string(),
                message: format!("must exceed pool size {}", self.pool_size),
            });
        }
        Ok(())
    }

    /// Defaults overridden by the process environment.
    pub fn resolve() -> Result<Self, ConfigError> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            let ms = parse_optional(&lookup, key, default.as_millis() as u64)?;
            Ok(Duration::from_millis(ms))
        };

        let max_wait = match lookup("DISPATCH_MAX_WAIT_MS") {
            Some(raw) if !raw.trim().is_empty() => {
                Some(Duration::from_millis(parse_value("DISPATCH_MAX_WAIT_MS", &raw)?))
            }
            _ => defaults.max_wait,
        };

        let config = Self {
            pool_size: parse_optional(&lookup, "DISPATCH_POOL_SIZE", defaults.pool_size)?,
            workers: parse_optional(&lookup, "DISPATCH_WORKERS", defaults.workers)?,
            queue_capacity: parse_optional(
                &lookup,
                "DISPATCH_QUEUE_CAPACITY",
                defaults.queue_capacity,
            )?,
            poll_interval: millis("DISPATCH_POLL_INTERVAL_MS", defaults.poll_interval)?,
            execution_delay: millis("DISPATCH_EXECUTION_DELAY_MS", defaults.execution_delay)?,
            max_wait,
            store_retry_attempts: parse_optional(
                &lookup,
                "DISPATCH_STORE_RETRY_ATTEMPTS",
                defaults.store_retry_attempts,
            )?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_optional<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => parse_value(key, &raw),
        _ => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn dispatch_config_default() {
        let cfg = DispatchConfig::default();
        assert_eq!(cfg.pool_size, 4);
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert!(cfg.max_wait.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn resolve_without_overrides_is_default() {
        let cfg = DispatchConfig::resolve_with(env(&[])).unwrap();
        assert_eq!(cfg, DispatchConfig::default());
    }

    #[test]
    fn resolve_reads_overrides() {
        let cfg = DispatchConfig::resolve_with(env(&[
            ("DISPATCH_POOL_SIZE", "2"),
            ("DISPATCH_WORKERS", " 3 "),
            ("DISPATCH_POLL_INTERVAL_MS", "50"),
            ("DISPATCH_EXECUTION_DELAY_MS", "0"),
            ("DISPATCH_MAX_WAIT_MS", "30000"),
            ("DISPATCH_STORE_RETRY_ATTEMPTS", ""),
        ]))
        .unwrap();
        assert_eq!(cfg.pool_size, 2);
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.execution_delay, Duration::ZERO);
        assert_eq!(cfg.max_wait, Some(Duration::from_secs(30)));
        assert_eq!(cfg.store_retry_attempts, 3);
    }

    #[test]
    fn resolve_rejects_bad_values() {
        let err = DispatchConfig::resolve_with(env(&[("DISPATCH_WORKERS", "many")])).unwrap_err();
        assert!(err.to_string().contains("DISPATCH_WORKERS"));

        let err = DispatchConfig::resolve_with(env(&[("DISPATCH_POOL_SIZE", "0")])).unwrap_err();
        assert!(err.to_string().contains("must be at least 1"));
    }

    #[test]
    fn validate_requires_more_workers_than_slots() {
        for (pool_size, workers) in [(2, 2), (4, 1)] {
            let cfg = DispatchConfig::default()
                .with_pool_size(pool_size)
                .with_workers(workers);
            let err = cfg.validate().unwrap_err();
            assert!(matches!(
                &err,
                ConfigError::InvalidValue { key, .. } if key == "DISPATCH_WORKERS"
            ));
        }
        let cfg = DispatchConfig::default().with_pool_size(2).with_workers(3);
        assert!(cfg.validate().is_ok());

        let err = DispatchConfig::resolve_with(env(&[("DISPATCH_POOL_SIZE", "8")])).unwrap_err();
        assert!(err.to_string().contains("must exceed pool size 8"));
    }

    #[test]
    fn builder_methods() {
        let cfg = DispatchConfig::default()
            .with_pool_size(1)
            .with_workers(2)
            .with_queue_capacity(3)
            .with_max_wait(Duration::from_secs(5));
        assert_eq!(cfg.pool_size, 1);
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.queue_capacity, 3);
        assert_eq!(cfg.max_wait, Some(Duration::from_secs(5)));
    }
}
