//! Store configuration.
//!
//! Read from the environment at startup:
//!
//! | Variable                 | Default | Meaning                                  |
//! |--------------------------|---------|------------------------------------------|
//! | `DATABASE_URL`           | unset   | Durable store URL (`redis://...`)        |
//! | `REDIS_URL`              | unset   | Fallback when `DATABASE_URL` is unset    |
//! | `STORE_PROBE_TIMEOUT_MS` | 5000    | Bound on the startup connectivity probe  |
//! | `REDIS_POOL_SIZE`        | 16      | Durable connection pool size             |
//! | `STORE_NAMESPACE`        | `crm`   | Key prefix inside the durable store      |
//!
//! Without a URL the store runs on the volatile backend.

use crate::error::{Error, Result};
use crate::key::DEFAULT_NAMESPACE;
use std::time::Duration;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_POOL_SIZE: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: Option<String>,
    pub probe_timeout: Duration,
    pub pool_size: u32,
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_url: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            pool_size: DEFAULT_POOL_SIZE,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from process environment variables.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = StoreConfig {
            database_url: non_empty("DATABASE_URL").or_else(|| non_empty("REDIS_URL")),
            ..Default::default()
        };

        if let Some(raw) = non_empty("STORE_PROBE_TIMEOUT_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                Error::ConfigError(format!("STORE_PROBE_TIMEOUT_MS is not a number: {}", raw))
            })?;
            config.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = non_empty("REDIS_POOL_SIZE") {
            let size: u32 = raw.trim().parse().map_err(|_| {
                Error::ConfigError(format!("REDIS_POOL_SIZE is not a number: {}", raw))
            })?;
            if size == 0 {
                return Err(Error::ConfigError("REDIS_POOL_SIZE must be > 0".to_string()));
            }
            config.pool_size = size;
        }
        if let Some(ns) = non_empty("STORE_NAMESPACE") {
            config.namespace = ns.trim().to_string();
        }

        Ok(config)
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert!(config.database_url.is_none());
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_database_url_preferred_over_redis_url() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "redis://db:6379/1"),
            ("REDIS_URL", "redis://cache:6379/0"),
        ]))
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("redis://db:6379/1"));

        let config =
            StoreConfig::from_lookup(lookup(&[("DATABASE_URL", " "), ("REDIS_URL", "redis://cache")]))
                .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("redis://cache"));
    }

    #[test]
    fn test_numeric_overrides() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("STORE_PROBE_TIMEOUT_MS", "250"),
            ("REDIS_POOL_SIZE", "4"),
            ("STORE_NAMESPACE", "tenant_a"),
        ]))
        .unwrap();
        assert_eq!(config.probe_timeout, Duration::from_millis(250));
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.namespace, "tenant_a");
    }

    #[test]
    fn test_bad_numbers_rejected() {
        let err = StoreConfig::from_lookup(lookup(&[("REDIS_POOL_SIZE", "many")])).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        let err = StoreConfig::from_lookup(lookup(&[("REDIS_POOL_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        let err =
            StoreConfig::from_lookup(lookup(&[("STORE_PROBE_TIMEOUT_MS", "-1")])).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
