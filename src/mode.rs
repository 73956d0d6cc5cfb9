//! Backend selection by measured connectivity.
//!
//! At construction the store probes the durable backend once, bounded by
//! [`StoreConfig::probe_timeout`]. If the probe fails or times out the store
//! commits to the volatile backend for the rest of the process lifetime. The
//! probe is never retried.

use crate::backend::{InMemoryBackend, StoreBackend};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Which backend serves a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Document store reached over the network.
    Durable,
    /// Ordered in-process collections. Data is lost on exit.
    Volatile,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Durable => f.write_str("durable"),
            BackendMode::Volatile => f.write_str("volatile"),
        }
    }
}

/// Connect to the durable backend and verify it answers within the probe timeout.
///
/// # Errors
/// Returns `Error::Unavailable` if the backend cannot be reached in time.
#[cfg(feature = "redis")]
pub async fn probe_durable(config: &StoreConfig) -> Result<StoreBackend> {
    use crate::backend::{DocumentBackend, RedisBackend};

    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| Error::Unavailable("no durable store URL configured".to_string()))?;

    let backend = RedisBackend::from_connection_string(url, config.pool_size, &config.namespace)
        .await
        .map_err(|e| Error::Unavailable(format!("durable store not usable: {}", e)))?;

    match tokio::time::timeout(config.probe_timeout, backend.health_check()).await {
        Ok(Ok(true)) => Ok(StoreBackend::Durable(backend)),
        Ok(Ok(false)) => Err(Error::Unavailable(
            "durable store answered the probe unexpectedly".to_string(),
        )),
        Ok(Err(e)) => Err(Error::Unavailable(format!("durable store probe failed: {}", e))),
        Err(_) => Err(Error::Unavailable(format!(
            "durable store probe timed out after {:?}",
            config.probe_timeout
        ))),
    }
}

/// Without the `redis` feature there is no durable backend to reach.
#[cfg(not(feature = "redis"))]
pub async fn probe_durable(config: &StoreConfig) -> Result<StoreBackend> {
    match config.database_url {
        Some(_) => Err(Error::Unavailable(
            "durable store support not compiled in (enable the `redis` feature)".to_string(),
        )),
        None => Err(Error::Unavailable("no durable store URL configured".to_string())),
    }
}

/// Pick the backend for a new store. Never fails: an unreachable durable
/// store demotes to the volatile backend.
pub async fn select_backend(config: &StoreConfig) -> StoreBackend {
    if config.database_url.is_none() {
        info!("✓ No durable store configured, using volatile backend");
        return StoreBackend::Volatile(InMemoryBackend::new());
    }

    match probe_durable(config).await {
        Ok(backend) => {
            info!("✓ Durable store reachable, using durable backend");
            backend
        }
        Err(e) => {
            warn!("⚠ {}; falling back to volatile backend for this process", e);
            StoreBackend::Volatile(InMemoryBackend::new())
        }
    }
}
