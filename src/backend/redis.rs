//! Redis document backend implementation.
//!
//! Each document is a hash (`body`, `created`, `unique`) keyed by id. A sorted
//! set per collection orders ids by creation time, and unique index entries are
//! plain string keys claimed with `SET NX`. A new document's hash and
//! order-index entry go through a single `MULTI`/`EXEC` pipeline. Writes to an
//! existing document are a compare-and-set on its `rev` field, run as one Lua
//! script, so a write based on a stale read is discarded instead of applied.
//! Failed operations are reported, never retried.

use super::{DocumentBackend, DocumentRecord};
use crate::error::{Error, Result};
use crate::key::{KeyBuilder, DEFAULT_NAMESPACE};
use crate::model::UniqueKey;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use std::time::Duration;

const FIELD_BODY: &str = "body";
const FIELD_CREATED: &str = "created";
const FIELD_UNIQUE: &str = "unique";
const FIELD_REV: &str = "rev";

/// Compare-and-set of a document hash.
///
/// KEYS[1] is the hash; ARGV is the expected revision, body and unique list.
/// Returns -1 if the hash is gone, 0 if the revision moved, 1 once written.
const CAS_WRITE: &str = r#"
local rev = redis.call('HGET', KEYS[1], 'rev')
if not rev and redis.call('EXISTS', KEYS[1]) == 0 then
  return -1
end
rev = tonumber(rev or '0')
if rev ~= tonumber(ARGV[1]) then
  return 0
end
redis.call('HSET', KEYS[1], 'body', ARGV[2], 'unique', ARGV[3], 'rev', rev + 1)
return 1
"#;

const CAS_GONE: i64 = -1;
const CAS_WRITTEN: i64 = 1;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Formula: (CPU cores × 2) + 1
/// For 8-core systems: 16 connections is optimal
/// Override with REDIS_POOL_SIZE environment variable
pub const DEFAULT_POOL_SIZE: u32 = 16;

/// Default wait for a pooled connection, and for opening a new one.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    pub connection_timeout: Duration,
    pub namespace: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl RedisConfig {
    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        if let Some(password) = &self.password {
            if let Some(username) = &self.username {
                format!(
                    "redis://{}:{}@{}:{}/{}",
                    username, password, self.host, self.port, self.database
                )
            } else {
                format!(
                    "redis://default:{}@{}:{}/{}",
                    password, self.host, self.port, self.database
                )
            }
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        }
    }
}

/// Redis backend with connection pooling and async operations.
///
/// # Example
///
/// ```no_run
/// # use crm_store::backend::{DocumentBackend, RedisBackend, RedisConfig};
/// # use crm_store::error::Result;
/// # async fn example() -> Result<()> {
/// let backend = RedisBackend::new(RedisConfig::default()).await?;
/// assert!(backend.health_check().await?);
/// let total = backend.count("customers").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
    keys: KeyBuilder,
}

fn create_pool(conn_str: &str, pool_size: u32, timeout: Duration) -> Result<Pool> {
    let mut pool_cfg = deadpool_redis::PoolConfig::new(pool_size as usize);
    pool_cfg.timeouts.wait = Some(timeout);
    pool_cfg.timeouts.create = Some(timeout);

    let mut cfg = PoolConfig::from_url(conn_str);
    cfg.pool = Some(pool_cfg);
    cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| Error::BackendError(format!("Failed to create Redis pool: {}", e)))
}

fn conflict(collection: &str, key: &UniqueKey) -> Error {
    Error::Conflict {
        collection: collection.to_string(),
        field: key.field.clone(),
        value: key.value.clone(),
    }
}

fn parse_unique(raw: &str) -> Result<Vec<UniqueKey>> {
    serde_json::from_str(raw).map_err(|e| {
        Error::DeserializationError(format!("Corrupt unique index list: {}", e))
    })
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// The pool connects lazily; use [`DocumentBackend::health_check`] to verify reachability.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = create_pool(
            &config.connection_string(),
            config.pool_size,
            config.connection_timeout,
        )?;

        info!(
            "✓ Redis backend initialized: {}:{} (namespace: {})",
            config.host, config.port, config.namespace
        );

        Ok(RedisBackend {
            pool,
            keys: KeyBuilder::new(config.namespace),
        })
    }

    /// Create from connection string directly.
    ///
    /// # Errors
    /// Returns `Err` if the connection string is malformed or pool creation fails.
    pub async fn from_connection_string(
        conn_str: &str,
        pool_size: u32,
        namespace: &str,
    ) -> Result<Self> {
        if pool_size == 0 {
            return Err(Error::ConfigError("Redis pool size must be > 0".to_string()));
        }
        let pool = create_pool(conn_str, pool_size, DEFAULT_CONNECTION_TIMEOUT)?;

        info!(
            "✓ Redis backend initialized from connection string (pool size: {}, namespace: {})",
            pool_size, namespace
        );

        Ok(RedisBackend {
            pool,
            keys: KeyBuilder::new(namespace),
        })
    }

    /// Get current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    pub fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }

    /// Claim every key in `keys` for `id` with `SET NX`.
    ///
    /// Keys already owned by `id` count as claimed. On the first key owned by
    /// another document the keys claimed so far are released and a conflict
    /// is returned. Otherwise returns the Redis keys this call set.
    async fn claim_unique(
        &self,
        conn: &mut Connection,
        collection: &str,
        id: &str,
        keys: &[UniqueKey],
    ) -> Result<Vec<String>> {
        let mut claimed: Vec<String> = Vec::with_capacity(keys.len());

        for key in keys {
            let redis_key = self.keys.unique(collection, key);
            let won: bool = conn
                .set_nx(&redis_key, id)
                .await
                .map_err(|e| Error::BackendError(format!("Redis SETNX failed for {}: {}", redis_key, e)))?;
            if won {
                claimed.push(redis_key);
                continue;
            }

            let owner: Option<String> = conn
                .get(&redis_key)
                .await
                .map_err(|e| Error::BackendError(format!("Redis GET failed for {}: {}", redis_key, e)))?;
            if owner.as_deref() == Some(id) {
                continue;
            }

            self.release(conn, &claimed).await;
            debug!("⚠ Redis unique claim {} lost to {:?}", redis_key, owner);
            return Err(conflict(collection, key));
        }
        Ok(claimed)
    }

    /// Read body, unique list and revision of one document.
    async fn load(
        &self,
        conn: &mut Connection,
        doc_key: &str,
    ) -> Result<Option<(Vec<u8>, Vec<UniqueKey>, i64)>> {
        let (body, unique, rev): (Option<Vec<u8>>, Option<String>, Option<i64>) =
            redis::cmd("HMGET")
                .arg(doc_key)
                .arg(FIELD_BODY)
                .arg(FIELD_UNIQUE)
                .arg(FIELD_REV)
                .query_async(&mut **conn)
                .await
                .map_err(|e| Error::BackendError(format!("Redis HMGET failed for key {}: {}", doc_key, e)))?;

        match (body, unique) {
            (Some(body), Some(unique)) => Ok(Some((body, parse_unique(&unique)?, rev.unwrap_or(0)))),
            _ => Ok(None),
        }
    }

    /// Write `record` over a document last read at revision `rev`.
    ///
    /// Claims the unique keys `record` adds over `old_keys` first and releases
    /// them again if the write does not land. Stale keys are released only
    /// after a successful write. Returns `false` if the document is gone.
    ///
    /// # Errors
    /// Returns `Error::WriteConflict` if the revision moved since the read.
    async fn write_existing(
        &self,
        conn: &mut Connection,
        collection: &str,
        old_keys: &[UniqueKey],
        rev: i64,
        record: &DocumentRecord,
    ) -> Result<bool> {
        let doc_key = self.keys.document(collection, &record.id);
        let added: Vec<UniqueKey> = record
            .unique
            .iter()
            .filter(|k| !old_keys.contains(k))
            .cloned()
            .collect();
        let claimed = self
            .claim_unique(conn, collection, &record.id, &added)
            .await?;

        let unique_json = serde_json::to_string(&record.unique)?;
        let outcome: redis::RedisResult<i64> = redis::cmd("EVAL")
            .arg(CAS_WRITE)
            .arg(1)
            .arg(&doc_key)
            .arg(rev)
            .arg(&record.body)
            .arg(&unique_json)
            .query_async(&mut **conn)
            .await;

        match outcome {
            Ok(CAS_WRITTEN) => {}
            Ok(CAS_GONE) => {
                self.release(conn, &claimed).await;
                return Ok(false);
            }
            Ok(_) => {
                self.release(conn, &claimed).await;
                debug!("⚠ Redis write to {} lost to a concurrent writer", doc_key);
                return Err(Error::write_conflict(collection, &record.id));
            }
            Err(e) => {
                self.release(conn, &claimed).await;
                return Err(Error::BackendError(format!(
                    "Redis write failed for key {}: {}",
                    doc_key, e
                )));
            }
        }

        let stale: Vec<String> = old_keys
            .iter()
            .filter(|k| !record.unique.contains(k))
            .map(|k| self.keys.unique(collection, k))
            .collect();
        self.release(conn, &stale).await;
        Ok(true)
    }

    /// Best-effort delete of unique index entries.
    async fn release(&self, conn: &mut Connection, redis_keys: &[String]) {
        if redis_keys.is_empty() {
            return;
        }
        if let Err(e) = conn.del::<_, ()>(redis_keys).await {
            warn!("⚠ Redis failed to release {} unique keys: {}", redis_keys.len(), e);
        }
    }
}

impl DocumentBackend for RedisBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        let doc_key = self.keys.document(collection, id);

        let value: Option<Vec<u8>> = conn
            .hget(&doc_key, FIELD_BODY)
            .await
            .map_err(|e| Error::BackendError(format!("Redis HGET failed for key {}: {}", doc_key, e)))?;

        if value.is_some() {
            debug!("✓ Redis GET {} -> HIT", doc_key);
        } else {
            debug!("✓ Redis GET {} -> MISS", doc_key);
        }
        Ok(value)
    }

    async fn insert(&self, collection: &str, record: DocumentRecord) -> Result<()> {
        let mut conn = self.conn().await?;
        let doc_key = self.keys.document(collection, &record.id);

        let taken: bool = conn
            .exists(&doc_key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis EXISTS failed for key {}: {}", doc_key, e)))?;
        if taken {
            return Err(conflict(collection, &UniqueKey::new("_id", record.id.as_str())));
        }

        let claimed = self
            .claim_unique(&mut conn, collection, &record.id, &record.unique)
            .await?;

        let unique_json = serde_json::to_string(&record.unique)?;
        let written = redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(&doc_key)
            .arg(FIELD_BODY)
            .arg(&record.body)
            .arg(FIELD_CREATED)
            .arg(record.created_at)
            .arg(FIELD_UNIQUE)
            .arg(&unique_json)
            .arg(FIELD_REV)
            .arg(0)
            .ignore()
            .zadd(self.keys.order(collection), &record.id, record.created_at)
            .ignore()
            .query_async::<()>(&mut *conn)
            .await;

        if let Err(e) = written {
            self.release(&mut conn, &claimed).await;
            return Err(Error::BackendError(format!(
                "Redis insert failed for key {}: {}",
                doc_key, e
            )));
        }

        debug!("✓ Redis INSERT {}", doc_key);
        Ok(())
    }

    async fn replace(&self, collection: &str, record: DocumentRecord) -> Result<bool> {
        let mut conn = self.conn().await?;
        let doc_key = self.keys.document(collection, &record.id);

        let Some((_, old_keys, rev)) = self.load(&mut conn, &doc_key).await? else {
            return Ok(false);
        };
        let replaced = self
            .write_existing(&mut conn, collection, &old_keys, rev, &record)
            .await?;

        if replaced {
            debug!("✓ Redis REPLACE {}", doc_key);
        }
        Ok(replaced)
    }

    async fn modify<F>(&self, collection: &str, id: &str, edit: F) -> Result<bool>
    where
        F: FnOnce(&[u8]) -> Result<DocumentRecord> + Send,
    {
        let mut conn = self.conn().await?;
        let doc_key = self.keys.document(collection, id);

        let Some((body, old_keys, rev)) = self.load(&mut conn, &doc_key).await? else {
            return Ok(false);
        };
        let record = edit(&body)?;
        if record.id != id {
            return Err(Error::Other(format!(
                "modify of {} produced record {}",
                doc_key, record.id
            )));
        }
        let modified = self
            .write_existing(&mut conn, collection, &old_keys, rev, &record)
            .await?;

        if modified {
            debug!("✓ Redis MODIFY {} (rev {})", doc_key, rev + 1);
        }
        Ok(modified)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let doc_key = self.keys.document(collection, id);

        let current: Option<String> = conn
            .hget(&doc_key, FIELD_UNIQUE)
            .await
            .map_err(|e| Error::BackendError(format!("Redis HGET failed for key {}: {}", doc_key, e)))?;
        let Some(current) = current else {
            return Ok(false);
        };

        let mut doomed = vec![doc_key.clone()];
        doomed.extend(
            parse_unique(&current)?
                .iter()
                .map(|k| self.keys.unique(collection, k)),
        );

        redis::pipe()
            .atomic()
            .del(&doomed)
            .ignore()
            .zrem(self.keys.order(collection), id)
            .ignore()
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis DEL failed for key {}: {}", doc_key, e)))?;

        debug!("✓ Redis DELETE {}", doc_key);
        Ok(true)
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.conn().await?;
        let order_key = self.keys.order(collection);

        let ids: Vec<String> = conn
            .zrevrange(&order_key, 0, -1)
            .await
            .map_err(|e| Error::BackendError(format!("Redis ZREVRANGE failed for key {}: {}", order_key, e)))?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hget(self.keys.document(collection, id), FIELD_BODY);
        }
        let bodies: Vec<Option<Vec<u8>>> = pipe
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis HGET (bulk) failed: {}", e)))?;

        debug!("✓ Redis SCAN {} -> {} documents", order_key, ids.len());
        Ok(bodies.into_iter().flatten().collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let mut conn = self.conn().await?;
        let order_key = self.keys.order(collection);

        conn.zcard(&order_key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis ZCARD failed for key {}: {}", order_key, e)))
    }

    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let doc_key = self.keys.document(collection, id);

        conn.exists(&doc_key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis EXISTS failed for key {}: {}", doc_key, e)))
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.conn().await?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong == "PONG" || pong.contains("PONG"))
    }

    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let pattern = self.keys.pattern();

        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis KEYS failed: {}", e)))?;

        if !keys.is_empty() {
            conn.del::<_, ()>(&keys)
                .await
                .map_err(|e| Error::BackendError(format!("Redis DEL (bulk) failed: {}", e)))?;
        }

        warn!(
            "⚠ Redis CLEAR_ALL executed - {} keys under {} removed!",
            keys.len(),
            pattern
        );
        Ok(())
    }
}
