//! Document backend implementations.

use crate::error::Result;
use crate::model::UniqueKey;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::{BackendStats, InMemoryBackend};
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// One stored document plus the metadata backends index it by.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    /// Creation time in epoch milliseconds. Orders list results.
    pub created_at: i64,
    /// Unique index entries this document owns.
    pub unique: Vec<UniqueKey>,
    /// Encoded document body.
    pub body: Vec<u8>,
}

/// Trait for document backend implementations.
///
/// Every backend keeps one ordered collection per entity type, indexed by id
/// and by the document's unique keys. Writes address a single document and are
/// atomic per document; there are no multi-document transactions.
///
/// **IMPORTANT:** All methods use `&self` instead of `&mut self` to allow concurrent access.
/// Backend implementations should use interior mutability or external storage.
///
/// **ASYNC:** All methods are async and must be awaited.
#[allow(async_fn_in_trait)]
pub trait DocumentBackend: Send + Sync + Clone {
    /// Fetch the encoded body of one document.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs (connection lost, etc.)
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>>;

    /// Store a new document.
    ///
    /// # Errors
    /// Returns `Error::Conflict` if the id or any unique key is already taken.
    async fn insert(&self, collection: &str, record: DocumentRecord) -> Result<()>;

    /// Overwrite an existing document, moving its unique keys to the new set.
    ///
    /// Returns `false` if no document with `record.id` exists.
    ///
    /// # Errors
    /// Returns `Error::Conflict` if a new unique key belongs to another document.
    async fn replace(&self, collection: &str, record: DocumentRecord) -> Result<bool>;

    /// Atomic read-modify-write of one document.
    ///
    /// `edit` receives the stored body and returns the record to write back.
    /// No other write to the document can land between the read and the
    /// write. Returns `false`, without calling `edit`, if the document does
    /// not exist. An error from `edit` aborts the write.
    ///
    /// # Errors
    /// Returns `Error::Conflict` if a new unique key belongs to another document,
    /// and `Error::WriteConflict` if the backend detected a concurrent write
    /// and discarded this one. Neither case is retried here.
    async fn modify<F>(&self, collection: &str, id: &str, edit: F) -> Result<bool>
    where
        F: FnOnce(&[u8]) -> Result<DocumentRecord> + Send;

    /// Remove a document and release its unique keys.
    ///
    /// Returns `false` if the document did not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// All bodies of a collection, newest-created first.
    async fn scan(&self, collection: &str) -> Result<Vec<Vec<u8>>>;

    async fn count(&self, collection: &str) -> Result<usize>;

    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }

    /// Health check - verify backend is accessible.
    ///
    /// Used by backend selection and readiness probes.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Drop every collection (use with caution).
    async fn clear_all(&self) -> Result<()>;
}

/// The backend a [`Store`](crate::store::Store) is bound to.
///
/// Chosen once at construction; see [`select_backend`](crate::mode::select_backend).
#[derive(Clone)]
pub enum StoreBackend {
    Volatile(InMemoryBackend),
    #[cfg(feature = "redis")]
    Durable(RedisBackend),
}

impl StoreBackend {
    pub fn mode(&self) -> crate::mode::BackendMode {
        match self {
            StoreBackend::Volatile(_) => crate::mode::BackendMode::Volatile,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(_) => crate::mode::BackendMode::Durable,
        }
    }
}

impl DocumentBackend for StoreBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>> {
        match self {
            StoreBackend::Volatile(b) => b.get(collection, id).await,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(b) => b.get(collection, id).await,
        }
    }

    async fn insert(&self, collection: &str, record: DocumentRecord) -> Result<()> {
        match self {
            StoreBackend::Volatile(b) => b.insert(collection, record).await,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(b) => b.insert(collection, record).await,
        }
    }

    async fn replace(&self, collection: &str, record: DocumentRecord) -> Result<bool> {
        match self {
            StoreBackend::Volatile(b) => b.replace(collection, record).await,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(b) => b.replace(collection, record).await,
        }
    }

    async fn modify<F>(&self, collection: &str, id: &str, edit: F) -> Result<bool>
    where
        F: FnOnce(&[u8]) -> Result<DocumentRecord> + Send,
    {
        match self {
            StoreBackend::Volatile(b) => b.modify(collection, id, edit).await,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(b) => b.modify(collection, id, edit).await,
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        match self {
            StoreBackend::Volatile(b) => b.delete(collection, id).await,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(b) => b.delete(collection, id).await,
        }
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Vec<u8>>> {
        match self {
            StoreBackend::Volatile(b) => b.scan(collection).await,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(b) => b.scan(collection).await,
        }
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        match self {
            StoreBackend::Volatile(b) => b.count(collection).await,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(b) => b.count(collection).await,
        }
    }

    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        match self {
            StoreBackend::Volatile(b) => b.exists(collection, id).await,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(b) => b.exists(collection, id).await,
        }
    }

    async fn health_check(&self) -> Result<bool> {
        match self {
            StoreBackend::Volatile(b) => b.health_check().await,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(b) => b.health_check().await,
        }
    }

    async fn clear_all(&self) -> Result<()> {
        match self {
            StoreBackend::Volatile(b) => b.clear_all().await,
            #[cfg(feature = "redis")]
            StoreBackend::Durable(b) => b.clear_all().await,
        }
    }
}
