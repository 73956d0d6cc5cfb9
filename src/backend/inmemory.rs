//! In-memory document backend (volatile, thread-safe, async).
//!
//! Uses DashMap keyed by collection name. Each collection is an ordered vector
//! of records plus a unique index. Every mutation, including the edit closure
//! of `modify`, runs synchronously while the collection's shard guard is held
//! and never awaits, so concurrent writes to one collection are serialized.

use super::{DocumentBackend, DocumentRecord};
use crate::error::{Error, Result};
use crate::model::UniqueKey;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Records of one entity type, ascending by creation time.
#[derive(Default)]
struct Collection {
    docs: Vec<DocumentRecord>,
    unique: HashMap<UniqueKey, String>,
}

impl Collection {
    fn position(&self, id: &str) -> Option<usize> {
        self.docs.iter().position(|d| d.id == id)
    }

    /// Swap the record at `pos` for `record`, moving its unique index entries.
    fn overwrite(&mut self, collection: &str, pos: usize, record: DocumentRecord) -> Result<()> {
        if let Some(key) = self.taken(&record.unique, &record.id) {
            return Err(conflict(collection, key));
        }
        let old = std::mem::replace(&mut self.docs[pos], record);
        for key in &old.unique {
            self.unique.remove(key);
        }
        let doc = &self.docs[pos];
        for key in &doc.unique {
            self.unique.insert(key.clone(), doc.id.clone());
        }
        Ok(())
    }

    /// First unique key in `keys` held by a document other than `id`.
    fn taken<'k>(&self, keys: &'k [UniqueKey], id: &str) -> Option<&'k UniqueKey> {
        keys.iter()
            .find(|k| self.unique.get(*k).is_some_and(|owner| owner != id))
    }
}

fn conflict(collection: &str, key: &UniqueKey) -> Error {
    Error::Conflict {
        collection: collection.to_string(),
        field: key.field.clone(),
        value: key.value.clone(),
    }
}

/// Thread-safe async in-memory document backend.
///
/// Clones share the same underlying collections.
///
/// # Example
///
/// ```no_run
/// use crm_store::backend::{DocumentBackend, DocumentRecord, InMemoryBackend};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend
///         .insert(
///             "customers",
///             DocumentRecord {
///                 id: "c1".into(),
///                 created_at: 0,
///                 unique: vec![],
///                 body: b"{}".to_vec(),
///             },
///         )
///         .await?;
///
///     assert!(backend.get("customers", "c1").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    collections: Arc<DashMap<String, Collection>>,
}

impl InMemoryBackend {
    /// Create a new, empty in-memory backend.
    pub fn new() -> Self {
        InMemoryBackend {
            collections: Arc::new(DashMap::new()),
        }
    }

    /// Get storage statistics.
    pub fn stats(&self) -> BackendStats {
        let mut stats = BackendStats {
            collections: self.collections.len(),
            documents: 0,
            total_bytes: 0,
        };
        for entry in self.collections.iter() {
            stats.documents += entry.docs.len();
            stats.total_bytes += entry.docs.iter().map(|d| d.body.len()).sum::<usize>();
        }
        stats
    }

    /// Print storage statistics to debug log.
    pub fn log_stats(&self) {
        let stats = self.stats();
        debug!(
            "InMemory Stats: {} collections, {} documents, {} bytes",
            stats.collections, stats.documents, stats.total_bytes
        );
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBackend for InMemoryBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>> {
        let body = self.collections.get(collection).and_then(|coll| {
            coll.position(id).map(|i| coll.docs[i].body.clone())
        });

        if body.is_some() {
            debug!("✓ InMemory GET {}/{} -> HIT", collection, id);
        } else {
            debug!("✓ InMemory GET {}/{} -> MISS", collection, id);
        }
        Ok(body)
    }

    async fn insert(&self, collection: &str, record: DocumentRecord) -> Result<()> {
        let mut guard = self.collections.entry(collection.to_string()).or_default();
        let coll = &mut *guard;

        if coll.position(&record.id).is_some() {
            return Err(conflict(collection, &UniqueKey::new("_id", record.id.as_str())));
        }
        if let Some(key) = coll.taken(&record.unique, &record.id) {
            return Err(conflict(collection, key));
        }

        for key in &record.unique {
            coll.unique.insert(key.clone(), record.id.clone());
        }
        let at = coll
            .docs
            .partition_point(|d| d.created_at <= record.created_at);
        debug!("✓ InMemory INSERT {}/{}", collection, record.id);
        coll.docs.insert(at, record);
        Ok(())
    }

    async fn replace(&self, collection: &str, record: DocumentRecord) -> Result<bool> {
        let Some(mut guard) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        let coll = &mut *guard;

        let Some(pos) = coll.position(&record.id) else {
            return Ok(false);
        };
        let id = record.id.clone();
        coll.overwrite(collection, pos, record)?;

        debug!("✓ InMemory REPLACE {}/{}", collection, id);
        Ok(true)
    }

    async fn modify<F>(&self, collection: &str, id: &str, edit: F) -> Result<bool>
    where
        F: FnOnce(&[u8]) -> Result<DocumentRecord> + Send,
    {
        let Some(mut guard) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        let coll = &mut *guard;

        let Some(pos) = coll.position(id) else {
            return Ok(false);
        };
        let record = edit(&coll.docs[pos].body)?;
        if record.id != id {
            return Err(Error::Other(format!(
                "modify of {}/{} produced record {}",
                collection, id, record.id
            )));
        }
        coll.overwrite(collection, pos, record)?;

        debug!("✓ InMemory MODIFY {}/{}", collection, id);
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let Some(mut guard) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        let coll = &mut *guard;

        let Some(pos) = coll.position(id) else {
            return Ok(false);
        };
        let removed = coll.docs.remove(pos);
        for key in &removed.unique {
            coll.unique.remove(key);
        }

        debug!("✓ InMemory DELETE {}/{}", collection, id);
        Ok(true)
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Vec<u8>>> {
        let bodies: Vec<Vec<u8>> = self
            .collections
            .get(collection)
            .map(|coll| coll.docs.iter().rev().map(|d| d.body.clone()).collect())
            .unwrap_or_default();

        debug!("✓ InMemory SCAN {} -> {} documents", collection, bodies.len());
        Ok(bodies)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .collections
            .get(collection)
            .map_or(0, |coll| coll.docs.len()))
    }

    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self
            .collections
            .get(collection)
            .is_some_and(|coll| coll.position(id).is_some()))
    }

    async fn health_check(&self) -> Result<bool> {
        // In-memory backend is always healthy
        Ok(true)
    }

    async fn clear_all(&self) -> Result<()> {
        self.collections.clear();
        warn!("⚠ InMemory CLEAR_ALL executed - all collections dropped!");
        Ok(())
    }
}

/// Storage statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendStats {
    pub collections: usize,
    pub documents: usize,
    pub total_bytes: usize,
}
