//! The dual-mode store façade.
//!
//! [`Store`] presents one CRUD contract for every [`Document`] type and routes
//! it to the backend chosen at construction. Every write follows the same
//! pipeline: build or merge, derive, validate, persist. Writes to an existing
//! document run that pipeline inside one atomic backend read-modify-write. Reads decode what is
//! at rest; virtual fields are added by [`Document::view`].

use crate::backend::{DocumentBackend, InMemoryBackend, StoreBackend};
use crate::codec;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::id;
use crate::mode::{self, BackendMode};
use crate::model::{Customer, Document};
use crate::observability::{NoOpMetrics, StoreMetrics};
use crate::page::{Page, PageRequest};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

mod collection;
mod subentity;
mod summary;

pub use collection::Collection;

/// Persistence façade over one backend.
///
/// Cheap to clone; clones share the backend.
///
/// # Example
///
/// ```no_run
/// use crm_store::model::{Customer, CustomerInput};
/// use crm_store::{Store, StoreConfig};
///
/// # async fn example() -> crm_store::Result<()> {
/// let store = Store::connect(&StoreConfig::from_env()?).await;
/// let jane = store
///     .customers()
///     .create(CustomerInput::new("Jane Doe", "jane@example.com"))
///     .await?;
/// let same: Customer = store.get(&jane.id).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Store {
    backend: StoreBackend,
    metrics: Arc<dyn StoreMetrics>,
}

impl Store {
    /// Wrap an already chosen backend.
    pub fn new(backend: StoreBackend) -> Self {
        info!("✓ Store ready ({} backend)", backend.mode());
        Store {
            backend,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Store on a fresh volatile backend.
    pub fn in_memory() -> Self {
        Self::new(StoreBackend::Volatile(InMemoryBackend::new()))
    }

    /// Probe the durable backend and fall back to the volatile one if it is
    /// unreachable. Never fails.
    pub async fn connect(config: &StoreConfig) -> Self {
        Self::new(mode::select_backend(config).await)
    }

    /// Require the durable backend.
    ///
    /// # Errors
    /// Returns `Error::Unavailable` if the probe fails.
    pub async fn connect_durable(config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(mode::probe_durable(config).await?))
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn StoreMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    pub fn backend(&self) -> &StoreBackend {
        &self.backend
    }

    /// Handle bound to one collection.
    pub fn collection<T: Document>(&self) -> Collection<'_, T> {
        Collection::new(self)
    }

    pub fn customers(&self) -> Collection<'_, Customer> {
        self.collection()
    }

    pub fn invoices(&self) -> Collection<'_, crate::model::Invoice> {
        self.collection()
    }

    pub fn queries(&self) -> Collection<'_, crate::model::Query> {
        self.collection()
    }

    /// Filtered, ordered page of a collection.
    pub async fn list<T: Document>(&self, filter: &T::Filter, page: PageRequest) -> Result<Page<T>> {
        let started = Instant::now();
        let mut docs: Vec<T> = self
            .all::<T>()
            .await?
            .into_iter()
            .filter(|d| d.matches(filter))
            .collect();
        if T::sort_order(filter) == crate::model::SortOrder::Oldest {
            docs.reverse();
        }
        self.metrics
            .record_read(T::collection(), "list", started.elapsed());
        Ok(Page::slice(docs, page))
    }

    /// Every document of a collection, newest first.
    pub async fn all<T: Document>(&self) -> Result<Vec<T>> {
        let bodies = self
            .backend
            .scan(T::collection())
            .await
            .map_err(|e| self.observe(T::collection(), "scan", e))?;
        bodies
            .iter()
            .map(|b| codec::decode(b))
            .collect::<Result<Vec<T>>>()
            .map_err(|e| self.observe(T::collection(), "scan", e))
    }

    pub async fn count<T: Document>(&self) -> Result<usize> {
        self.backend
            .count(T::collection())
            .await
            .map_err(|e| self.observe(T::collection(), "count", e))
    }

    pub async fn create<T: Document>(&self, input: T::Input) -> Result<T> {
        let started = Instant::now();
        let now = Utc::now();

        let mut doc = T::from_input(id::generate(), input, now)?;
        if let Some(customer_id) = doc.customer_ref().filter(|c| !c.is_empty()) {
            let customer_id = customer_id.to_string();
            let customer: Customer = self.get(&customer_id).await?;
            doc.snapshot_customer(&customer);
        }

        let doc = self.prepare(doc, now)?;
        let record = codec::record(&doc)?;
        self.backend
            .insert(T::collection(), record)
            .await
            .map_err(|e| self.observe(T::collection(), "create", e))?;

        debug!("✓ Created {}/{}", T::collection(), doc.id());
        self.metrics
            .record_write(T::collection(), "create", started.elapsed());
        Ok(doc)
    }

    pub async fn get<T: Document>(&self, id: &str) -> Result<T> {
        let started = Instant::now();
        let body = self
            .backend
            .get(T::collection(), id)
            .await
            .map_err(|e| self.observe(T::collection(), "get", e))?
            .ok_or_else(|| Error::not_found(T::collection(), id))?;
        let doc = codec::decode(&body).map_err(|e| self.observe(T::collection(), "get", e))?;
        self.metrics
            .record_read(T::collection(), "get", started.elapsed());
        Ok(doc)
    }

    /// Fetch a document and render its read-time view.
    pub async fn get_view<T: Document>(&self, id: &str) -> Result<T::View> {
        Ok(self.get::<T>(id).await?.view(Utc::now()))
    }

    /// Merge `patch` onto a stored document, re-derive, and persist.
    pub async fn update<T: Document>(&self, id: &str, patch: T::Patch) -> Result<T> {
        let started = Instant::now();
        let now = Utc::now();

        let doc = self
            .modify(id, "update", |mut doc: T| {
                doc.apply_patch(patch, now)?;
                doc.touch(now);
                self.prepare(doc, now)
            })
            .await?;

        debug!("✓ Updated {}/{}", T::collection(), id);
        self.metrics
            .record_write(T::collection(), "update", started.elapsed());
        Ok(doc)
    }

    pub async fn delete<T: Document>(&self, id: &str) -> Result<()> {
        let started = Instant::now();
        let removed = self
            .backend
            .delete(T::collection(), id)
            .await
            .map_err(|e| self.observe(T::collection(), "delete", e))?;
        if !removed {
            return Err(Error::not_found(T::collection(), id));
        }

        debug!("✓ Deleted {}/{}", T::collection(), id);
        self.metrics
            .record_write(T::collection(), "delete", started.elapsed());
        Ok(())
    }

    /// Derive, then validate the derived document.
    fn prepare<T: Document>(&self, doc: T, now: DateTime<Utc>) -> Result<T> {
        let doc = doc.derive(now);
        doc.validate()?;
        Ok(doc)
    }

    /// Atomic read-modify-write of one stored document.
    ///
    /// `edit` runs against the stored state with no other write able to land
    /// in between; its error aborts the write. A missing document is `NotFound`.
    pub(crate) async fn modify<T, F>(&self, id: &str, op: &str, edit: F) -> Result<T>
    where
        T: Document,
        F: FnOnce(T) -> Result<T> + Send,
    {
        let mut written: Option<T> = None;
        let found = self
            .backend
            .modify(T::collection(), id, |body| {
                let doc = edit(codec::decode(body)?)?;
                let record = codec::record(&doc)?;
                written = Some(doc);
                Ok(record)
            })
            .await
            .map_err(|e| self.observe(T::collection(), op, e))?;

        match written {
            Some(doc) if found => Ok(doc),
            _ => Err(Error::not_found(T::collection(), id)),
        }
    }

    /// Report a backend-side failure to metrics and hand it back unchanged.
    fn observe(&self, collection: &str, op: &str, e: Error) -> Error {
        match &e {
            Error::Conflict { field, .. } => self.metrics.record_conflict(collection, field),
            Error::WriteConflict { .. } => self.metrics.record_conflict(collection, "_rev"),
            Error::NotFound { .. } | Error::ChildNotFound { .. } | Error::Validation(_) => {}
            other => self.metrics.record_error(collection, op, &other.to_string()),
        }
        e
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::in_memory()
    }
}
