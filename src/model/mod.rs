//! Entity schemas: Customer, Invoice (+ LineItem), Query (+ Note).
//!
//! Every persisted entity implements [`Document`]. The trait describes how a
//! document is built from client input, how patches merge onto it, which unique
//! indexes it participates in, and how its read-time view is produced. The
//! store drives these hooks identically for both backends.

use crate::error::Result;
use crate::schema::Schema;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod customer;
pub mod invoice;
pub mod query;

pub use customer::{
    Address, AddressInput, Customer, CustomerFilter, CustomerInput, CustomerPatch, CustomerStatus,
    CustomerView,
};
pub use invoice::{
    Invoice, InvoiceFilter, InvoiceInput, InvoicePatch, InvoiceStatus, InvoiceView, LineItem,
    LineItemInput, LineItemPatch, PaymentMethod,
};
pub use query::{
    Attachment, Category, Note, NoteInput, NotePatch, Priority, Query, QueryFilter, QueryInput,
    QueryPatch, QueryStatus, QueryView, Source,
};

/// A value a unique index is keyed on, e.g. `("email", "jane@example.com")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueKey {
    pub field: String,
    pub value: String,
}

impl UniqueKey {
    pub fn new(field: &str, value: impl Into<String>) -> Self {
        UniqueKey {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

/// List ordering by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

/// Trait implemented by every top-level entity the store persists.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Create payload.
    type Input: Send;
    /// Partial update payload. Derived fields are never part of it.
    type Patch: Send;
    /// List filter.
    type Filter: Send + Sync;
    /// Read-time representation with virtual fields filled in.
    type View: Serialize;

    /// Collection name, e.g. `"customers"`.
    fn collection() -> &'static str;

    fn schema() -> &'static Schema;

    fn id(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    /// Build a fresh document. Defaults are applied here; derivation is not.
    fn from_input(id: String, input: Self::Input, now: DateTime<Utc>) -> Result<Self>;

    /// Merge `patch` onto the document. Embedded children created by the patch
    /// are stamped with `now`.
    fn apply_patch(&mut self, patch: Self::Patch, now: DateTime<Utc>) -> Result<()>;

    /// Bump `updatedAt`.
    fn touch(&mut self, now: DateTime<Utc>);

    /// Recompute derived fields. Invoked by the store right before every persist.
    fn derive(self, _now: DateTime<Utc>) -> Self {
        self
    }

    /// Values that must be unique across the collection.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }

    /// Id of the referenced customer whose name/email is snapshotted on create.
    fn customer_ref(&self) -> Option<&str> {
        None
    }

    fn snapshot_customer(&mut self, _customer: &Customer) {}

    fn matches(&self, filter: &Self::Filter) -> bool;

    fn sort_order(filter: &Self::Filter) -> SortOrder;

    fn view(self, now: DateTime<Utc>) -> Self::View;

    /// Check the document against its schema, derived fields included.
    fn validate(&self) -> Result<()> {
        let value = serde_json::to_value(self)?;
        Self::schema().validate(&value)
    }
}

/// Trim a string, mapping blank input to `None`.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
