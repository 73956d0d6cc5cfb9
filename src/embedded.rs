//! Ordered, id-addressable child records embedded in a parent document.
//!
//! Line items live inside an invoice and notes inside a query. Children have
//! their own identity but no storage of their own: they are persisted,
//! derived and deleted together with the parent. Lookup is a linear scan,
//! which is fine for the small lists these parents carry.

use crate::error::Result;
use crate::model::Document;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record embedded in a parent's ordered child list.
pub trait ChildRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Payload used to create a child.
    type Input: Send;
    /// Partial update applied to an existing child.
    type Patch: Send;

    /// Singular name used in error messages (`lineItem`, `note`).
    fn kind() -> &'static str;

    fn id(&self) -> &str;

    fn from_input(id: String, input: Self::Input, now: DateTime<Utc>) -> Result<Self>;

    /// Merge `patch` into `self` and re-stamp `updatedAt`.
    fn apply_patch(&mut self, patch: Self::Patch, now: DateTime<Utc>);
}

/// A document that owns an embedded child list.
pub trait Parent: Document {
    type Child: ChildRecord;

    /// Whether the child list feeds derived fields of the parent.
    ///
    /// When true, every child mutation re-runs the parent's derivation.
    const CHILDREN_FEED_DERIVATION: bool;

    fn children(&self) -> &Children<Self::Child>;

    fn children_mut(&mut self) -> &mut Children<Self::Child>;
}

/// Ordered child list. Insertion order is the iteration and display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Children<C>(Vec<C>);

impl<C> Default for Children<C> {
    fn default() -> Self {
        Children(Vec::new())
    }
}

impl<C: ChildRecord> Children<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the end of the list.
    pub fn push(&mut self, child: C) {
        self.0.push(child);
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|c| c.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&C> {
        self.position(id).map(|i| &self.0[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut C> {
        self.position(id).map(move |i| &mut self.0[i])
    }

    /// Remove the child with `id`, keeping the relative order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<C> {
        self.position(id).map(|i| self.0.remove(i))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.id()).collect()
    }
}

impl<C> Children<C> {
    pub fn iter(&self) -> std::slice::Iter<'_, C> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, C> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[C] {
        &self.0
    }
}

impl<C> FromIterator<C> for Children<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Children(iter.into_iter().collect())
    }
}

impl<'a, C> IntoIterator for &'a Children<C> {
    type Item = &'a C;
    type IntoIter = std::slice::Iter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
