//! Storage key layout for namespaced backends.
//!
//! ```text
//! {ns}:{collection}:{id}                       document hash
//! {ns}:{collection}:_order                     ids scored by creation ms
//! {ns}:{collection}:_unique:{field}:{value}    unique index entry -> id
//! ```

use crate::model::UniqueKey;

pub const DEFAULT_NAMESPACE: &str = "crm";

/// Builder for storage keys under one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    namespace: String,
}

impl KeyBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        KeyBuilder {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key of one document.
    pub fn document(&self, collection: &str, id: &str) -> String {
        Self::build_composite(&[&self.namespace, collection, id])
    }

    /// Key of a collection's creation-order index.
    pub fn order(&self, collection: &str) -> String {
        Self::build_composite(&[&self.namespace, collection, "_order"])
    }

    /// Key of a unique index entry.
    pub fn unique(&self, collection: &str, key: &UniqueKey) -> String {
        Self::build_composite(&[
            &self.namespace,
            collection,
            "_unique",
            &key.field,
            &key.value,
        ])
    }

    /// Glob matching every key in the namespace.
    pub fn pattern(&self) -> String {
        format!("{}:*", self.namespace)
    }

    /// Build composite key from multiple parts.
    fn build_composite(parts: &[&str]) -> String {
        parts.join(":")
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        KeyBuilder::new(DEFAULT_NAMESPACE)
    }
}
