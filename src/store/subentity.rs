//! CRUD for child records embedded in a parent document.
//!
//! Every mutation edits the parent inside one atomic read-modify-write, so
//! concurrent child writes to the same parent never overwrite each other. A
//! missing parent or child is reported before anything is written.

use super::Store;
use crate::embedded::{ChildRecord, Parent};
use crate::error::{Error, Result};
use crate::id;
use chrono::{DateTime, Utc};

impl Store {
    /// Append a new child at the end of the parent's list.
    pub async fn add_child<P: Parent>(
        &self,
        parent_id: &str,
        input: <P::Child as ChildRecord>::Input,
    ) -> Result<P::Child> {
        let now = Utc::now();
        let child = <P::Child as ChildRecord>::from_input(id::generate(), input, now)?;
        let child_id = child.id().to_string();

        let parent = self
            .modify(parent_id, "add_child", |mut parent: P| {
                parent.children_mut().push(child);
                finish_parent(parent, now)
            })
            .await?;

        debug!(
            "✓ Added {} {} to {}/{}",
            <P::Child as ChildRecord>::kind(),
            child_id,
            P::collection(),
            parent_id
        );
        stored_child(&parent, &child_id)
    }

    /// Merge `patch` into one child in place.
    pub async fn update_child<P: Parent>(
        &self,
        parent_id: &str,
        child_id: &str,
        patch: <P::Child as ChildRecord>::Patch,
    ) -> Result<P::Child> {
        let now = Utc::now();
        let parent = self
            .modify(parent_id, "update_child", |mut parent: P| {
                parent
                    .children_mut()
                    .get_mut(child_id)
                    .ok_or_else(|| child_not_found::<P>(parent_id, child_id))?
                    .apply_patch(patch, now);
                finish_parent(parent, now)
            })
            .await?;

        debug!(
            "✓ Updated {} {} in {}/{}",
            <P::Child as ChildRecord>::kind(),
            child_id,
            P::collection(),
            parent_id
        );
        stored_child(&parent, child_id)
    }

    /// Remove one child, keeping the order of the rest.
    pub async fn remove_child<P: Parent>(&self, parent_id: &str, child_id: &str) -> Result<()> {
        let now = Utc::now();
        self.modify(parent_id, "remove_child", |mut parent: P| {
            parent
                .children_mut()
                .remove(child_id)
                .ok_or_else(|| child_not_found::<P>(parent_id, child_id))?;
            finish_parent(parent, now)
        })
        .await?;

        debug!(
            "✓ Removed {} {} from {}/{}",
            <P::Child as ChildRecord>::kind(),
            child_id,
            P::collection(),
            parent_id
        );
        Ok(())
    }

    pub async fn get_child<P: Parent>(&self, parent_id: &str, child_id: &str) -> Result<P::Child> {
        let parent: P = self.get(parent_id).await?;
        stored_child(&parent, child_id)
    }

    /// Children in insertion order.
    pub async fn list_children<P: Parent>(&self, parent_id: &str) -> Result<Vec<P::Child>> {
        let parent: P = self.get(parent_id).await?;
        Ok(parent.children().as_slice().to_vec())
    }
}

/// Stamp, re-derive if the children feed the parent, and validate.
fn finish_parent<P: Parent>(mut parent: P, now: DateTime<Utc>) -> Result<P> {
    parent.touch(now);
    if P::CHILDREN_FEED_DERIVATION {
        parent = parent.derive(now);
    }
    parent.validate()?;
    Ok(parent)
}

fn stored_child<P: Parent>(parent: &P, child_id: &str) -> Result<P::Child> {
    parent
        .children()
        .get(child_id)
        .cloned()
        .ok_or_else(|| child_not_found::<P>(parent.id(), child_id))
}

fn child_not_found<P: Parent>(parent_id: &str, child_id: &str) -> Error {
    Error::ChildNotFound {
        collection: P::collection().to_string(),
        parent_id: parent_id.to_string(),
        child: <P::Child as ChildRecord>::kind().to_string(),
        child_id: child_id.to_string(),
    }
}
