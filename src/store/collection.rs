use super::Store;
use crate::embedded::{ChildRecord, Parent};
use crate::error::Result;
use crate::model::Document;
use crate::page::{Page, PageRequest};
use std::marker::PhantomData;

/// Typed handle bound to one collection of a [`Store`].
///
/// ```no_run
/// # use crm_store::{Store, PageRequest};
/// # use crm_store::model::InvoiceFilter;
/// # async fn example(store: Store) -> crm_store::Result<()> {
/// let page = store
///     .invoices()
///     .list(&InvoiceFilter::default(), PageRequest::default())
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Collection<'a, T> {
    store: &'a Store,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> Clone for Collection<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for Collection<'a, T> {}

impl<'a, T: Document> Collection<'a, T> {
    pub(super) fn new(store: &'a Store) -> Self {
        Collection {
            store,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        T::collection()
    }

    pub async fn list(&self, filter: &T::Filter, page: PageRequest) -> Result<Page<T>> {
        self.store.list::<T>(filter, page).await
    }

    /// Like [`list`](Self::list), with each item rendered as its view.
    pub async fn list_views(
        &self,
        filter: &T::Filter,
        page: PageRequest,
    ) -> Result<Page<T::View>> {
        let now = chrono::Utc::now();
        Ok(self.store.list::<T>(filter, page).await?.map(|d| d.view(now)))
    }

    pub async fn create(&self, input: T::Input) -> Result<T> {
        self.store.create(input).await
    }

    pub async fn get(&self, id: &str) -> Result<T> {
        self.store.get(id).await
    }

    pub async fn get_view(&self, id: &str) -> Result<T::View> {
        self.store.get_view::<T>(id).await
    }

    pub async fn update(&self, id: &str, patch: T::Patch) -> Result<T> {
        self.store.update(id, patch).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete::<T>(id).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count::<T>().await
    }
}

impl<'a, P: Parent> Collection<'a, P> {
    pub async fn add_child(
        &self,
        parent_id: &str,
        input: <P::Child as ChildRecord>::Input,
    ) -> Result<P::Child> {
        self.store.add_child::<P>(parent_id, input).await
    }

    pub async fn update_child(
        &self,
        parent_id: &str,
        child_id: &str,
        patch: <P::Child as ChildRecord>::Patch,
    ) -> Result<P::Child> {
        self.store.update_child::<P>(parent_id, child_id, patch).await
    }

    pub async fn remove_child(&self, parent_id: &str, child_id: &str) -> Result<()> {
        self.store.remove_child::<P>(parent_id, child_id).await
    }

    pub async fn get_child(&self, parent_id: &str, child_id: &str) -> Result<P::Child> {
        self.store.get_child::<P>(parent_id, child_id).await
    }

    pub async fn list_children(&self, parent_id: &str) -> Result<Vec<P::Child>> {
        self.store.list_children::<P>(parent_id).await
    }
}
