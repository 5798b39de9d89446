//! Session trait definition (port) and the shared session handle.
//!
//! A session performs the reads and writes of one logical operation against
//! the adapter that opened it. Sessions are only reachable through
//! `Store::with_session`, which releases them before returning.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use commune_types::collection::Collection;
use commune_types::document::Document;
use commune_types::error::StorageError;
use commune_types::identity::{PartialId, Reference};

/// How a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The operation succeeded; make its writes durable.
    Commit,
    /// The operation failed or panicked; drop pending writes where the
    /// backend supports it.
    Discard,
}

/// Unit of work against one backend.
///
/// Methods take `&self` so a session can be shared between the operation and
/// the scope that releases it.
pub trait Session: Send + Sync {
    fn get(
        &self,
        collection: Collection,
        partial_id: &PartialId,
    ) -> impl Future<Output = Result<Option<Document>, StorageError>> + Send;

    /// Every record in a collection.
    fn get_all(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Vec<Document>, StorageError>> + Send;

    /// Upsert a record. Returns the reference the backend assigned.
    fn store(
        &self,
        document: &Document,
    ) -> impl Future<Output = Result<Reference, StorageError>> + Send;

    fn delete(&self, document: &Document) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn release(&self, release: Release) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Keep the records of a collection read that decoded, logging and skipping
/// the rest. `key` names the stored record in the log line.
pub fn decoded_records<K: std::fmt::Display>(
    collection: Collection,
    records: impl IntoIterator<Item = (K, Result<Document, StorageError>)>,
) -> Vec<Document> {
    records
        .into_iter()
        .filter_map(|(key, decoded)| match decoded {
            Ok(document) => Some(document),
            Err(err) => {
                tracing::warn!(%collection, partial_id = %key, error = %err, "skipping undecodable record");
                None
            }
        })
        .collect()
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`Session`] with boxed futures.
pub trait SessionDyn: Send + Sync {
    fn get_boxed<'a>(
        &'a self,
        collection: Collection,
        partial_id: &'a PartialId,
    ) -> BoxFuture<'a, Result<Option<Document>, StorageError>>;

    fn get_all_boxed(&self, collection: Collection) -> BoxFuture<'_, Result<Vec<Document>, StorageError>>;

    fn store_boxed<'a>(&'a self, document: &'a Document) -> BoxFuture<'a, Result<Reference, StorageError>>;

    fn delete_boxed<'a>(&'a self, document: &'a Document) -> BoxFuture<'a, Result<(), StorageError>>;

    fn release_boxed(&self, release: Release) -> BoxFuture<'_, Result<(), StorageError>>;
}

impl<T: Session> SessionDyn for T {
    fn get_boxed<'a>(
        &'a self,
        collection: Collection,
        partial_id: &'a PartialId,
    ) -> BoxFuture<'a, Result<Option<Document>, StorageError>> {
        Box::pin(self.get(collection, partial_id))
    }

    fn get_all_boxed(&self, collection: Collection) -> BoxFuture<'_, Result<Vec<Document>, StorageError>> {
        Box::pin(self.get_all(collection))
    }

    fn store_boxed<'a>(&'a self, document: &'a Document) -> BoxFuture<'a, Result<Reference, StorageError>> {
        Box::pin(self.store(document))
    }

    fn delete_boxed<'a>(&'a self, document: &'a Document) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(self.delete(document))
    }

    fn release_boxed(&self, release: Release) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(self.release(release))
    }
}

/// Type-erased, cheaply cloneable session.
///
/// The handle passed to a `with_session` callback and the one the store keeps
/// for release point at the same session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<dyn SessionDyn>,
}

impl SessionHandle {
    pub fn new<S: Session + 'static>(session: S) -> Self {
        Self {
            inner: Arc::new(session),
        }
    }

    pub async fn get(
        &self,
        collection: Collection,
        partial_id: &PartialId,
    ) -> Result<Option<Document>, StorageError> {
        self.inner.get_boxed(collection, partial_id).await
    }

    pub async fn get_all(&self, collection: Collection) -> Result<Vec<Document>, StorageError> {
        self.inner.get_all_boxed(collection).await
    }

    pub async fn store(&self, document: &Document) -> Result<Reference, StorageError> {
        self.inner.store_boxed(document).await
    }

    pub async fn delete(&self, document: &Document) -> Result<(), StorageError> {
        self.inner.delete_boxed(document).await
    }

    pub(crate) async fn release(&self, release: Release) -> Result<(), StorageError> {
        self.inner.release_boxed(release).await
    }
}
