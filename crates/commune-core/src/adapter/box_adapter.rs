//! BoxAdapter -- object-safe dynamic dispatch wrapper for Adapter.
//!
//! Same blanket-impl pattern as the session handle:
//! 1. Define an object-safe `AdapterDyn` trait with boxed futures
//! 2. Blanket-impl `AdapterDyn` for all `T: Adapter`
//! 3. `BoxAdapter` wraps `Box<dyn AdapterDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use commune_types::collection::Collection;
use commune_types::error::StorageError;
use commune_types::identity::{PartialId, Reference};
use serde_json::Value;

use super::{Adapter, AdapterState, Conventions};
use crate::session::SessionHandle;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`Adapter`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch (`dyn AdapterDyn`).
pub trait AdapterDyn: Send + Sync {
    fn name(&self) -> &'static str;

    fn state(&self) -> AdapterState;

    fn setup_boxed(&self) -> BoxFuture<'_, Result<(), StorageError>>;

    fn teardown_boxed(&self) -> BoxFuture<'_, Result<(), StorageError>>;

    fn conventions_for(
        &self,
        collection: Collection,
        partial_id: &PartialId,
        reference: Option<&Reference>,
        data: Value,
    ) -> Conventions;

    fn open_session_boxed(&self) -> BoxFuture<'_, Result<SessionHandle, StorageError>>;
}

impl<T: Adapter> AdapterDyn for T {
    fn name(&self) -> &'static str {
        Adapter::name(self)
    }

    fn state(&self) -> AdapterState {
        Adapter::state(self)
    }

    fn setup_boxed(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(self.setup())
    }

    fn teardown_boxed(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(self.teardown())
    }

    fn conventions_for(
        &self,
        collection: Collection,
        partial_id: &PartialId,
        reference: Option<&Reference>,
        data: Value,
    ) -> Conventions {
        Adapter::conventions_for(self, collection, partial_id, reference, data)
    }

    fn open_session_boxed(&self) -> BoxFuture<'_, Result<SessionHandle, StorageError>> {
        Box::pin(async move { self.open_session().await.map(SessionHandle::new) })
    }
}

/// Type-erased adapter for runtime backend selection.
///
/// Since `Adapter` uses RPITIT, it cannot be used as a trait object directly.
pub struct BoxAdapter {
    inner: Box<dyn AdapterDyn>,
}

impl BoxAdapter {
    pub fn new<T: Adapter + 'static>(adapter: T) -> Self {
        Self {
            inner: Box::new(adapter),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn state(&self) -> AdapterState {
        self.inner.state()
    }

    pub async fn setup(&self) -> Result<(), StorageError> {
        self.inner.setup_boxed().await
    }

    pub async fn teardown(&self) -> Result<(), StorageError> {
        self.inner.teardown_boxed().await
    }

    pub fn conventions_for(
        &self,
        collection: Collection,
        partial_id: &PartialId,
        reference: Option<&Reference>,
        data: Value,
    ) -> Conventions {
        self.inner.conventions_for(collection, partial_id, reference, data)
    }

    pub async fn open_session(&self) -> Result<SessionHandle, StorageError> {
        self.inner.open_session_boxed().await
    }
}

impl std::fmt::Debug for BoxAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxAdapter")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}
