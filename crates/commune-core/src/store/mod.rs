//! The document store: the application's only entry point to persistence.
//!
//! `Store` owns the active adapter and the record cache. Every backend call
//! goes through [`Store::with_session`], which guarantees the session is
//! released on success, on error, and when the operation panics.
//!
//! Read helpers (`fetch`, `get_all`) log backend failures and report the
//! record as absent. Write helpers return the error and touch the cache only
//! after the backend confirmed the write.

mod cache;

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use commune_types::collection::Collection;
use commune_types::document::Document;
use commune_types::error::StorageError;
use commune_types::identity::PartialId;
use commune_types::model::Model;
use commune_types::records::{Praise, Warning};
use futures_util::FutureExt;

use crate::adapter::{AdapterState, BoxAdapter, Conventions};
use crate::session::{Release, SessionHandle};

pub use cache::CacheStats;

use cache::DocumentCache;

/// Options for [`Store::setup`].
#[derive(Debug, Clone, Copy)]
pub struct SetupOptions {
    /// Load the prefetched collections into the cache once connected.
    pub prefetch_documents: bool,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            prefetch_documents: true,
        }
    }
}

pub struct Store {
    adapter: BoxAdapter,
    cache: DocumentCache,
}

impl Store {
    pub fn new(adapter: BoxAdapter) -> Self {
        Self {
            adapter,
            cache: DocumentCache::default(),
        }
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    pub fn state(&self) -> AdapterState {
        self.adapter.state()
    }

    /// Connect the adapter and optionally warm the cache. Errors here are
    /// fatal to startup and are returned unchanged.
    pub async fn setup(&self, options: SetupOptions) -> Result<(), StorageError> {
        self.adapter.setup().await?;
        tracing::info!(adapter = self.adapter_name(), "storage adapter ready");

        if options.prefetch_documents {
            let documents = self
                .with_session(|session| async move {
                    let mut documents = Vec::new();
                    for collection in Collection::PREFETCHED {
                        documents.extend(session.get_all(collection).await?);
                    }
                    Ok(documents)
                })
                .await?;
            let count = documents.len();
            self.cache_documents(documents);
            tracing::info!(adapter = self.adapter_name(), count, "prefetched documents");
        }
        Ok(())
    }

    /// Close the adapter. The cache is left as is.
    pub async fn teardown(&self) -> Result<(), StorageError> {
        self.adapter.teardown().await?;
        tracing::info!(adapter = self.adapter_name(), "storage adapter closed");
        Ok(())
    }

    pub fn conventions_for(&self, document: &Document) -> Result<Conventions, StorageError> {
        let partial_id = document.partial_id()?;
        Ok(self.adapter.conventions_for(
            document.collection(),
            &partial_id,
            document.reference(),
            document.to_data()?,
        ))
    }

    /// Run `operation` with a fresh session and release it afterwards.
    ///
    /// The session is committed when the operation returns `Ok` and discarded
    /// when it returns `Err` or panics. A panic is resumed once the session
    /// has been released. A failed commit is returned in place of the
    /// operation's value.
    pub async fn with_session<F, Fut, T>(&self, operation: F) -> Result<T, StorageError>
    where
        F: FnOnce(SessionHandle) -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let session = self.adapter.open_session().await?;
        let handle = session.clone();
        let outcome = AssertUnwindSafe(async move { operation(handle).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => {
                session.release(Release::Commit).await?;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.discard(&session).await;
                Err(err)
            }
            Err(payload) => {
                self.discard(&session).await;
                panic::resume_unwind(payload)
            }
        }
    }

    async fn discard(&self, session: &SessionHandle) {
        if let Err(err) = session.release(Release::Discard).await {
            tracing::warn!(adapter = self.adapter_name(), error = %err, "failed to release session");
        }
    }

    pub fn cache_document(&self, document: Document) {
        let collection = document.collection();
        if let Err(err) = self.cache.insert(document) {
            tracing::warn!(%collection, error = %err, "document not cached");
        }
    }

    pub fn cache_documents(&self, documents: impl IntoIterator<Item = Document>) {
        for document in documents {
            self.cache_document(document);
        }
    }

    pub fn unload_document(&self, document: &Document) {
        if let Err(err) = self.cache.remove(document) {
            tracing::warn!(collection = %document.collection(), error = %err, "document not unloaded");
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::debug!(adapter = self.adapter_name(), "cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // -- typed cache reads -------------------------------------------------

    /// Cached record only; never reaches the backend.
    pub fn cached<M: Model>(&self, partial_id: &PartialId) -> Option<M> {
        self.cache
            .get(M::COLLECTION, partial_id)
            .and_then(M::from_document)
    }

    pub fn praises_by_author(&self, author_id: &str) -> Vec<Praise> {
        self.cache.praises_by_author(author_id)
    }

    pub fn praises_by_target(&self, target_id: &str) -> Vec<Praise> {
        self.cache.praises_by_target(target_id)
    }

    pub fn warnings_by_target(&self, target_id: &str) -> Vec<Warning> {
        self.cache.warnings_by_target(target_id)
    }

    // -- untyped operations ------------------------------------------------

    /// Cache hit, else a backend read that populates the cache. Backend
    /// failures are logged and reported as absent.
    pub async fn fetch_document(
        &self,
        collection: Collection,
        partial_id: &PartialId,
    ) -> Option<Document> {
        self.try_fetch_document(collection, partial_id)
            .await
            .unwrap_or_else(|err| {
                tracing::error!(%collection, %partial_id, error = %err, "failed to fetch document");
                None
            })
    }

    /// Like [`Store::fetch_document`], but a failed read is an error rather
    /// than an absent record.
    async fn try_fetch_document(
        &self,
        collection: Collection,
        partial_id: &PartialId,
    ) -> Result<Option<Document>, StorageError> {
        if let Some(hit) = self.cache.get(collection, partial_id) {
            return Ok(Some(hit));
        }

        let fetched = self
            .with_session(|session| async move { session.get(collection, partial_id).await })
            .await?;
        if let Some(document) = &fetched {
            self.cache_document(document.clone());
        }
        Ok(fetched)
    }

    /// Load and cache a whole collection.
    pub async fn get_all_documents(&self, collection: Collection) -> Vec<Document> {
        let result = self
            .with_session(|session| async move { session.get_all(collection).await })
            .await;

        match result {
            Ok(documents) => {
                self.cache_documents(documents.iter().cloned());
                documents
            }
            Err(err) => {
                tracing::error!(%collection, error = %err, "failed to load collection");
                Vec::new()
            }
        }
    }

    /// Store a record and cache it with its new reference.
    pub async fn store_document(&self, mut document: Document) -> Result<Document, StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;

        let written = document.clone();
        let reference = self
            .with_session(|session| async move { session.store(&written).await })
            .await
            .inspect_err(|err| {
                tracing::error!(%collection, %partial_id, error = %err, "failed to store document");
            })?;

        tracing::debug!(%collection, %partial_id, %reference, "document stored");
        document.set_reference(Some(reference));
        self.cache_document(document.clone());
        Ok(document)
    }

    /// Delete a record from the backend, then from the cache.
    pub async fn delete_document(&self, document: &Document) -> Result<(), StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;

        self.with_session(|session| async move { session.delete(document).await })
            .await
            .inspect_err(|err| {
                tracing::error!(%collection, %partial_id, error = %err, "failed to delete document");
            })?;

        tracing::debug!(%collection, %partial_id, "document deleted");
        self.unload_document(document);
        Ok(())
    }

    // -- typed operations --------------------------------------------------

    pub async fn fetch<M: Model>(&self, partial_id: &PartialId) -> Option<M> {
        self.fetch_document(M::COLLECTION, partial_id)
            .await
            .and_then(M::from_document)
    }

    pub async fn get_all<M: Model>(&self) -> Vec<M> {
        self.get_all_documents(M::COLLECTION)
            .await
            .into_iter()
            .filter_map(M::from_document)
            .collect()
    }

    /// Return the stored record with `record`'s partial id, creating it from
    /// `record` when absent. A failed read is returned as is and nothing is
    /// written. Not atomic: concurrent callers may both create.
    pub async fn get_or_create<M: Model>(&self, record: M) -> Result<M, StorageError> {
        let partial_id = record.partial_id()?;
        let existing = self
            .try_fetch_document(M::COLLECTION, &partial_id)
            .await
            .inspect_err(|err| {
                tracing::error!(collection = %M::COLLECTION, %partial_id, error = %err, "failed to read before create");
            })?;
        match existing.and_then(M::from_document) {
            Some(existing) => Ok(existing),
            None => self.create(record).await,
        }
    }

    pub async fn create<M: Model>(&self, record: M) -> Result<M, StorageError> {
        self.write(record).await
    }

    pub async fn update<M: Model>(&self, record: M) -> Result<M, StorageError> {
        self.write(record).await
    }

    pub async fn delete<M: Model>(&self, record: &M) -> Result<(), StorageError> {
        self.delete_document(&record.clone().into_document()).await
    }

    async fn write<M: Model>(&self, mut record: M) -> Result<M, StorageError> {
        let stored = self.store_document(record.clone().into_document()).await?;
        record.set_reference(stored.reference().cloned());
        Ok(record)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("adapter", &self.adapter)
            .field("cached", &self.cache.stats().total())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::adapter::Adapter;
    use crate::memory::InMemoryAdapter;
    use crate::session::Session;
    use commune_types::identity::Reference;
    use commune_types::records::{Resource, Ticket, TicketKind, User};
    use serde_json::Value;

    async fn memory_store() -> Store {
        let store = Store::new(BoxAdapter::new(InMemoryAdapter::new()));
        store.setup(SetupOptions::default()).await.unwrap();
        store
    }

    // -- Mock adapter recording how sessions end ---------------------------

    #[derive(Default)]
    struct RecordingAdapter {
        releases: Arc<Mutex<Vec<Release>>>,
        seeded: Vec<Document>,
        fail_reads: bool,
        fail_writes: bool,
        fail_commit: bool,
    }

    struct RecordingSession {
        releases: Arc<Mutex<Vec<Release>>>,
        seeded: Vec<Document>,
        fail_reads: bool,
        fail_writes: bool,
        fail_commit: bool,
    }

    impl Adapter for RecordingAdapter {
        type Session = RecordingSession;

        fn name(&self) -> &'static str {
            "recording"
        }

        fn state(&self) -> AdapterState {
            AdapterState::Ready
        }

        async fn setup(&self) -> Result<(), StorageError> {
            Ok(())
        }

        async fn teardown(&self) -> Result<(), StorageError> {
            Ok(())
        }

        fn conventions_for(
            &self,
            collection: Collection,
            partial_id: &PartialId,
            _reference: Option<&Reference>,
            data: Value,
        ) -> Conventions {
            Conventions::plain(collection, partial_id, data)
        }

        async fn open_session(&self) -> Result<RecordingSession, StorageError> {
            Ok(RecordingSession {
                releases: self.releases.clone(),
                seeded: self.seeded.clone(),
                fail_reads: self.fail_reads,
                fail_writes: self.fail_writes,
                fail_commit: self.fail_commit,
            })
        }
    }

    impl Session for RecordingSession {
        async fn get(
            &self,
            collection: Collection,
            _partial_id: &PartialId,
        ) -> Result<Option<Document>, StorageError> {
            Err(StorageError::backend(collection, "unreachable"))
        }

        async fn get_all(&self, collection: Collection) -> Result<Vec<Document>, StorageError> {
            if self.fail_reads {
                return Err(StorageError::backend(collection, "read refused"));
            }
            Ok(self
                .seeded
                .iter()
                .filter(|document| document.collection() == collection)
                .cloned()
                .collect())
        }

        async fn store(&self, document: &Document) -> Result<Reference, StorageError> {
            if self.fail_writes {
                return Err(StorageError::backend(document.collection(), "write refused"));
            }
            Ok(Reference("1".to_string()))
        }

        async fn delete(&self, _document: &Document) -> Result<(), StorageError> {
            Ok(())
        }

        async fn release(&self, release: Release) -> Result<(), StorageError> {
            self.releases.lock().unwrap().push(release);
            if self.fail_commit && release == Release::Commit {
                return Err(StorageError::Connection("commit failed".to_string()));
            }
            Ok(())
        }
    }

    fn recording_store(adapter: RecordingAdapter) -> (Store, Arc<Mutex<Vec<Release>>>) {
        let releases = adapter.releases.clone();
        (Store::new(BoxAdapter::new(adapter)), releases)
    }

    // -- with_session ------------------------------------------------------

    #[tokio::test]
    async fn test_with_session_commits_on_success() {
        let (store, releases) = recording_store(RecordingAdapter::default());
        let value = store.with_session(|_| async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(*releases.lock().unwrap(), vec![Release::Commit]);
    }

    #[tokio::test]
    async fn test_with_session_discards_on_error() {
        let (store, releases) = recording_store(RecordingAdapter::default());
        let result: Result<(), _> = store
            .with_session(|_| async { Err(StorageError::Connection("boom".to_string())) })
            .await;
        assert!(result.is_err());
        assert_eq!(*releases.lock().unwrap(), vec![Release::Discard]);
    }

    #[tokio::test]
    async fn test_with_session_releases_on_panic() {
        let (store, releases) = recording_store(RecordingAdapter::default());
        let outcome = AssertUnwindSafe(store.with_session(|_| async {
            if releases.lock().unwrap().is_empty() {
                panic!("operation panicked");
            }
            Ok(())
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert_eq!(*releases.lock().unwrap(), vec![Release::Discard]);
    }

    #[tokio::test]
    async fn test_failed_commit_is_reported() {
        let (store, _) = recording_store(RecordingAdapter {
            fail_commit: true,
            ..Default::default()
        });
        let result = store.create(User::new("u1")).await;
        assert!(matches!(result, Err(StorageError::Connection(_))));
        assert!(store.cached::<User>(&User::new("u1").partial_id().unwrap()).is_none());
    }

    // -- read and write helpers -------------------------------------------

    #[tokio::test]
    async fn test_fetch_logs_backend_failure_and_returns_none() {
        let (store, _) = recording_store(RecordingAdapter::default());
        let id = User::new("u1").partial_id().unwrap();
        assert!(store.fetch::<User>(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_create_does_not_write_when_read_fails() {
        let (store, releases) = recording_store(RecordingAdapter::default());
        let result = store.get_or_create(User::new("u1")).await;

        assert!(matches!(result, Err(StorageError::Backend { .. })));
        assert_eq!(*releases.lock().unwrap(), vec![Release::Discard]);
        assert_eq!(store.cache_stats().total(), 0);
    }

    #[tokio::test]
    async fn test_get_all_read_failure_returns_empty() {
        let (store, releases) = recording_store(RecordingAdapter {
            fail_reads: true,
            seeded: vec![Resource::new("g", "a", "https://x").into_document()],
            ..Default::default()
        });
        assert!(store.get_all::<Resource>().await.is_empty());
        assert_eq!(*releases.lock().unwrap(), vec![Release::Discard]);
        assert_eq!(store.cache_stats().total(), 0);
    }

    #[tokio::test]
    async fn test_setup_returns_prefetch_read_failure() {
        let (store, releases) = recording_store(RecordingAdapter {
            fail_reads: true,
            ..Default::default()
        });
        let result = store.setup(SetupOptions::default()).await;
        assert!(matches!(
            result,
            Err(StorageError::Backend { collection: Collection::EntryRequests, .. })
        ));
        assert_eq!(*releases.lock().unwrap(), vec![Release::Discard]);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let (store, _) = recording_store(RecordingAdapter {
            fail_writes: true,
            ..Default::default()
        });
        let user = User::new("u1");
        assert!(store.create(user.clone()).await.is_err());
        assert_eq!(store.cache_stats().total(), 0);
    }

    #[tokio::test]
    async fn test_create_clear_fetch_in_memory() {
        let store = memory_store().await;
        let resource = Resource::new("g1", "a1", "https://docs.rs");
        let created = store.create(resource.clone()).await.unwrap();
        assert!(created.reference.is_some());

        store.clear_cache();
        let id = resource.partial_id().unwrap();
        assert!(store.cached::<Resource>(&id).is_none());

        let fetched = store.fetch::<Resource>(&id).await.unwrap();
        assert_eq!(fetched.guild_id, "g1");
        assert_eq!(fetched.author_id, "a1");
        assert_eq!(fetched.created_at, resource.created_at);
        assert_eq!(fetched.url, "https://docs.rs");
        assert_eq!(fetched.reference, created.reference);

        // Now served from the cache.
        assert!(store.cached::<Resource>(&id).is_some());
    }

    #[tokio::test]
    async fn test_resources_with_distinct_created_at_coexist() {
        let store = memory_store().await;
        let mut first = Resource::new("g1", "a1", "https://one");
        first.created_at = "1000".to_string();
        let mut second = Resource::new("g1", "a1", "https://two");
        second.created_at = "2000".to_string();

        let first_id = first.partial_id().unwrap();
        let second_id = second.partial_id().unwrap();
        assert_ne!(first_id, second_id);

        store.create(first).await.unwrap();
        store.create(second).await.unwrap();
        store.clear_cache();

        assert_eq!(store.fetch::<Resource>(&first_id).await.unwrap().url, "https://one");
        assert_eq!(store.fetch::<Resource>(&second_id).await.unwrap().url, "https://two");
        assert_eq!(store.get_all::<Resource>().await.len(), 2);
    }

    #[tokio::test]
    async fn test_update_visible_through_cache() {
        let store = memory_store().await;
        let mut ticket = store
            .create(Ticket {
                guild_id: "g1".to_string(),
                author_id: "a1".to_string(),
                channel_id: "c1".to_string(),
                topic: "help".to_string(),
                kind: TicketKind::Support,
                is_resolved: false,
                reference: None,
            })
            .await
            .unwrap();
        let first_reference = ticket.reference.clone();

        ticket.is_resolved = true;
        let updated = store.update(ticket.clone()).await.unwrap();
        assert_ne!(updated.reference, first_reference);

        let cached = store.cached::<Ticket>(&ticket.partial_id().unwrap()).unwrap();
        assert!(cached.is_resolved);
    }

    #[tokio::test]
    async fn test_get_or_create_returns_existing() {
        let store = memory_store().await;
        let mut user = User::new("u1");
        user.language = Some("nl".to_string());
        store.create(user).await.unwrap();

        let found = store.get_or_create(User::new("u1")).await.unwrap();
        assert_eq!(found.language.as_deref(), Some("nl"));
    }

    #[tokio::test]
    async fn test_delete_praise_unloads_both_indices() {
        let store = memory_store().await;
        let praise = store.create(Praise::new("a1", "t1", None)).await.unwrap();
        assert_eq!(store.praises_by_author("a1").len(), 1);
        assert_eq!(store.praises_by_target("t1").len(), 1);

        store.delete(&praise).await.unwrap();
        assert!(store.praises_by_author("a1").is_empty());
        assert!(store.praises_by_target("t1").is_empty());
        assert!(store.fetch::<Praise>(&praise.partial_id().unwrap()).await.is_none());
    }

    #[tokio::test]
    async fn test_warnings_by_target() {
        let store = memory_store().await;
        store.create(Warning::new("m1", "t1", "spam")).await.unwrap();
        assert_eq!(store.warnings_by_target("t1").len(), 1);
        assert!(store.warnings_by_target("m1").is_empty());
    }

    #[tokio::test]
    async fn test_setup_prefetches_into_cache() {
        let resource = Resource::new("g", "a", "https://x");
        let (store, _) = recording_store(RecordingAdapter {
            seeded: vec![
                resource.clone().into_document(),
                User::new("u1").into_document(),
            ],
            ..Default::default()
        });
        store.setup(SetupOptions::default()).await.unwrap();

        let stats = store.cache_stats();
        assert_eq!(stats.count(Collection::Resources), 1);
        // Users are not part of the prefetched set.
        assert_eq!(stats.count(Collection::Users), 0);
        assert!(store.cached::<Resource>(&resource.partial_id().unwrap()).is_some());
    }

    async fn store_with_one_bad_resource() -> (Store, Resource) {
        let adapter = InMemoryAdapter::new();
        let valid = Resource::new("g1", "a1", "https://valid");
        adapter
            .insert_raw(
                Collection::Resources,
                valid.partial_id().unwrap().as_str(),
                serde_json::to_value(&valid).unwrap(),
            )
            .await;
        adapter
            .insert_raw(
                Collection::Resources,
                "g1/a1/1",
                serde_json::json!({"guildId": "g1", "authorId": "a1", "createdAt": "1"}),
            )
            .await;
        (Store::new(BoxAdapter::new(adapter)), valid)
    }

    #[tokio::test]
    async fn test_prefetch_skips_undecodable_record() {
        let (store, valid) = store_with_one_bad_resource().await;
        store.setup(SetupOptions::default()).await.unwrap();

        assert_eq!(store.cache_stats().count(Collection::Resources), 1);
        assert!(store.cached::<Resource>(&valid.partial_id().unwrap()).is_some());
    }

    #[tokio::test]
    async fn test_get_all_keeps_decodable_records() {
        let (store, valid) = store_with_one_bad_resource().await;
        store
            .setup(SetupOptions {
                prefetch_documents: false,
            })
            .await
            .unwrap();

        let resources = store.get_all::<Resource>().await;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].url, valid.url);
    }

    #[tokio::test]
    async fn test_setup_without_prefetch_leaves_cache_empty() {
        let (store, releases) = recording_store(RecordingAdapter {
            seeded: vec![Resource::new("g", "a", "https://x").into_document()],
            ..Default::default()
        });
        store
            .setup(SetupOptions {
                prefetch_documents: false,
            })
            .await
            .unwrap();
        assert_eq!(store.cache_stats().total(), 0);
        assert!(releases.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_operations_after_teardown_are_not_ready() {
        let store = memory_store().await;
        store.teardown().await.unwrap();
        assert_eq!(store.state(), AdapterState::Closed);

        let result = store.create(User::new("u1")).await;
        assert!(matches!(result, Err(StorageError::NotReady { .. })));
    }

    #[tokio::test]
    async fn test_conventions_pass_through() {
        let store = memory_store().await;
        let conventions = store.conventions_for(&User::new("u1").into_document()).unwrap();
        assert_eq!(conventions.collection, Collection::Users);
        assert_eq!(conventions.document_id, "u1");
        assert_eq!(conventions.body["userId"], "u1");
    }
}
