//! In-memory adapter.
//!
//! The fallback used when no database is configured or reachable. Records
//! live in plain maps per collection and reads go through [`DocumentQuery`].
//! Nothing is written to disk: data lasts as long as the adapter instance.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use commune_types::collection::Collection;
use commune_types::document::Document;
use commune_types::error::StorageError;
use commune_types::identity::{PartialId, Reference};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::adapter::{Adapter, AdapterState, Conventions, Lifecycle};
use crate::query::{DocumentQuery, ID_PROPERTY};
use crate::session::{Release, Session, decoded_records};

struct StoredEntry {
    data: Value,
    reference: Reference,
}

type Tables = Arc<RwLock<HashMap<Collection, BTreeMap<String, StoredEntry>>>>;

/// Adapter keeping every record in process memory.
pub struct InMemoryAdapter {
    tables: Tables,
    lifecycle: Lifecycle<Tables>,
}

impl InMemoryAdapter {
    pub const NAME: &'static str = "in-memory";

    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            lifecycle: Lifecycle::new(Self::NAME),
        }
    }
}

#[cfg(test)]
impl InMemoryAdapter {
    /// Place raw data in a table, bypassing record encoding.
    pub(crate) async fn insert_raw(&self, collection: Collection, partial_id: &str, data: Value) {
        self.tables.write().await.entry(collection).or_default().insert(
            partial_id.to_string(),
            StoredEntry {
                data,
                reference: Reference(Uuid::now_v7().to_string()),
            },
        );
    }
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for InMemoryAdapter {
    type Session = InMemorySession;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    async fn setup(&self) -> Result<(), StorageError> {
        self.lifecycle.mark_ready(self.tables.clone())?;
        tracing::warn!("using in-memory storage; data will not survive a restart");
        Ok(())
    }

    async fn teardown(&self) -> Result<(), StorageError> {
        self.lifecycle.close().map(drop)
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

    async fn open_session(&self) -> Result<InMemorySession, StorageError> {
        Ok(InMemorySession {
            tables: self.lifecycle.connection()?,
        })
    }
}

/// Session over the in-memory tables. Writes apply immediately.
pub struct InMemorySession {
    tables: Tables,
}

fn decode_entry(collection: Collection, entry: &StoredEntry) -> Result<Document, StorageError> {
    Document::decode_with_reference(collection, entry.data.clone(), Some(entry.reference.clone()))
}

impl Session for InMemorySession {
    async fn get(
        &self,
        collection: Collection,
        partial_id: &PartialId,
    ) -> Result<Option<Document>, StorageError> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&collection) else {
            return Ok(None);
        };

        let hit = DocumentQuery::new(table.iter().map(|(id, entry)| (id.as_str(), &entry.data)))
            .where_equals(ID_PROPERTY, &Value::String(partial_id.to_string()))
            .execute()
            .into_iter()
            .next()
            .and_then(|(id, _)| table.get(id));

        hit.map(|entry| decode_entry(collection, entry)).transpose()
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>, StorageError> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&collection) else {
            return Ok(Vec::new());
        };

        let rows = DocumentQuery::new(table.iter().map(|(id, entry)| (id.as_str(), &entry.data)))
            .execute()
            .into_iter()
            .filter_map(|(id, _)| table.get(id).map(|entry| (id, decode_entry(collection, entry))));
        Ok(decoded_records(collection, rows))
    }

    async fn store(&self, document: &Document) -> Result<Reference, StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;
        let conventions =
            Conventions::plain(collection, &partial_id, document.to_data()?);
        let reference = Reference(Uuid::now_v7().to_string());

        self.tables.write().await.entry(collection).or_default().insert(
            conventions.document_id,
            StoredEntry {
                data: conventions.body,
                reference: reference.clone(),
            },
        );

        Ok(reference)
    }

    async fn delete(&self, document: &Document) -> Result<(), StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;
        if let Some(table) = self.tables.write().await.get_mut(&collection) {
            table.remove(partial_id.as_str());
        }
        Ok(())
    }

    async fn release(&self, _release: Release) -> Result<(), StorageError> {
        Ok(())
    }
}
