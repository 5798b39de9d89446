//! Record cache owned by the store.
//!
//! Backed by `DashMap`. Reads return clones so no guard outlives the call,
//! and no guard is ever held across `.await`.
//!
//! Flat collections are keyed `collection -> partialId`. Praises are indexed
//! twice (by author and by target) and warnings by target, mirroring the
//! lookups the application makes most often.

use std::collections::{BTreeMap, HashMap};

use commune_types::collection::Collection;
use commune_types::document::Document;
use commune_types::error::IdentityError;
use commune_types::identity::{self, PartialId};
use commune_types::records::{Praise, Warning};
use dashmap::DashMap;
use serde::Serialize;

type Index<R> = DashMap<String, BTreeMap<String, R>>;

/// Entry counts per collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: BTreeMap<Collection, usize>,
}

impl CacheStats {
    pub fn count(&self, collection: Collection) -> usize {
        self.entries.get(&collection).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.entries.values().sum()
    }
}

#[derive(Default)]
pub(crate) struct DocumentCache {
    flat: DashMap<Collection, HashMap<String, Document>>,
    praises_by_author: Index<Praise>,
    praises_by_target: Index<Praise>,
    warnings_by_target: Index<Warning>,
}

fn index_insert<R>(index: &Index<R>, key: &str, partial_id: &PartialId, record: R) {
    index
        .entry(key.to_string())
        .or_default()
        .insert(partial_id.to_string(), record);
}

fn index_remove<R>(index: &Index<R>, key: &str, partial_id: &PartialId) {
    if let Some(mut entries) = index.get_mut(key) {
        entries.remove(partial_id.as_str());
    }
    index.remove_if(key, |_, entries| entries.is_empty());
}

fn index_get<R: Clone>(index: &Index<R>, key: &str, partial_id: &PartialId) -> Option<R> {
    index
        .get(key)
        .and_then(|entries| entries.get(partial_id.as_str()).cloned())
}

fn index_values<R: Clone>(index: &Index<R>, key: &str) -> Vec<R> {
    index
        .get(key)
        .map(|entries| entries.values().cloned().collect())
        .unwrap_or_default()
}

fn index_len<R>(index: &Index<R>) -> usize {
    index.iter().map(|entry| entry.value().len()).sum()
}

impl DocumentCache {
    /// Insert or replace a record under its partial id.
    pub(crate) fn insert(&self, document: Document) -> Result<(), IdentityError> {
        let partial_id = document.partial_id()?;
        match document {
            Document::Praise(praise) => {
                let target = praise.target_id.clone();
                index_insert(&self.praises_by_author, &praise.author_id, &partial_id, praise.clone());
                index_insert(&self.praises_by_target, &target, &partial_id, praise);
            }
            Document::Warning(warning) => {
                let target = warning.target_id.clone();
                index_insert(&self.warnings_by_target, &target, &partial_id, warning);
            }
            flat @ (Document::Metadata(_)
            | Document::EntryRequest(_)
            | Document::GuildStatistics(_)
            | Document::Guild(_)
            | Document::Report(_)
            | Document::Resource(_)
            | Document::Suggestion(_)
            | Document::Ticket(_)
            | Document::User(_)) => {
                self.flat
                    .entry(flat.collection())
                    .or_default()
                    .insert(partial_id.into_string(), flat);
            }
        }
        Ok(())
    }

    pub(crate) fn remove(&self, document: &Document) -> Result<(), IdentityError> {
        let partial_id = document.partial_id()?;
        match document {
            Document::Praise(praise) => {
                index_remove(&self.praises_by_author, &praise.author_id, &partial_id);
                index_remove(&self.praises_by_target, &praise.target_id, &partial_id);
            }
            Document::Warning(warning) => {
                index_remove(&self.warnings_by_target, &warning.target_id, &partial_id);
            }
            Document::Metadata(_)
            | Document::EntryRequest(_)
            | Document::GuildStatistics(_)
            | Document::Guild(_)
            | Document::Report(_)
            | Document::Resource(_)
            | Document::Suggestion(_)
            | Document::Ticket(_)
            | Document::User(_) => {
                let collection = document.collection();
                if let Some(mut entries) = self.flat.get_mut(&collection) {
                    entries.remove(partial_id.as_str());
                }
                self.flat.remove_if(&collection, |_, entries| entries.is_empty());
            }
        }
        Ok(())
    }

    /// Look up a record of any collection by partial id. Praise and warning
    /// lookups derive the index key from the identifier itself.
    pub(crate) fn get(&self, collection: Collection, partial_id: &PartialId) -> Option<Document> {
        match collection {
            Collection::Praises => {
                let parts = identity::parse(partial_id.as_str(), collection).ok()?;
                index_get(&self.praises_by_author, &parts[0], partial_id).map(Document::Praise)
            }
            Collection::Warnings => {
                let parts = identity::parse(partial_id.as_str(), collection).ok()?;
                index_get(&self.warnings_by_target, &parts[1], partial_id).map(Document::Warning)
            }
            _ => self
                .flat
                .get(&collection)
                .and_then(|entries| entries.get(partial_id.as_str()).cloned()),
        }
    }

    pub(crate) fn praises_by_author(&self, author_id: &str) -> Vec<Praise> {
        index_values(&self.praises_by_author, author_id)
    }

    pub(crate) fn praises_by_target(&self, target_id: &str) -> Vec<Praise> {
        index_values(&self.praises_by_target, target_id)
    }

    pub(crate) fn warnings_by_target(&self, target_id: &str) -> Vec<Warning> {
        index_values(&self.warnings_by_target, target_id)
    }

    pub(crate) fn clear(&self) {
        self.flat.clear();
        self.praises_by_author.clear();
        self.praises_by_target.clear();
        self.warnings_by_target.clear();
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let entries = Collection::ALL
            .into_iter()
            .map(|collection| {
                let count = match collection {
                    Collection::Praises => index_len(&self.praises_by_author),
                    Collection::Warnings => index_len(&self.warnings_by_target),
                    _ => self.flat.get(&collection).map(|e| e.len()).unwrap_or(0),
                };
                (collection, count)
            })
            .collect();
        CacheStats { entries }
    }
}
