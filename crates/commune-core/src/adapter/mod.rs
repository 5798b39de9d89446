//! Adapter trait definition (port).
//!
//! An adapter wraps one storage engine: it owns the connection lifecycle and
//! hands out sessions bound to the live connection. Implementations live in
//! `commune-infra` (network backends) and in [`crate::memory`] (fallback).

pub mod box_adapter;
pub mod lifecycle;

use commune_types::collection::Collection;
use commune_types::error::StorageError;
use commune_types::identity::{PartialId, Reference};
use serde_json::Value;

use crate::session::Session;

pub use box_adapter::BoxAdapter;
pub use lifecycle::{AdapterState, Lifecycle};

/// Backend-native shape of one write.
///
/// Produced per write by [`Adapter::conventions_for`] and dropped afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Conventions {
    pub collection: Collection,
    pub partial_id: PartialId,
    /// Identifier the backend addresses the document by.
    pub document_id: String,
    /// Body to send, with identity fields set or suppressed for the backend.
    pub body: Value,
}

impl Conventions {
    /// Conventions that store the data unchanged under its partial id.
    pub fn plain(collection: Collection, partial_id: &PartialId, data: Value) -> Self {
        Self {
            collection,
            partial_id: partial_id.clone(),
            document_id: partial_id.to_string(),
            body: data,
        }
    }

    /// `collection/partialId`, for backends that keep every collection in
    /// one keyspace.
    pub fn qualified_id(collection: Collection, partial_id: &PartialId) -> String {
        format!("{}/{}", collection.name(), partial_id)
    }
}

/// Remove backend bookkeeping fields from a document body read back from
/// storage, leaving only the record's own data.
pub fn strip_fields(mut body: Value, fields: &[&str]) -> Value {
    if let Value::Object(map) = &mut body {
        for field in fields {
            map.remove(*field);
        }
    }
    body
}

/// Trait for storage backends.
///
/// `setup` must succeed exactly once before any session is opened; after
/// `teardown` every new session fails with `NotReady`.
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait Adapter: Send + Sync {
    type Session: Session + 'static;

    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;

    fn state(&self) -> AdapterState;

    /// Connect, and provision any missing collections for backends that
    /// need them declared up front.
    fn setup(&self) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Release the connection.
    fn teardown(&self) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Translate a record's identity and data into this backend's write shape.
    fn conventions_for(
        &self,
        collection: Collection,
        partial_id: &PartialId,
        reference: Option<&Reference>,
        data: Value,
    ) -> Conventions;

    /// Open a unit of work on the live connection.
    fn open_session(
        &self,
    ) -> impl std::future::Future<Output = Result<Self::Session, StorageError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use commune_types::identity;
    use serde_json::json;

    #[test]
    fn test_plain_conventions_keep_data() {
        let id = identity::build(&["g", "a", "1"]).unwrap();
        let conventions = Conventions::plain(Collection::Resources, &id, json!({"url": "x"}));
        assert_eq!(conventions.document_id, "g/a/1");
        assert_eq!(conventions.body, json!({"url": "x"}));
    }

    #[test]
    fn test_qualified_id() {
        let id = identity::build(&["u1"]).unwrap();
        assert_eq!(Conventions::qualified_id(Collection::Users, &id), "users/u1");
    }

    #[test]
    fn test_strip_fields() {
        let body = json!({"_id": "x", "_rev": "1-a", "userId": "u1"});
        assert_eq!(strip_fields(body, &["_id", "_rev"]), json!({"userId": "u1"}));
    }
}
