use thiserror::Error;

use crate::collection::Collection;

/// Errors from building or parsing partial identifiers.
///
/// These never occur for identifiers produced by the record models; seeing
/// one means a caller assembled parts by hand and got them wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("invalid identifier part '{part}': {reason}")]
    InvalidIdentifier { part: String, reason: &'static str },

    #[error("malformed identifier '{partial_id}' for {collection}: expected {expected} parts, found {found}")]
    MalformedIdentifier {
        partial_id: String,
        collection: Collection,
        expected: usize,
        found: usize,
    },
}

/// Errors from the storage layer (adapters, sessions, store).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{backend} is missing required configuration: {}", keys.join(", "))]
    ConfigurationMissing {
        backend: &'static str,
        keys: Vec<String>,
    },

    #[error("{adapter} adapter is not ready")]
    NotReady { adapter: &'static str },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("unknown collection: '{0}'")]
    UnknownCollection(String),

    #[error("failed to decode {collection} document: {message}")]
    Decode {
        collection: Collection,
        message: String,
    },

    #[error("{collection} backend error: {message}")]
    Backend {
        collection: Collection,
        message: String,
    },

    #[error("database connection error: {0}")]
    Connection(String),
}

impl StorageError {
    pub fn backend(collection: Collection, message: impl std::fmt::Display) -> Self {
        StorageError::Backend {
            collection,
            message: message.to_string(),
        }
    }
}
