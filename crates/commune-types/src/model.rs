//! The `Model` trait implemented by every persisted record type.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::collection::Collection;
use crate::document::Document;
use crate::error::IdentityError;
use crate::identity::{self, PartialId, Reference};

/// A persisted record.
///
/// The record's data is its serde representation; the backend reference is
/// kept beside it and never serialised.
pub trait Model: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection this record type belongs to.
    const COLLECTION: Collection;

    /// Ordered identity parts. The length always equals the collection's arity.
    fn id_parts(&self) -> Vec<&str>;

    fn reference(&self) -> Option<&Reference>;

    fn set_reference(&mut self, reference: Option<Reference>);

    fn into_document(self) -> Document;

    /// Extract the record from a document of the matching variant.
    fn from_document(document: Document) -> Option<Self>;

    fn partial_id(&self) -> Result<PartialId, IdentityError> {
        identity::build(&self.id_parts())
    }
}

/// Implements [`Model`] for a record struct with a `reference` field.
macro_rules! impl_model {
    ($ty:ident, $collection:expr, $variant:ident, [$($part:ident),+ $(,)?]) => {
        impl $crate::model::Model for $ty {
            const COLLECTION: $crate::collection::Collection = $collection;

            fn id_parts(&self) -> Vec<&str> {
                vec![$(self.$part.as_str()),+]
            }

            fn reference(&self) -> Option<&$crate::identity::Reference> {
                self.reference.as_ref()
            }

            fn set_reference(&mut self, reference: Option<$crate::identity::Reference>) {
                self.reference = reference;
            }

            fn into_document(self) -> $crate::document::Document {
                $crate::document::Document::$variant(self)
            }

            fn from_document(document: $crate::document::Document) -> Option<Self> {
                match document {
                    $crate::document::Document::$variant(record) => Some(record),
                    _ => None,
                }
            }
        }
    };
}

pub(crate) use impl_model;
