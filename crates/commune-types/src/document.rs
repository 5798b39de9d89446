//! The `Document` tagged variant and the collection-to-type mapping.
//!
//! Storage backends hand back untyped JSON per collection; [`Document::decode`]
//! is the one place that decides which record type interprets it.

use serde_json::Value;

use crate::collection::Collection;
use crate::error::{IdentityError, StorageError};
use crate::identity::{PartialId, Reference};
use crate::model::Model;
use crate::records::{
    EntryRequest, Guild, GuildStatistics, Metadata, Praise, Report, Resource, Suggestion, Ticket,
    User, Warning,
};

/// Any persisted record, tagged by its concrete type.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Metadata(Metadata),
    EntryRequest(EntryRequest),
    GuildStatistics(GuildStatistics),
    Guild(Guild),
    Praise(Praise),
    Report(Report),
    Resource(Resource),
    Suggestion(Suggestion),
    Ticket(Ticket),
    User(User),
    Warning(Warning),
}

/// Applies `$body` to the record inside any `Document` variant.
macro_rules! with_record {
    ($document:expr, $record:ident => $body:expr) => {
        match $document {
            Document::Metadata($record) => $body,
            Document::EntryRequest($record) => $body,
            Document::GuildStatistics($record) => $body,
            Document::Guild($record) => $body,
            Document::Praise($record) => $body,
            Document::Report($record) => $body,
            Document::Resource($record) => $body,
            Document::Suggestion($record) => $body,
            Document::Ticket($record) => $body,
            Document::User($record) => $body,
            Document::Warning($record) => $body,
        }
    };
}

fn decode_as<M: Model>(data: Value) -> Result<Document, StorageError> {
    serde_json::from_value::<M>(data)
        .map(M::into_document)
        .map_err(|e| StorageError::Decode {
            collection: M::COLLECTION,
            message: e.to_string(),
        })
}

impl Document {
    /// Interpret raw data read from `collection` as its record type.
    pub fn decode(collection: Collection, data: Value) -> Result<Self, StorageError> {
        match collection {
            Collection::Metadata => decode_as::<Metadata>(data),
            Collection::EntryRequests => decode_as::<EntryRequest>(data),
            Collection::GuildStatistics => decode_as::<GuildStatistics>(data),
            Collection::Guilds => decode_as::<Guild>(data),
            Collection::Praises => decode_as::<Praise>(data),
            Collection::Reports => decode_as::<Report>(data),
            Collection::Resources => decode_as::<Resource>(data),
            Collection::Suggestions => decode_as::<Suggestion>(data),
            Collection::Tickets => decode_as::<Ticket>(data),
            Collection::Users => decode_as::<User>(data),
            Collection::Warnings => decode_as::<Warning>(data),
        }
    }

    /// Decode and attach the backend reference in one step.
    pub fn decode_with_reference(
        collection: Collection,
        data: Value,
        reference: Option<Reference>,
    ) -> Result<Self, StorageError> {
        let mut document = Self::decode(collection, data)?;
        document.set_reference(reference);
        Ok(document)
    }

    pub fn collection(&self) -> Collection {
        match self {
            Document::Metadata(_) => Collection::Metadata,
            Document::EntryRequest(_) => Collection::EntryRequests,
            Document::GuildStatistics(_) => Collection::GuildStatistics,
            Document::Guild(_) => Collection::Guilds,
            Document::Praise(_) => Collection::Praises,
            Document::Report(_) => Collection::Reports,
            Document::Resource(_) => Collection::Resources,
            Document::Suggestion(_) => Collection::Suggestions,
            Document::Ticket(_) => Collection::Tickets,
            Document::User(_) => Collection::Users,
            Document::Warning(_) => Collection::Warnings,
        }
    }

    pub fn partial_id(&self) -> Result<PartialId, IdentityError> {
        with_record!(self, record => record.partial_id())
    }

    pub fn reference(&self) -> Option<&Reference> {
        with_record!(self, record => record.reference())
    }

    pub fn set_reference(&mut self, reference: Option<Reference>) {
        with_record!(self, record => record.set_reference(reference))
    }

    /// The record's data as JSON, without the backend reference.
    pub fn to_data(&self) -> Result<Value, StorageError> {
        let collection = self.collection();
        with_record!(self, record => serde_json::to_value(record)).map_err(|e| {
            StorageError::Decode {
                collection,
                message: e.to_string(),
            }
        })
    }
}
