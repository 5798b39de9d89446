//! MongoDB adapter.
//!
//! One MongoDB collection per [`Collection`]. Records are addressed by a
//! `partialId` field; `_id` is an `ObjectId` assigned by the server on first
//! insert and serves as the record's reference.

use commune_core::adapter::{Adapter, AdapterState, Conventions, Lifecycle};
use commune_core::session::{Release, Session, decoded_records};
use commune_types::collection::Collection;
use commune_types::config::{BackendSettings, DatabaseSolution};
use commune_types::document::Document;
use commune_types::error::StorageError;
use commune_types::identity::{PartialId, Reference};
use futures_util::TryStreamExt;
use mongodb::bson::{self, Bson, Document as BsonDocument, doc};
use mongodb::options::{ClientOptions, Credential, ReturnDocument};
use mongodb::{Client, Database};
use serde_json::Value;

use crate::endpoint::{Endpoint, log_unavailable};

/// Field holding the record's partial identifier.
const PARTIAL_ID_FIELD: &str = "partialId";

#[derive(Clone)]
struct Connection {
    client: Client,
    database: Database,
}

pub struct MongoAdapter {
    endpoint: Endpoint,
    lifecycle: Lifecycle<Connection>,
}

impl MongoAdapter {
    pub const NAME: &'static str = "mongodb";

    /// Build an adapter when host, port and database are configured.
    pub fn try_create(settings: &BackendSettings) -> Option<Self> {
        let endpoint = log_unavailable(
            DatabaseSolution::Mongodb,
            Endpoint::resolve(DatabaseSolution::Mongodb, settings),
        )?;
        Some(Self {
            endpoint,
            lifecycle: Lifecycle::new(Self::NAME),
        })
    }

    async fn connect(&self) -> Result<Connection, mongodb::error::Error> {
        let uri = format!("mongodb://{}:{}", self.endpoint.host, self.endpoint.port);
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some("commune".to_string());
        if let Some((username, password)) = self.endpoint.credentials() {
            options.credential = Some(
                Credential::builder()
                    .username(username.to_string())
                    .password(password.to_string())
                    .build(),
            );
        }

        let client = Client::with_options(options)?;
        let database = client.database(&self.endpoint.database);
        database.run_command(doc! { "ping": 1 }).await?;
        Ok(Connection { client, database })
    }

    /// Create every collection the server does not know yet.
    async fn provision(database: &Database) -> Result<usize, mongodb::error::Error> {
        let existing = database.list_collection_names().await?;
        let mut created = 0;
        for collection in Collection::ALL {
            if !existing.iter().any(|name| name == collection.name()) {
                database.create_collection(collection.name()).await?;
                created += 1;
            }
        }
        Ok(created)
    }
}

fn by_partial_id(partial_id: &PartialId) -> BsonDocument {
    let mut filter = BsonDocument::new();
    filter.insert(PARTIAL_ID_FIELD, partial_id.as_str());
    filter
}

fn connection_error(err: mongodb::error::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

/// MongoDB body for a record: its data plus the `partialId` field. `_id`
/// stays server-assigned and is never part of the body.
fn mongo_conventions(collection: Collection, partial_id: &PartialId, data: Value) -> Conventions {
    let mut body = data;
    if let Value::Object(map) = &mut body {
        map.insert(PARTIAL_ID_FIELD.to_string(), Value::String(partial_id.to_string()));
    }
    Conventions {
        collection,
        partial_id: partial_id.clone(),
        document_id: partial_id.to_string(),
        body,
    }
}

/// Turn a stored MongoDB document back into a record.
fn decode(collection: Collection, mut stored: BsonDocument) -> Result<Document, StorageError> {
    let reference = stored
        .get_object_id("_id")
        .ok()
        .map(|id| Reference(id.to_hex()));
    stored.remove("_id");
    stored.remove(PARTIAL_ID_FIELD);
    let data = Bson::Document(stored).into_relaxed_extjson();
    Document::decode_with_reference(collection, data, reference)
}

impl Adapter for MongoAdapter {
    type Session = MongoSession;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    async fn setup(&self) -> Result<(), StorageError> {
        self.lifecycle.ensure_uninitialised()?;
        let connection = self.connect().await.map_err(connection_error)?;
        let created = Self::provision(&connection.database)
            .await
            .map_err(connection_error)?;
        tracing::info!(adapter = Self::NAME, created, "collections provisioned");
        self.lifecycle.mark_ready(connection)
    }

    async fn teardown(&self) -> Result<(), StorageError> {
        let connection = self.lifecycle.close()?;
        connection.client.shutdown().await;
        Ok(())
    }

    fn conventions_for(
        &self,
        collection: Collection,
        partial_id: &PartialId,
        _reference: Option<&Reference>,
        data: Value,
    ) -> Conventions {
        mongo_conventions(collection, partial_id, data)
    }

    async fn open_session(&self) -> Result<MongoSession, StorageError> {
        Ok(MongoSession {
            database: self.lifecycle.connection()?.database,
        })
    }
}

/// Session over a MongoDB database handle. Each write is applied
/// immediately; a standalone server offers no transaction to roll back.
pub struct MongoSession {
    database: Database,
}

impl MongoSession {
    fn collection(&self, collection: Collection) -> mongodb::Collection<BsonDocument> {
        self.database.collection(collection.name())
    }
}

impl Session for MongoSession {
    async fn get(
        &self,
        collection: Collection,
        partial_id: &PartialId,
    ) -> Result<Option<Document>, StorageError> {
        self.collection(collection)
            .find_one(by_partial_id(partial_id))
            .await
            .map_err(|e| StorageError::backend(collection, e))?
            .map(|stored| decode(collection, stored))
            .transpose()
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>, StorageError> {
        let stored: Vec<BsonDocument> = self
            .collection(collection)
            .find(doc! {})
            .await
            .map_err(|e| StorageError::backend(collection, e))?
            .try_collect()
            .await
            .map_err(|e| StorageError::backend(collection, e))?;

        let rows = stored.into_iter().map(|stored| {
            let key = stored.get_str(PARTIAL_ID_FIELD).unwrap_or("?").to_string();
            (key, decode(collection, stored))
        });
        Ok(decoded_records(collection, rows))
    }

    async fn store(&self, document: &Document) -> Result<Reference, StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;
        let conventions = mongo_conventions(collection, &partial_id, document.to_data()?);
        let replacement =
            bson::to_document(&conventions.body).map_err(|e| StorageError::backend(collection, e))?;

        let stored = self
            .collection(collection)
            .find_one_and_replace(by_partial_id(&partial_id), replacement)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| StorageError::backend(collection, e))?;

        stored
            .and_then(|stored| stored.get_object_id("_id").ok())
            .map(|id| Reference(id.to_hex()))
            .ok_or_else(|| StorageError::backend(collection, "upsert returned no document id"))
    }

    async fn delete(&self, document: &Document) -> Result<(), StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;
        self.collection(collection)
            .delete_one(by_partial_id(&partial_id))
            .await
            .map_err(|e| StorageError::backend(collection, e))?;
        Ok(())
    }

    async fn release(&self, _release: Release) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commune_types::identity;
    use mongodb::bson::oid::ObjectId;
    use commune_types::model::Model;
    use commune_types::records::User;
    use serde_json::json;

    fn complete_settings() -> BackendSettings {
        BackendSettings {
            host: Some("localhost".to_string()),
            port: Some(27017),
            database: Some("commune".to_string()),
            ..BackendSettings::default()
        }
    }

    #[test]
    fn test_try_create_without_host_returns_none() {
        let settings = BackendSettings {
            host: None,
            ..complete_settings()
        };
        assert!(MongoAdapter::try_create(&settings).is_none());
    }

    #[test]
    fn test_try_create_starts_uninitialised() {
        let adapter = MongoAdapter::try_create(&complete_settings()).unwrap();
        assert_eq!(adapter.state(), AdapterState::Uninitialised);
    }

    #[tokio::test]
    async fn test_session_before_setup_is_not_ready() {
        let adapter = MongoAdapter::try_create(&complete_settings()).unwrap();
        assert!(matches!(
            adapter.open_session().await,
            Err(StorageError::NotReady { adapter: "mongodb" })
        ));
    }

    #[test]
    fn test_conventions_add_partial_id_field() {
        let id = identity::build(&["g", "a", "1"]).unwrap();
        let conventions = mongo_conventions(Collection::Resources, &id, json!({"url": "x"}));
        assert_eq!(conventions.document_id, "g/a/1");
        assert_eq!(conventions.body, json!({"url": "x", "partialId": "g/a/1"}));
    }

    #[test]
    fn test_conventions_never_carry_object_id() {
        let adapter = MongoAdapter::try_create(&complete_settings()).unwrap();
        let id = identity::build(&["u1"]).unwrap();
        let reference = Reference(ObjectId::new().to_hex());
        let conventions =
            adapter.conventions_for(Collection::Users, &id, Some(&reference), json!({"userId": "u1"}));
        assert!(conventions.body.get("_id").is_none());
        assert_eq!(conventions.body, json!({"userId": "u1", "partialId": "u1"}));

        let replacement = bson::to_document(&conventions.body).unwrap();
        assert!(!replacement.contains_key("_id"));
    }

    #[test]
    fn test_decode_strips_bookkeeping_and_sets_reference() {
        let oid = ObjectId::new();
        let stored = doc! { "_id": oid, "partialId": "u1", "userId": "u1", "language": "fr" };
        let document = decode(Collection::Users, stored).unwrap();
        assert_eq!(document.reference(), Some(&Reference(oid.to_hex())));

        let user = User::from_document(document).unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.language.as_deref(), Some("fr"));
    }
}
