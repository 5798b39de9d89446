//! CouchDB adapter over the HTTP API.
//!
//! All collections share one CouchDB database. A record's `_id` is
//! `collection/partialId` and its reference is the `_rev` revision. Writes
//! without a current revision conflict (409) on existing records; the adapter
//! then reads the live revision and retries once.

use commune_core::adapter::{Adapter, AdapterState, Conventions, Lifecycle, strip_fields};
use commune_core::session::{Release, Session, decoded_records};
use commune_types::collection::Collection;
use commune_types::config::{BackendSettings, DatabaseSolution};
use commune_types::document::Document;
use commune_types::error::StorageError;
use commune_types::identity::{PartialId, Reference};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::endpoint::{Endpoint, log_unavailable};
use crate::http::{self, BasicAuth};

#[derive(Clone)]
struct Connection {
    client: reqwest::Client,
    database_url: Url,
    auth: Option<BasicAuth>,
}

impl Connection {
    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        BasicAuth::apply(self.auth.as_ref(), self.client.request(method, url))
    }

    fn document_url(&self, document_id: &str) -> Url {
        http::with_segments(&self.database_url, &[document_id])
    }
}

pub struct CouchAdapter {
    endpoint: Endpoint,
    lifecycle: Lifecycle<Connection>,
}

impl CouchAdapter {
    pub const NAME: &'static str = "couchdb";

    pub fn try_create(settings: &BackendSettings) -> Option<Self> {
        let endpoint = log_unavailable(
            DatabaseSolution::Couchdb,
            Endpoint::resolve(DatabaseSolution::Couchdb, settings),
        )?;
        Some(Self {
            endpoint,
            lifecycle: Lifecycle::new(Self::NAME),
        })
    }

    fn connection(&self) -> Result<Connection, StorageError> {
        let base = http::base_url("http", &self.endpoint)?;
        Ok(Connection {
            client: http::build_client(reqwest::Client::builder())?,
            database_url: http::with_segments(&base, &[self.endpoint.database.as_str()]),
            auth: BasicAuth::from_endpoint(&self.endpoint),
        })
    }

    /// Create the database when missing. Returns how many were created.
    async fn provision(connection: &Connection) -> Result<usize, StorageError> {
        let connection_error = |e: reqwest::Error| StorageError::Connection(e.to_string());

        let response = connection
            .request(reqwest::Method::GET, connection.database_url.clone())
            .send()
            .await
            .map_err(connection_error)?;

        match response.status() {
            status if status.is_success() => Ok(0),
            StatusCode::NOT_FOUND => {
                let response = connection
                    .request(reqwest::Method::PUT, connection.database_url.clone())
                    .send()
                    .await
                    .map_err(connection_error)?;
                match response.status() {
                    status if status.is_success() => Ok(1),
                    StatusCode::PRECONDITION_FAILED => Ok(0),
                    status => Err(StorageError::Connection(format!(
                        "failed to create database: HTTP {status}"
                    ))),
                }
            }
            status => Err(StorageError::Connection(format!(
                "database check failed: HTTP {status}"
            ))),
        }
    }
}

fn couch_conventions(
    collection: Collection,
    partial_id: &PartialId,
    reference: Option<&Reference>,
    data: Value,
) -> Conventions {
    let document_id = Conventions::qualified_id(collection, partial_id);
    let mut body = data;
    if let Value::Object(map) = &mut body {
        map.insert("_id".to_string(), Value::String(document_id.clone()));
        if let Some(reference) = reference {
            map.insert("_rev".to_string(), Value::String(reference.to_string()));
        }
    }
    Conventions {
        collection,
        partial_id: partial_id.clone(),
        document_id,
        body,
    }
}

fn decode(collection: Collection, stored: Value) -> Result<Document, StorageError> {
    let reference = stored
        .get("_rev")
        .and_then(Value::as_str)
        .map(|rev| Reference(rev.to_string()));
    Document::decode_with_reference(collection, strip_fields(stored, &["_id", "_rev"]), reference)
}

#[derive(Deserialize)]
struct AllDocs {
    rows: Vec<AllDocsRow>,
}

#[derive(Deserialize)]
struct AllDocsRow {
    id: String,
    #[serde(default)]
    doc: Option<Value>,
}

fn decode_rows(collection: Collection, all: AllDocs) -> Vec<Document> {
    let rows = all
        .rows
        .into_iter()
        .filter_map(|row| row.doc.map(|stored| (row.id, decode(collection, stored))));
    decoded_records(collection, rows)
}

#[derive(Deserialize)]
struct WriteResult {
    rev: String,
}

impl Adapter for CouchAdapter {
    type Session = CouchSession;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    async fn setup(&self) -> Result<(), StorageError> {
        self.lifecycle.ensure_uninitialised()?;
        let connection = self.connection()?;
        let created = Self::provision(&connection).await?;
        tracing::info!(adapter = Self::NAME, created, "database provisioned");
        self.lifecycle.mark_ready(connection)
    }

    async fn teardown(&self) -> Result<(), StorageError> {
        self.lifecycle.close().map(drop)
    }

    fn conventions_for(
        &self,
        collection: Collection,
        partial_id: &PartialId,
        reference: Option<&Reference>,
        data: Value,
    ) -> Conventions {
        couch_conventions(collection, partial_id, reference, data)
    }

    async fn open_session(&self) -> Result<CouchSession, StorageError> {
        Ok(CouchSession {
            connection: self.lifecycle.connection()?,
        })
    }
}

/// Session over the CouchDB HTTP API. Every write is its own request.
pub struct CouchSession {
    connection: Connection,
}

impl CouchSession {
    /// Current revision of a document, `None` when it does not exist.
    async fn current_revision(
        &self,
        collection: Collection,
        document_id: &str,
    ) -> Result<Option<Reference>, StorageError> {
        let response = self
            .connection
            .request(reqwest::Method::HEAD, self.connection.document_url(document_id))
            .send()
            .await
            .map_err(http::request_error(collection))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = http::ensure_success(collection, response).await?;
        Ok(response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|etag| etag.to_str().ok())
            .map(|etag| Reference(etag.trim_matches('"').to_string())))
    }

    async fn put(&self, conventions: &Conventions) -> Result<Option<Reference>, StorageError> {
        let collection = conventions.collection;
        let response = self
            .connection
            .request(reqwest::Method::PUT, self.connection.document_url(&conventions.document_id))
            .json(&conventions.body)
            .send()
            .await
            .map_err(http::request_error(collection))?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        let result: WriteResult = http::ensure_success(collection, response)
            .await?
            .json()
            .await
            .map_err(http::request_error(collection))?;
        Ok(Some(Reference(result.rev)))
    }
}

impl Session for CouchSession {
    async fn get(
        &self,
        collection: Collection,
        partial_id: &PartialId,
    ) -> Result<Option<Document>, StorageError> {
        let document_id = Conventions::qualified_id(collection, partial_id);
        let response = self
            .connection
            .request(reqwest::Method::GET, self.connection.document_url(&document_id))
            .send()
            .await
            .map_err(http::request_error(collection))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let stored: Value = http::ensure_success(collection, response)
            .await?
            .json()
            .await
            .map_err(http::request_error(collection))?;
        decode(collection, stored).map(Some)
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>, StorageError> {
        let prefix = format!("{}/", collection.name());
        let url = http::with_segments(&self.connection.database_url, &["_all_docs"]);
        let response = self
            .connection
            .request(reqwest::Method::GET, url)
            .query(&[
                ("include_docs", "true".to_string()),
                ("startkey", json!(prefix).to_string()),
                ("endkey", json!(format!("{prefix}\u{fff0}")).to_string()),
            ])
            .send()
            .await
            .map_err(http::request_error(collection))?;

        let all: AllDocs = http::ensure_success(collection, response)
            .await?
            .json()
            .await
            .map_err(http::request_error(collection))?;

        Ok(decode_rows(collection, all))
    }

    async fn store(&self, document: &Document) -> Result<Reference, StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;
        let data = document.to_data()?;

        let conventions =
            couch_conventions(collection, &partial_id, document.reference(), data.clone());
        if let Some(reference) = self.put(&conventions).await? {
            return Ok(reference);
        }

        // Stale or missing revision: retry once against the live one.
        let current = self.current_revision(collection, &conventions.document_id).await?;
        tracing::debug!(%collection, %partial_id, "revision conflict, retrying with current revision");
        let conventions = couch_conventions(collection, &partial_id, current.as_ref(), data);
        self.put(&conventions)
            .await?
            .ok_or_else(|| StorageError::backend(collection, "revision conflict"))
    }

    async fn delete(&self, document: &Document) -> Result<(), StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;
        let document_id = Conventions::qualified_id(collection, &partial_id);

        let Some(revision) = self.current_revision(collection, &document_id).await? else {
            return Ok(());
        };
        let response = self
            .connection
            .request(reqwest::Method::DELETE, self.connection.document_url(&document_id))
            .query(&[("rev", revision.as_str())])
            .send()
            .await
            .map_err(http::request_error(collection))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        http::ensure_success(collection, response).await.map(drop)
    }

    async fn release(&self, _release: Release) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commune_types::identity;
    use commune_types::model::Model;
    use commune_types::records::Praise;

    fn complete_settings() -> BackendSettings {
        BackendSettings {
            host: Some("localhost".to_string()),
            port: Some(5984),
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
        assert!(CouchAdapter::try_create(&settings).is_none());
    }

    #[test]
    fn test_database_url() {
        let adapter = CouchAdapter::try_create(&complete_settings()).unwrap();
        let connection = adapter.connection().unwrap();
        assert_eq!(connection.database_url.as_str(), "http://localhost:5984/commune");
        assert_eq!(
            connection.document_url("users/u1").as_str(),
            "http://localhost:5984/commune/users%2Fu1"
        );
    }

    #[test]
    fn test_conventions_qualify_id_and_carry_revision() {
        let id = identity::build(&["u1"]).unwrap();
        let conventions = couch_conventions(
            Collection::Users,
            &id,
            Some(&Reference("2-abc".to_string())),
            json!({"userId": "u1"}),
        );
        assert_eq!(conventions.document_id, "users/u1");
        assert_eq!(
            conventions.body,
            json!({"_id": "users/u1", "_rev": "2-abc", "userId": "u1"})
        );
    }

    #[test]
    fn test_decode_reads_revision() {
        let stored = json!({
            "_id": "praises/a/t/1",
            "_rev": "1-xyz",
            "authorId": "a",
            "targetId": "t",
            "createdAt": "1",
        });
        let document = decode(Collection::Praises, stored).unwrap();
        assert_eq!(document.reference().map(Reference::as_str), Some("1-xyz"));
        let praise = Praise::from_document(document).unwrap();
        assert_eq!(praise.partial_id().unwrap().as_str(), "a/t/1");
    }

    #[tokio::test]
    async fn test_session_after_teardown_is_not_ready() {
        let adapter = CouchAdapter::try_create(&complete_settings()).unwrap();
        assert!(adapter.teardown().await.is_err());
        assert!(adapter.open_session().await.is_err());
    }

    #[test]
    fn test_all_docs_page_keeps_decodable_rows() {
        let all: AllDocs = serde_json::from_value(json!({
            "total_rows": 2,
            "rows": [
                {"id": "resources/g/a/1", "doc": {
                    "_id": "resources/g/a/1", "_rev": "1-a",
                    "guildId": "g", "authorId": "a", "createdAt": "1", "url": "https://x"
                }},
                {"id": "resources/g/a/2", "doc": {
                    "_id": "resources/g/a/2", "_rev": "1-b",
                    "guildId": "g", "authorId": "a", "createdAt": "2"
                }},
                {"id": "resources/g/a/3"}
            ]
        }))
        .unwrap();

        let documents = decode_rows(Collection::Resources, all);
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].partial_id().unwrap().as_str(), "g/a/1");
    }
}
