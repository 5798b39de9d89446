//! RavenDB adapter over the REST API.
//!
//! Document ids are `collection/partialId` and every body carries
//! `@metadata.@collection`. The change vector returned by the server is the
//! record's reference. Secure mode talks HTTPS and authenticates with a
//! client certificate read from a PEM file holding certificate and key.
//!
//! The database must already exist: setup verifies it and never creates one.

use std::path::PathBuf;

use commune_core::adapter::{Adapter, AdapterState, Conventions, Lifecycle, strip_fields};
use commune_core::session::{Release, Session, decoded_records};
use commune_types::collection::Collection;
use commune_types::config::{BackendSettings, DatabaseSolution};
use commune_types::document::Document;
use commune_types::error::StorageError;
use commune_types::identity::{PartialId, Reference};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::endpoint::{Endpoint, log_unavailable};
use crate::http::{self, BasicAuth};

const METADATA_FIELD: &str = "@metadata";

/// Documents requested per page when listing a collection.
const PAGE_SIZE: usize = 1024;

#[derive(Clone)]
struct Connection {
    client: reqwest::Client,
    database_url: Url,
    auth: Option<BasicAuth>,
}

impl Connection {
    fn request(&self, method: Method, segments: &[&str]) -> reqwest::RequestBuilder {
        let url = http::with_segments(&self.database_url, segments);
        BasicAuth::apply(self.auth.as_ref(), self.client.request(method, url))
    }
}

pub struct RavenAdapter {
    endpoint: Endpoint,
    certificate: Option<PathBuf>,
    lifecycle: Lifecycle<Connection>,
}

impl RavenAdapter {
    pub const NAME: &'static str = "ravendb";

    /// Build an adapter when host, port and database are configured, and in
    /// secure mode a readable certificate path as well.
    pub fn try_create(settings: &BackendSettings) -> Option<Self> {
        let result = Endpoint::resolve(DatabaseSolution::Ravendb, settings).and_then(|endpoint| {
            let certificate = match (settings.secure, &settings.certificate) {
                (false, _) => None,
                (true, Some(path)) if path.is_file() => Some(path.clone()),
                (true, _) => {
                    return Err(StorageError::ConfigurationMissing {
                        backend: DatabaseSolution::Ravendb.name(),
                        keys: vec!["RAVENDB_CERTIFICATE".to_string()],
                    });
                }
            };
            Ok(Self {
                endpoint,
                certificate,
                lifecycle: Lifecycle::new(Self::NAME),
            })
        });
        log_unavailable(DatabaseSolution::Ravendb, result)
    }

    fn scheme(&self) -> &'static str {
        if self.certificate.is_some() { "https" } else { "http" }
    }

    async fn connect(&self) -> Result<Connection, StorageError> {
        let mut builder = reqwest::Client::builder();
        if let Some(path) = &self.certificate {
            let pem = tokio::fs::read(path).await.map_err(|e| {
                StorageError::Connection(format!("failed to read {}: {e}", path.display()))
            })?;
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| StorageError::Connection(format!("invalid client certificate: {e}")))?;
            builder = builder.identity(identity);
        }

        let base = http::base_url(self.scheme(), &self.endpoint)?;
        Ok(Connection {
            client: http::build_client(builder)?,
            database_url: http::with_segments(&base, &["databases", self.endpoint.database.as_str()]),
            auth: BasicAuth::from_endpoint(&self.endpoint),
        })
    }

    async fn verify_database(&self, connection: &Connection) -> Result<(), StorageError> {
        let response = connection
            .request(Method::GET, &["stats"])
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(StorageError::Connection(format!(
                "database '{}' is not available: HTTP {status}",
                self.endpoint.database
            ))),
        }
    }
}

fn raven_conventions(collection: Collection, partial_id: &PartialId, data: Value) -> Conventions {
    let mut body = data;
    if let Value::Object(map) = &mut body {
        map.insert(
            METADATA_FIELD.to_string(),
            json!({ "@collection": collection.name() }),
        );
    }
    Conventions {
        collection,
        partial_id: partial_id.clone(),
        document_id: Conventions::qualified_id(collection, partial_id),
        body,
    }
}

fn decode(collection: Collection, stored: Value) -> Result<Document, StorageError> {
    let reference = stored
        .get(METADATA_FIELD)
        .and_then(|metadata| metadata.get("@change-vector"))
        .and_then(Value::as_str)
        .map(|vector| Reference(vector.to_string()));
    Document::decode_with_reference(collection, strip_fields(stored, &[METADATA_FIELD]), reference)
}

/// Document id from `@metadata.@id`, for log lines.
fn stored_id(stored: &Value) -> &str {
    stored
        .get(METADATA_FIELD)
        .and_then(|metadata| metadata.get("@id"))
        .and_then(Value::as_str)
        .unwrap_or("?")
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Results {
    results: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutResult {
    change_vector: String,
}

impl Adapter for RavenAdapter {
    type Session = RavenSession;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    async fn setup(&self) -> Result<(), StorageError> {
        self.lifecycle.ensure_uninitialised()?;
        let connection = self.connect().await?;
        self.verify_database(&connection).await?;
        tracing::info!(
            adapter = Self::NAME,
            secure = self.certificate.is_some(),
            "database verified"
        );
        self.lifecycle.mark_ready(connection)
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
        raven_conventions(collection, partial_id, data)
    }

    async fn open_session(&self) -> Result<RavenSession, StorageError> {
        Ok(RavenSession {
            connection: self.lifecycle.connection()?,
        })
    }
}

/// Session over the RavenDB REST API. Writes apply per request.
pub struct RavenSession {
    connection: Connection,
}

impl RavenSession {
    async fn results(
        &self,
        collection: Collection,
        response: reqwest::Response,
    ) -> Result<Vec<Value>, StorageError> {
        let results: Results = http::ensure_success(collection, response)
            .await?
            .json()
            .await
            .map_err(http::request_error(collection))?;
        Ok(results.results)
    }
}

impl Session for RavenSession {
    async fn get(
        &self,
        collection: Collection,
        partial_id: &PartialId,
    ) -> Result<Option<Document>, StorageError> {
        let document_id = Conventions::qualified_id(collection, partial_id);
        let response = self
            .connection
            .request(Method::GET, &["docs"])
            .query(&[("id", document_id.as_str())])
            .send()
            .await
            .map_err(http::request_error(collection))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.results(collection, response)
            .await?
            .into_iter()
            .find(|stored| !stored.is_null())
            .map(|stored| decode(collection, stored))
            .transpose()
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>, StorageError> {
        let prefix = format!("{}/", collection.name());
        let mut documents = Vec::new();
        let mut start = 0;

        loop {
            let response = self
                .connection
                .request(Method::GET, &["docs"])
                .query(&[
                    ("startsWith", prefix.clone()),
                    ("start", start.to_string()),
                    ("pageSize", PAGE_SIZE.to_string()),
                ])
                .send()
                .await
                .map_err(http::request_error(collection))?;

            let page = self.results(collection, response).await?;
            let fetched = page.len();
            documents.extend(decoded_records(
                collection,
                page.into_iter()
                    .map(|stored| (stored_id(&stored).to_string(), decode(collection, stored))),
            ));
            if fetched < PAGE_SIZE {
                break;
            }
            start += fetched;
        }
        Ok(documents)
    }

    async fn store(&self, document: &Document) -> Result<Reference, StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;
        let conventions = raven_conventions(collection, &partial_id, document.to_data()?);

        let response = self
            .connection
            .request(Method::PUT, &["docs"])
            .query(&[("id", conventions.document_id.as_str())])
            .json(&conventions.body)
            .send()
            .await
            .map_err(http::request_error(collection))?;

        let result: PutResult = http::ensure_success(collection, response)
            .await?
            .json()
            .await
            .map_err(http::request_error(collection))?;
        Ok(Reference(result.change_vector))
    }

    async fn delete(&self, document: &Document) -> Result<(), StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;
        let document_id = Conventions::qualified_id(collection, &partial_id);

        let response = self
            .connection
            .request(Method::DELETE, &["docs"])
            .query(&[("id", document_id.as_str())])
            .send()
            .await
            .map_err(http::request_error(collection))?;
        http::ensure_success(collection, response).await.map(drop)
    }

    async fn release(&self, _release: Release) -> Result<(), StorageError> {
        Ok(())
    }
}
