//! PostgreSQL adapter storing records as JSONB rows.
//!
//! Each session runs inside one transaction: it is committed when the
//! session is released after a successful operation and rolled back
//! otherwise. The reference is a UUID v7 stamped on every write.

pub mod pool;

use commune_core::adapter::{Adapter, AdapterState, Conventions, Lifecycle};
use commune_core::session::{Release, Session, decoded_records};
use commune_types::collection::Collection;
use commune_types::config::{BackendSettings, DatabaseSolution};
use commune_types::document::Document;
use commune_types::error::StorageError;
use commune_types::identity::{PartialId, Reference};
use serde_json::Value;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::endpoint::{Endpoint, log_unavailable};

pub struct PostgresAdapter {
    endpoint: Endpoint,
    lifecycle: Lifecycle<PgPool>,
}

impl PostgresAdapter {
    pub const NAME: &'static str = "postgres";

    pub fn try_create(settings: &BackendSettings) -> Option<Self> {
        let endpoint = log_unavailable(
            DatabaseSolution::Postgres,
            Endpoint::resolve(DatabaseSolution::Postgres, settings),
        )?;
        Some(Self {
            endpoint,
            lifecycle: Lifecycle::new(Self::NAME),
        })
    }
}

fn connection_error(err: sqlx::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

type Row = (String, String, Json<Value>);

fn decode(collection: Collection, (_, reference, Json(data)): Row) -> Result<Document, StorageError> {
    Document::decode_with_reference(collection, data, Some(Reference(reference)))
}

impl Adapter for PostgresAdapter {
    type Session = PostgresSession;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    async fn setup(&self) -> Result<(), StorageError> {
        self.lifecycle.ensure_uninitialised()?;
        let pool = pool::connect(&self.endpoint).await.map_err(connection_error)?;
        let created = pool::provision(&pool).await.map_err(connection_error)?;
        tracing::info!(adapter = Self::NAME, created, "tables provisioned");
        self.lifecycle.mark_ready(pool)
    }

    async fn teardown(&self) -> Result<(), StorageError> {
        self.lifecycle.close()?.close().await;
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

    async fn open_session(&self) -> Result<PostgresSession, StorageError> {
        let transaction = self
            .lifecycle
            .connection()?
            .begin()
            .await
            .map_err(connection_error)?;
        Ok(PostgresSession {
            transaction: Mutex::new(Some(transaction)),
        })
    }
}

/// Session bound to one open transaction.
pub struct PostgresSession {
    transaction: Mutex<Option<Transaction<'static, Postgres>>>,
}

fn released(collection: Collection) -> StorageError {
    StorageError::backend(collection, "session already released")
}

impl Session for PostgresSession {
    async fn get(
        &self,
        collection: Collection,
        partial_id: &PartialId,
    ) -> Result<Option<Document>, StorageError> {
        let mut guard = self.transaction.lock().await;
        let tx = guard.as_mut().ok_or_else(|| released(collection))?;

        let row: Option<Row> = sqlx::query_as(&format!(
            "SELECT partial_id, reference, data FROM {} WHERE partial_id = $1",
            pool::table(collection)
        ))
        .bind(partial_id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| StorageError::backend(collection, e))?;

        row.map(|row| decode(collection, row)).transpose()
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>, StorageError> {
        let mut guard = self.transaction.lock().await;
        let tx = guard.as_mut().ok_or_else(|| released(collection))?;

        let rows: Vec<Row> = sqlx::query_as(&format!(
            "SELECT partial_id, reference, data FROM {} ORDER BY partial_id",
            pool::table(collection)
        ))
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| StorageError::backend(collection, e))?;

        let rows = rows.into_iter().map(|row| (row.0.clone(), decode(collection, row)));
        Ok(decoded_records(collection, rows))
    }

    async fn store(&self, document: &Document) -> Result<Reference, StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;
        let conventions = Conventions::plain(collection, &partial_id, document.to_data()?);
        let reference = Uuid::now_v7().to_string();

        let mut guard = self.transaction.lock().await;
        let tx = guard.as_mut().ok_or_else(|| released(collection))?;

        sqlx::query(&format!(
            "INSERT INTO {} (partial_id, reference, data) VALUES ($1, $2, $3) \
             ON CONFLICT (partial_id) DO UPDATE \
             SET reference = EXCLUDED.reference, data = EXCLUDED.data",
            pool::table(collection)
        ))
        .bind(&conventions.document_id)
        .bind(&reference)
        .bind(Json(&conventions.body))
        .execute(&mut **tx)
        .await
        .map_err(|e| StorageError::backend(collection, e))?;

        Ok(Reference(reference))
    }

    async fn delete(&self, document: &Document) -> Result<(), StorageError> {
        let collection = document.collection();
        let partial_id = document.partial_id()?;

        let mut guard = self.transaction.lock().await;
        let tx = guard.as_mut().ok_or_else(|| released(collection))?;

        sqlx::query(&format!(
            "DELETE FROM {} WHERE partial_id = $1",
            pool::table(collection)
        ))
        .bind(partial_id.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| StorageError::backend(collection, e))?;
        Ok(())
    }

    async fn release(&self, release: Release) -> Result<(), StorageError> {
        let Some(tx) = self.transaction.lock().await.take() else {
            return Ok(());
        };
        match release {
            Release::Commit => tx.commit().await.map_err(connection_error),
            Release::Discard => tx.rollback().await.map_err(connection_error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commune_types::identity;
    use commune_types::model::Model;
    use commune_types::records::GuildStatistics;
    use serde_json::json;

    fn complete_settings() -> BackendSettings {
        BackendSettings {
            host: Some("localhost".to_string()),
            port: Some(5432),
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
        assert!(PostgresAdapter::try_create(&settings).is_none());
    }

    #[test]
    fn test_try_create_without_database_returns_none() {
        let settings = BackendSettings {
            database: None,
            ..complete_settings()
        };
        assert!(PostgresAdapter::try_create(&settings).is_none());
    }

    #[tokio::test]
    async fn test_session_before_setup_is_not_ready() {
        let adapter = PostgresAdapter::try_create(&complete_settings()).unwrap();
        assert!(matches!(
            adapter.open_session().await,
            Err(StorageError::NotReady { adapter: "postgres" })
        ));
    }

    #[test]
    fn test_conventions_keep_partial_id_as_key() {
        let adapter = PostgresAdapter::try_create(&complete_settings()).unwrap();
        let id = identity::build(&["g1"]).unwrap();
        let conventions =
            adapter.conventions_for(Collection::GuildStatistics, &id, None, json!({"guildId": "g1"}));
        assert_eq!(conventions.document_id, "g1");
        assert_eq!(conventions.body, json!({"guildId": "g1"}));
    }

    #[test]
    fn test_decode_row() {
        let row: Row = (
            "g1".to_string(),
            "0190-stamp".to_string(),
            Json(json!({"guildId": "g1", "counters": {"praises": 3}})),
        );
        let document = decode(Collection::GuildStatistics, row).unwrap();
        assert_eq!(document.reference().map(Reference::as_str), Some("0190-stamp"));
        let statistics = GuildStatistics::from_document(document).unwrap();
        assert_eq!(statistics.counters.get("praises"), Some(&3));
    }
}
