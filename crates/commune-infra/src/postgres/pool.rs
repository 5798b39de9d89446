//! PostgreSQL connection pool and table provisioning.
//!
//! One table per collection, each holding the record body as JSONB:
//! `partial_id TEXT PRIMARY KEY, reference TEXT NOT NULL, data JSONB NOT NULL`.
//! Provisioning only creates missing tables; it never alters existing ones.

use std::time::Duration;

use commune_types::collection::Collection;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::endpoint::Endpoint;

/// Maximum pooled connections shared by all sessions.
const MAX_CONNECTIONS: u32 = 8;

/// Build connect options from a validated endpoint.
pub fn connect_options(endpoint: &Endpoint) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(&endpoint.host)
        .port(endpoint.port)
        .database(&endpoint.database)
        .application_name("commune");
    if let Some(username) = &endpoint.username {
        options = options.username(username);
    }
    if let Some(password) = &endpoint.password {
        options = options.password(password.expose_secret());
    }
    options
}

pub async fn connect(endpoint: &Endpoint) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(connect_options(endpoint))
        .await
}

/// Quoted table name for a collection.
pub fn table(collection: Collection) -> String {
    format!("\"{}\"", collection.table_name())
}

/// Create every collection table that does not exist yet. Returns how many
/// were created.
pub async fn provision(pool: &PgPool) -> Result<usize, sqlx::Error> {
    let mut created = 0;
    for collection in Collection::ALL {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(collection.table_name())
        .fetch_one(pool)
        .await?;

        if !exists {
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 partial_id TEXT PRIMARY KEY, \
                 reference TEXT NOT NULL, \
                 data JSONB NOT NULL)",
                table(collection)
            ))
            .execute(pool)
            .await?;
            created += 1;
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use commune_types::config::DatabaseSolution;

    #[test]
    fn test_table_names_are_quoted_and_underscored() {
        assert_eq!(table(Collection::GuildStatistics), "\"guild_statistics\"");
        assert_eq!(table(Collection::Users), "\"users\"");
    }

    #[test]
    fn test_connect_options_carry_endpoint() {
        let endpoint = Endpoint {
            solution: DatabaseSolution::Postgres,
            host: "db.internal".to_string(),
            port: 6543,
            database: "commune".to_string(),
            username: Some("svc".to_string()),
            password: None,
        };
        let options = connect_options(&endpoint);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("commune"));
        assert_eq!(options.get_username(), "svc");
    }
}
