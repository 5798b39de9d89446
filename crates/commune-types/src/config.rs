//! Storage configuration types.
//!
//! `StorageConfig` selects a backend and carries one settings block per
//! backend. Values come from the `[storage]` table of `config.toml` and are
//! overridden by environment variables (see `commune-infra::config`).
//! Required keys are only validated when an adapter is created, so a config
//! with gaps still loads and the store can fall back to in-memory storage.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

/// A network-backed document store the service can persist to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseSolution {
    Mongodb,
    Couchdb,
    Ravendb,
    Postgres,
}

impl DatabaseSolution {
    pub const ALL: [DatabaseSolution; 4] = [
        DatabaseSolution::Mongodb,
        DatabaseSolution::Couchdb,
        DatabaseSolution::Ravendb,
        DatabaseSolution::Postgres,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DatabaseSolution::Mongodb => "mongodb",
            DatabaseSolution::Couchdb => "couchdb",
            DatabaseSolution::Ravendb => "ravendb",
            DatabaseSolution::Postgres => "postgres",
        }
    }

    /// Prefix of this backend's environment variables (`MONGODB_HOST`, ...).
    pub fn env_prefix(&self) -> &'static str {
        match self {
            DatabaseSolution::Mongodb => "MONGODB",
            DatabaseSolution::Couchdb => "COUCHDB",
            DatabaseSolution::Ravendb => "RAVENDB",
            DatabaseSolution::Postgres => "POSTGRES",
        }
    }

    /// Parse a backend selection. `none` and the empty string select no backend.
    pub fn parse_selection(value: &str) -> Result<Option<Self>, String> {
        match value.trim().to_lowercase().as_str() {
            "" | "none" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl fmt::Display for DatabaseSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatabaseSolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatabaseSolution::ALL
            .iter()
            .find(|solution| solution.name() == s.to_lowercase())
            .copied()
            .ok_or_else(|| format!("unknown database solution: '{s}'"))
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Connection parameters for one backend. All optional until validated.
#[derive(Debug, Default, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    /// Connect over TLS using the client certificate below (RavenDB).
    #[serde(default)]
    pub secure: bool,
    /// PEM file holding the client certificate and its private key.
    #[serde(default)]
    pub certificate: Option<PathBuf>,
}

/// Top-level storage configuration.
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Selected backend. `None` runs on the in-memory adapter.
    #[serde(default)]
    pub solution: Option<DatabaseSolution>,

    /// Load the frequently used collections into the cache on startup.
    #[serde(default = "default_prefetch")]
    pub prefetch_documents: bool,

    #[serde(default)]
    pub mongodb: BackendSettings,
    #[serde(default)]
    pub couchdb: BackendSettings,
    #[serde(default)]
    pub ravendb: BackendSettings,
    #[serde(default)]
    pub postgres: BackendSettings,
}

fn default_prefetch() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StorageConfig {
    /// Config with no backend selected and prefetching on.
    pub fn in_memory() -> Self {
        Self {
            solution: None,
            prefetch_documents: default_prefetch(),
            mongodb: BackendSettings::default(),
            couchdb: BackendSettings::default(),
            ravendb: BackendSettings::default(),
            postgres: BackendSettings::default(),
        }
    }

    pub fn settings(&self, solution: DatabaseSolution) -> &BackendSettings {
        match solution {
            DatabaseSolution::Mongodb => &self.mongodb,
            DatabaseSolution::Couchdb => &self.couchdb,
            DatabaseSolution::Ravendb => &self.ravendb,
            DatabaseSolution::Postgres => &self.postgres,
        }
    }

    pub fn settings_mut(&mut self, solution: DatabaseSolution) -> &mut BackendSettings {
        match solution {
            DatabaseSolution::Mongodb => &mut self.mongodb,
            DatabaseSolution::Couchdb => &mut self.couchdb,
            DatabaseSolution::Ravendb => &mut self.ravendb,
            DatabaseSolution::Postgres => &mut self.postgres,
        }
    }
}

/// Top-level `config.toml` document. Only the `[storage]` table is read here.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub storage: StorageConfig,
}
