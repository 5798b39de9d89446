//! Storage configuration loader.
//!
//! Reads the `[storage]` table of `config.toml` in the data directory
//! (`~/.commune/` in production), then applies environment overrides. Falls
//! back to the in-memory defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use commune_types::config::{ConfigFile, DatabaseSolution, StorageConfig};
use secrecy::SecretString;

/// Environment variable selecting the backend.
pub const SOLUTION_VAR: &str = "DATABASE_SOLUTION";

/// Environment variable overriding the data directory.
pub const DATA_DIR_VAR: &str = "COMMUNE_DATA_DIR";

/// Resolve the data directory: `COMMUNE_DATA_DIR`, else `~/.commune`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_VAR) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".commune")
}

/// Load storage configuration from `{data_dir}/config.toml` and the process
/// environment.
pub async fn load_storage_config(data_dir: &Path) -> StorageConfig {
    let config = read_config_file(data_dir).await;
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

async fn read_config_file(data_dir: &Path) -> StorageConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return StorageConfig::in_memory();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return StorageConfig::in_memory();
        }
    };

    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => file.storage,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            StorageConfig::in_memory()
        }
    }
}

/// Overlay environment values onto `config`. `lookup` stands in for
/// `std::env::var` so tests need not touch the process environment.
pub fn apply_env_overrides(
    mut config: StorageConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> StorageConfig {
    if let Some(value) = lookup(SOLUTION_VAR) {
        match DatabaseSolution::parse_selection(&value) {
            Ok(solution) => config.solution = solution,
            Err(err) => tracing::warn!("Ignoring {SOLUTION_VAR}: {err}"),
        }
    }

    for solution in DatabaseSolution::ALL {
        let prefix = solution.env_prefix();
        let var = |suffix: &str| lookup(&format!("{prefix}_{suffix}"));
        let settings = config.settings_mut(solution);

        if let Some(host) = var("HOST") {
            settings.host = Some(host);
        }
        if let Some(port) = var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => settings.port = Some(port),
                Err(err) => tracing::warn!("Ignoring {prefix}_PORT={port}: {err}"),
            }
        }
        if let Some(database) = var("DATABASE") {
            settings.database = Some(database);
        }
        if let Some(username) = var("USERNAME") {
            settings.username = Some(username);
        }
        if let Some(password) = var("PASSWORD") {
            settings.password = Some(SecretString::from(password));
        }
    }

    if let Some(secure) = lookup("RAVENDB_SECURE") {
        config.ravendb.secure = matches!(secure.to_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(certificate) = lookup("RAVENDB_CERTIFICATE") {
        config.ravendb.certificate = Some(PathBuf::from(certificate));
    }

    config
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[tokio::test]
    async fn test_missing_file_returns_in_memory_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(tmp.path()).await;
        assert!(config.solution.is_none());
        assert!(config.prefetch_documents);
    }

    #[tokio::test]
    async fn test_valid_file_is_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[storage]
solution = "couchdb"
prefetch_documents = false

[storage.couchdb]
host = "db.local"
port = 5984
database = "commune"
username = "admin"
password = "hunter2"
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.solution, Some(DatabaseSolution::Couchdb));
        assert!(!config.prefetch_documents);
        assert_eq!(config.couchdb.host.as_deref(), Some("db.local"));
        assert_eq!(config.couchdb.port, Some(5984));
        assert_eq!(
            config.couchdb.password.as_ref().map(|p| p.expose_secret().to_string()),
            Some("hunter2".to_string())
        );
    }

    #[tokio::test]
    async fn test_malformed_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "[storage\nsolution = ")
            .await
            .unwrap();
        let config = read_config_file(tmp.path()).await;
        assert!(config.solution.is_none());
    }

    #[test]
    fn test_env_selects_backend_and_fills_settings() {
        let config = apply_env_overrides(
            StorageConfig::in_memory(),
            env(&[
                ("DATABASE_SOLUTION", "mongodb"),
                ("MONGODB_HOST", "mongo"),
                ("MONGODB_PORT", "27017"),
                ("MONGODB_DATABASE", "commune"),
            ]),
        );
        assert_eq!(config.solution, Some(DatabaseSolution::Mongodb));
        assert_eq!(config.mongodb.host.as_deref(), Some("mongo"));
        assert_eq!(config.mongodb.port, Some(27017));
        assert_eq!(config.mongodb.database.as_deref(), Some("commune"));
        assert!(config.couchdb.host.is_none());
    }

    #[test]
    fn test_env_none_selects_in_memory() {
        let mut base = StorageConfig::in_memory();
        base.solution = Some(DatabaseSolution::Postgres);
        let config = apply_env_overrides(base, env(&[("DATABASE_SOLUTION", "none")]));
        assert!(config.solution.is_none());
    }

    #[test]
    fn test_env_invalid_values_are_ignored() {
        let config = apply_env_overrides(
            StorageConfig::in_memory(),
            env(&[("DATABASE_SOLUTION", "cassandra"), ("POSTGRES_PORT", "not-a-port")]),
        );
        assert!(config.solution.is_none());
        assert!(config.postgres.port.is_none());
    }

    #[test]
    fn test_env_ravendb_secure() {
        let config = apply_env_overrides(
            StorageConfig::in_memory(),
            env(&[("RAVENDB_SECURE", "true"), ("RAVENDB_CERTIFICATE", "/etc/raven.pem")]),
        );
        assert!(config.ravendb.secure);
        assert_eq!(config.ravendb.certificate, Some(PathBuf::from("/etc/raven.pem")));
    }
}
