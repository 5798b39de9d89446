//! Validated connection parameters shared by the network adapters.

use commune_types::config::{BackendSettings, DatabaseSolution};
use commune_types::error::StorageError;
use secrecy::{ExposeSecret, SecretString};

/// Host, port and database of a backend, all known to be present.
///
/// Does NOT derive Debug or Clone: the password stays inside the
/// `SecretString` and is only exposed when a client is built.
pub struct Endpoint {
    pub solution: DatabaseSolution,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl Endpoint {
    /// Check that `HOST`, `PORT` and `DATABASE` are set for `solution`.
    pub fn resolve(
        solution: DatabaseSolution,
        settings: &BackendSettings,
    ) -> Result<Self, StorageError> {
        let prefix = solution.env_prefix();
        let host = present(settings.host.as_deref());
        let database = present(settings.database.as_deref());

        let (Some(host), Some(port), Some(database)) = (host, settings.port, database) else {
            let mut keys = Vec::new();
            if host.is_none() {
                keys.push(format!("{prefix}_HOST"));
            }
            if settings.port.is_none() {
                keys.push(format!("{prefix}_PORT"));
            }
            if database.is_none() {
                keys.push(format!("{prefix}_DATABASE"));
            }
            return Err(StorageError::ConfigurationMissing {
                backend: solution.name(),
                keys,
            });
        };

        Ok(Self {
            solution,
            host: host.to_string(),
            port,
            database: database.to_string(),
            username: present(settings.username.as_deref()).map(str::to_string),
            password: settings
                .password
                .as_ref()
                .map(|p| SecretString::from(p.expose_secret().to_string())),
        })
    }

    /// Username and password when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username, password.expose_secret())),
            _ => None,
        }
    }
}

/// Log a configuration error and swallow it, for `try_create`.
pub(crate) fn log_unavailable<T>(
    solution: DatabaseSolution,
    result: Result<T, StorageError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(backend = solution.name(), error = %err, "adapter unavailable");
            None
        }
    }
}
