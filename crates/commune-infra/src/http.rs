//! reqwest plumbing shared by the HTTP document stores (CouchDB, RavenDB).

use std::sync::Arc;
use std::time::Duration;

use commune_types::collection::Collection;
use commune_types::error::StorageError;
use reqwest::{RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, SecretString};

use crate::endpoint::Endpoint;

/// Fixed per-request timeout for document store calls.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic-auth credentials, shared between sessions without cloning the secret.
#[derive(Clone)]
pub(crate) struct BasicAuth(Arc<(String, SecretString)>);

impl BasicAuth {
    pub(crate) fn from_endpoint(endpoint: &Endpoint) -> Option<Self> {
        endpoint.credentials().map(|(username, password)| {
            Self(Arc::new((
                username.to_string(),
                SecretString::from(password.to_string()),
            )))
        })
    }

    pub(crate) fn apply(auth: Option<&Self>, request: RequestBuilder) -> RequestBuilder {
        match auth {
            Some(auth) => request.basic_auth(&auth.0.0, Some(auth.0.1.expose_secret())),
            None => request,
        }
    }
}

/// `scheme://host:port/`
pub(crate) fn base_url(scheme: &str, endpoint: &Endpoint) -> Result<Url, StorageError> {
    Url::parse(&format!("{scheme}://{}:{}/", endpoint.host, endpoint.port))
        .map_err(|e| StorageError::Connection(format!("invalid {} address: {e}", endpoint.solution)))
}

/// Append path segments, percent-encoding any `/` inside a segment.
pub(crate) fn with_segments(url: &Url, segments: &[&str]) -> Url {
    let mut url = url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

pub(crate) fn build_client(
    builder: reqwest::ClientBuilder,
) -> Result<reqwest::Client, StorageError> {
    builder
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| StorageError::Connection(format!("failed to create HTTP client: {e}")))
}

/// Map a non-success response to a backend error carrying status and body.
pub(crate) async fn ensure_success(
    collection: Collection,
    response: Response,
) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(%collection, status = %status, body = %body, "document store error response");
    Err(StorageError::backend(collection, format!("HTTP {status}: {body}")))
}

pub(crate) fn request_error(collection: Collection) -> impl Fn(reqwest::Error) -> StorageError {
    move |e| StorageError::backend(collection, format!("HTTP request failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use commune_types::config::DatabaseSolution;

    fn endpoint() -> Endpoint {
        Endpoint {
            solution: DatabaseSolution::Couchdb,
            host: "localhost".to_string(),
            port: 5984,
            database: "commune".to_string(),
            username: None,
            password: None,
        }
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            base_url("http", &endpoint()).unwrap().as_str(),
            "http://localhost:5984/"
        );
    }

    #[test]
    fn test_segments_encode_separator() {
        let base = base_url("http", &endpoint()).unwrap();
        let url = with_segments(&base, &["commune", "resources/g/a/1"]);
        assert_eq!(url.as_str(), "http://localhost:5984/commune/resources%2Fg%2Fa%2F1");
    }

    #[test]
    fn test_no_auth_without_credentials() {
        assert!(BasicAuth::from_endpoint(&endpoint()).is_none());
    }
}
