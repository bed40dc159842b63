//! One read against the secret store.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::credential::{TokenCredential, KEY_VAULT_RESOURCE};
use crate::error::FetchError;

const KEY_VAULT_API_VERSION: &str = "7.4";

/// An opaque secret. Never printed, never cached.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

/// A single attempt at reading `name` from the vault at `vault_uri`.
///
/// Implementations classify failures; the retry decision belongs to
/// [`SecretRetriever`](crate::SecretRetriever).
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, vault_uri: &str, name: &str) -> Result<SecretValue, FetchError>;
}

#[async_trait]
impl<S: SecretStore + ?Sized> SecretStore for Arc<S> {
    async fn fetch(&self, vault_uri: &str, name: &str) -> Result<SecretValue, FetchError> {
        (**self).fetch(vault_uri, name).await
    }
}

/// Azure Key Vault over REST.
pub struct KeyVaultClient {
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

impl KeyVaultClient {
    pub fn new(http: reqwest::Client, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            http,
            credential,
            timeout: Duration::from_secs(10),
        }
    }

    /// Per-attempt timeout for the secret read.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn secret_url(vault_uri: &str, name: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(vault_uri)
            .map_err(|e| FetchError::Forbidden(format!("invalid vault uri '{vault_uri}': {e}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Forbidden(format!("vault uri '{vault_uri}' cannot be a base")))?
            .pop_if_empty()
            .extend(["secrets", name]);
        url.query_pairs_mut()
            .append_pair("api-version", KEY_VAULT_API_VERSION);
        Ok(url)
    }
}

#[async_trait]
impl SecretStore for KeyVaultClient {
    async fn fetch(&self, vault_uri: &str, name: &str) -> Result<SecretValue, FetchError> {
        let url = Self::secret_url(vault_uri, name)?;
        let token = self.credential.get_token(KEY_VAULT_RESOURCE).await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token.secret())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), &body));
        }

        let bundle: SecretBundle = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("invalid secret bundle: {e}")))?;
        debug!(secret = name, "secret_fetched");
        Ok(SecretValue::new(bundle.value))
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;
    use crate::credential::{AccessToken, StaticTokenCredential};

    fn client() -> KeyVaultClient {
        KeyVaultClient::new(
            reqwest::Client::new(),
            Arc::new(StaticTokenCredential(AccessToken::new("tok"))),
        )
    }

    #[test]
    fn secret_value_debug_is_redacted() {
        let value = SecretValue::new("hunter2");
        assert_eq!(format!("{value:?}"), "SecretValue(***)");
        assert_eq!(value.expose(), "hunter2");
    }

    #[test]
    fn secret_url_tolerates_trailing_slash() {
        let a = KeyVaultClient::secret_url("https://kv.vault.azure.net/", "CompVisKey").unwrap();
        let b = KeyVaultClient::secret_url("https://kv.vault.azure.net", "CompVisKey").unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            "https://kv.vault.azure.net/secrets/CompVisKey?api-version=7.4"
        );
    }

    #[test]
    fn relative_vault_uri_is_rejected() {
        let err = KeyVaultClient::secret_url("kv.vault.azure.net", "x").unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn fetch_reads_value_with_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/secrets/CompVisKey")
            .match_query(Matcher::UrlEncoded("api-version".into(), "7.4".into()))
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value":"K1","id":"https://kv/secrets/CompVisKey/abc","attributes":{"enabled":true}}"#)
            .create_async()
            .await;

        let value = client().fetch(&server.url(), "CompVisKey").await.unwrap();
        mock.assert_async().await;
        assert_eq!(value.expose(), "K1");
    }

    #[tokio::test]
    async fn fetch_classifies_statuses() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/secrets/missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"SecretNotFound"}}"#)
            .create_async()
            .await;
        let _denied = server
            .mock("GET", "/secrets/denied")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;
        let _busy = server
            .mock("GET", "/secrets/busy")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let client = client();
        let url = server.url();
        assert!(matches!(
            client.fetch(&url, "missing").await,
            Err(FetchError::NotFound(msg)) if msg.contains("SecretNotFound")
        ));
        assert!(matches!(
            client.fetch(&url, "denied").await,
            Err(FetchError::Forbidden(_))
        ));
        assert!(matches!(
            client.fetch(&url, "busy").await,
            Err(FetchError::Transient(_))
        ));
    }
}
