//! Ambient identity tokens.
//!
//! The function host exposes a managed identity. On App Service / Functions it
//! lives behind `IDENTITY_ENDPOINT` + `IDENTITY_HEADER`; on plain VMs and
//! containers it is the instance metadata service. Either way we ask for a
//! bearer token scoped to a resource and hand it to the vault client.
use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::FetchError;

/// Resource id used when talking to Key Vault.
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// A bearer token. The token text never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Something that can mint bearer tokens for a resource.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, FetchError>;
}

/// Where the managed identity endpoint lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// App Service / Functions sidecar endpoint.
    AppService { endpoint: String, header: String },
    /// Instance metadata service.
    Imds { endpoint: String },
}

impl IdentitySource {
    /// Pick the source from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match (lookup("IDENTITY_ENDPOINT"), lookup("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => IdentitySource::AppService { endpoint, header },
            _ => IdentitySource::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            },
        }
    }
}

/// The process's managed identity.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    source: IdentitySource,
    client_id: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ManagedIdentityCredential {
    pub fn new(http: reqwest::Client, source: IdentitySource) -> Self {
        Self {
            http,
            source,
            client_id: None,
        }
    }

    /// Select a user-assigned identity instead of the system-assigned one.
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn source(&self) -> &IdentitySource {
        &self.source
    }

    fn token_request(&self, resource: &str) -> Result<reqwest::RequestBuilder, FetchError> {
        let (endpoint, api_version) = match &self.source {
            IdentitySource::AppService { endpoint, .. } => (endpoint, APP_SERVICE_API_VERSION),
            IdentitySource::Imds { endpoint } => (endpoint, IMDS_API_VERSION),
        };
        let mut url = Url::parse(endpoint)
            .map_err(|e| FetchError::Forbidden(format!("invalid identity endpoint: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api-version", api_version);
            query.append_pair("resource", resource);
            if let Some(client_id) = &self.client_id {
                query.append_pair("client_id", client_id);
            }
        }

        let request = self.http.get(url);
        Ok(match &self.source {
            IdentitySource::AppService { header, .. } => {
                request.header("X-IDENTITY-HEADER", header.as_str())
            }
            IdentitySource::Imds { .. } => request.header("Metadata", "true"),
        })
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, FetchError> {
        let response = self
            .token_request(resource)?
            .send()
            .await
            .map_err(|e| FetchError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // IMDS answers 404 while the identity is still being provisioned.
            if status.as_u16() == 404 {
                return Err(FetchError::Transient(format!(
                    "identity endpoint not ready: HTTP 404 {body}"
                )));
            }
            return Err(FetchError::from_status(status.as_u16(), &body));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("invalid token response: {e}")))?;
        debug!(resource, "identity_token_acquired");
        Ok(AccessToken::new(parsed.access_token))
    }
}

/// A fixed token, for local runs against an emulator and for tests.
#[derive(Debug, Clone)]
pub struct StaticTokenCredential(pub AccessToken);

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _resource: &str) -> Result<AccessToken, FetchError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    #[test]
    fn app_service_source_needs_both_variables() {
        let only_endpoint = IdentitySource::from_lookup(|name| {
            (name == "IDENTITY_ENDPOINT").then(|| "http://localhost:8081/msi/token".to_string())
        });
        assert!(matches!(only_endpoint, IdentitySource::Imds { .. }));

        let both = IdentitySource::from_lookup(|name| match name {
            "IDENTITY_ENDPOINT" => Some("http://localhost:8081/msi/token".into()),
            "IDENTITY_HEADER" => Some("hdr".into()),
            _ => None,
        });
        assert_eq!(
            both,
            IdentitySource::AppService {
                endpoint: "http://localhost:8081/msi/token".into(),
                header: "hdr".into()
            }
        );
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = AccessToken::new("eyJ0eXAi");
        assert_eq!(format!("{token:?}"), "AccessToken(***)");
        assert_eq!(token.secret(), "eyJ0eXAi");
    }

    #[tokio::test]
    async fn app_service_token_is_fetched_with_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/msi/token")
            .match_header("x-identity-header", "secret-header")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api-version".into(), "2019-08-01".into()),
                Matcher::UrlEncoded("resource".into(), KEY_VAULT_RESOURCE.into()),
                Matcher::UrlEncoded("client_id".into(), "uami".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok-1","expires_on":"1586984735","token_type":"Bearer"}"#)
            .create_async()
            .await;

        let credential = ManagedIdentityCredential::new(
            reqwest::Client::new(),
            IdentitySource::AppService {
                endpoint: format!("{}/msi/token", server.url()),
                header: "secret-header".into(),
            },
        )
        .with_client_id(Some("uami".into()));

        let token = credential.get_token(KEY_VAULT_RESOURCE).await.unwrap();
        mock.assert_async().await;
        assert_eq!(token.secret(), "tok-1");
    }

    #[tokio::test]
    async fn imds_rejection_is_forbidden() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/metadata/identity/oauth2/token")
            .match_header("metadata", "true")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_request","error_description":"Identity not found"}"#)
            .create_async()
            .await;

        let credential = ManagedIdentityCredential::new(
            reqwest::Client::new(),
            IdentitySource::Imds {
                endpoint: format!("{}/metadata/identity/oauth2/token", server.url()),
            },
        );

        let err = credential.get_token(KEY_VAULT_RESOURCE).await.unwrap_err();
        assert!(matches!(err, FetchError::Forbidden(msg) if msg.contains("Identity not found")));
    }

    #[tokio::test]
    async fn identity_not_ready_is_transient() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/token")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let credential = ManagedIdentityCredential::new(
            reqwest::Client::new(),
            IdentitySource::Imds {
                endpoint: format!("{}/token", server.url()),
            },
        );

        let err = credential.get_token(KEY_VAULT_RESOURCE).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
