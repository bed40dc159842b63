use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, warn, Instrument};

use crate::error::{FetchError, SecretError};
use crate::retry::{execute_with_retry, RetryPolicy};
use crate::store::{SecretStore, SecretValue};

/// Which secret to read, and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRequest {
    pub vault_uri: String,
    pub secret_name: String,
}

impl SecretRequest {
    pub fn new(vault_uri: impl Into<String>, secret_name: impl Into<String>) -> Self {
        Self {
            vault_uri: vault_uri.into(),
            secret_name: secret_name.into(),
        }
    }
}

/// A fetched secret plus how much work it took.
#[derive(Debug, Clone)]
pub struct SecretOutcome {
    pub value: SecretValue,
    pub attempts: u32,
    pub total_delay: Duration,
}

/// Reads secrets under a bounded retry policy. Nothing is cached: every call
/// starts a fresh series of attempts.
#[derive(Clone)]
pub struct SecretRetriever {
    store: Arc<dyn SecretStore>,
    policy: RetryPolicy,
}

impl SecretRetriever {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `name` from `vault_uri`.
    pub async fn get_secret(&self, vault_uri: &str, name: &str) -> Result<SecretValue, SecretError> {
        self.get(&SecretRequest::new(vault_uri, name))
            .await
            .map(|outcome| outcome.value)
    }

    /// Fetch the secret and report attempts and backoff alongside it.
    pub async fn get(&self, request: &SecretRequest) -> Result<SecretOutcome, SecretError> {
        let span = info_span!("secret_fetch", secret = %request.secret_name);
        async {
            let store: &dyn SecretStore = self.store.as_ref();
            let vault_uri = request.vault_uri.as_str();
            let name = request.secret_name.as_str();
            let outcome = execute_with_retry(&self.policy, FetchError::is_retryable, move |_attempt| {
                store.fetch(vault_uri, name)
            })
            .await;

            let attempts = outcome.attempts;
            let total_delay = outcome.total_delay;
            match outcome.result {
                Ok(value) => {
                    info!(
                        attempts,
                        total_delay_ms = total_delay.as_millis() as u64,
                        "secret_fetch_success"
                    );
                    Ok(SecretOutcome {
                        value,
                        attempts,
                        total_delay,
                    })
                }
                Err(err) => {
                    warn!(attempts, error = %err, "secret_fetch_failure");
                    Err(SecretError::from_fetch(&request.secret_name, attempts, err))
                }
            }
        }
        .instrument(span)
        .await
    }
}
