//! Secret retrieval for the frame-events handler.
//!
//! ```text
//! SecretRetriever ── RetryPolicy (5 attempts, 2s → 16s, no jitter)
//!        │
//!        ▼
//!   SecretStore (one attempt) ── KeyVaultClient ── TokenCredential
//!                                                   └─ ManagedIdentityCredential
//! ```
//!
//! A store attempt ends in a [`FetchError`]: `Transient` failures are retried,
//! `NotFound` and `Forbidden` end the series immediately. Whatever survives
//! the policy comes out as a [`SecretError`].

pub mod credential;
pub mod error;
pub mod retriever;
pub mod retry;
pub mod store;

pub use credential::{
    AccessToken, IdentitySource, ManagedIdentityCredential, StaticTokenCredential,
    TokenCredential, KEY_VAULT_RESOURCE,
};
pub use error::{FetchError, SecretError, SecretErrorKind};
pub use retriever::{SecretOutcome, SecretRequest, SecretRetriever};
pub use retry::{execute_with_retry, RetryPolicy, RetryResult};
pub use store::{KeyVaultClient, SecretStore, SecretValue};
