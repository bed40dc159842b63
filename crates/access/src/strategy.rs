use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use secrets::{SecretRetriever, SecretValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AccessError;
use crate::location::BlobLocation;
use crate::sas::{default_grant_ttl, sign_blob_read};

/// How the analysis service gets to read the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// The URL is handed over untouched; the service reads it with its own
    /// access.
    #[default]
    AmbientIdentity,
    /// A short-lived read-only SAS is appended to the URL.
    GeneratedToken,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::AmbientIdentity => "AmbientIdentity",
            Strategy::GeneratedToken => "GeneratedToken",
        }
    }

    /// Secrets this strategy reads per event.
    pub fn secret_fetches(&self) -> usize {
        match self {
            Strategy::AmbientIdentity => 1,
            Strategy::GeneratedToken => 2,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ambientidentity" | "ambient" | "managedidentity" => Ok(Strategy::AmbientIdentity),
            "generatedtoken" | "sas" => Ok(Strategy::GeneratedToken),
            other => Err(format!(
                "unknown blob access strategy '{other}' (expected AmbientIdentity or GeneratedToken)"
            )),
        }
    }
}

/// Everything the access step needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    pub strategy: Strategy,
    pub vault_uri: String,
    pub analysis_key_secret: String,
    /// Storage account owning the blobs; required for `GeneratedToken`.
    pub storage_account: Option<String>,
    pub account_key_secret: String,
}

impl AccessConfig {
    pub fn new(vault_uri: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::default(),
            vault_uri: vault_uri.into(),
            analysis_key_secret: "CompVisKey".to_string(),
            storage_account: None,
            account_key_secret: "StorageAccountKey".to_string(),
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_storage_account(mut self, account: impl Into<String>) -> Self {
        self.storage_account = Some(account.into());
        self
    }
}

/// Pick the strategy for this invocation. Depends on nothing but `config`.
pub fn select_strategy(config: &AccessConfig) -> Strategy {
    config.strategy
}

/// Source of "now" for grant generation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always answers the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// What the analysis call is made with.
#[derive(Debug, Clone)]
pub struct AccessDescriptor {
    pub strategy: Strategy,
    /// URL handed to the analysis service (with the grant appended, if any).
    pub image_url: String,
    pub analysis_key: SecretValue,
    /// Expiry of the generated grant; `None` for ambient access.
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait AccessStrategy: Send + Sync {
    fn strategy(&self) -> Strategy;

    async fn prepare(&self, image_url: &str) -> Result<AccessDescriptor, AccessError>;
}

/// Pass the URL through; only the analysis key is fetched.
pub struct AmbientIdentityAccess {
    retriever: SecretRetriever,
    vault_uri: String,
    analysis_key_secret: String,
}

impl AmbientIdentityAccess {
    pub fn new(retriever: SecretRetriever, config: &AccessConfig) -> Self {
        Self {
            retriever,
            vault_uri: config.vault_uri.clone(),
            analysis_key_secret: config.analysis_key_secret.clone(),
        }
    }
}

#[async_trait]
impl AccessStrategy for AmbientIdentityAccess {
    fn strategy(&self) -> Strategy {
        Strategy::AmbientIdentity
    }

    async fn prepare(&self, image_url: &str) -> Result<AccessDescriptor, AccessError> {
        let analysis_key = self
            .retriever
            .get_secret(&self.vault_uri, &self.analysis_key_secret)
            .await?;
        debug!(strategy = %Strategy::AmbientIdentity, "access_prepared");
        Ok(AccessDescriptor {
            strategy: Strategy::AmbientIdentity,
            image_url: image_url.to_string(),
            analysis_key,
            expires_at: None,
        })
    }
}

/// Sign a read-only grant for the one blob the event names.
pub struct GeneratedTokenAccess {
    retriever: SecretRetriever,
    vault_uri: String,
    analysis_key_secret: String,
    account: String,
    account_key_secret: String,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl GeneratedTokenAccess {
    pub fn new(
        retriever: SecretRetriever,
        config: &AccessConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AccessError> {
        let account = config
            .storage_account
            .clone()
            .filter(|a| !a.trim().is_empty())
            .ok_or(AccessError::MissingAccount)?;
        Ok(Self {
            retriever,
            vault_uri: config.vault_uri.clone(),
            analysis_key_secret: config.analysis_key_secret.clone(),
            account,
            account_key_secret: config.account_key_secret.clone(),
            clock,
            ttl: default_grant_ttl(),
        })
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }
}

#[async_trait]
impl AccessStrategy for GeneratedTokenAccess {
    fn strategy(&self) -> Strategy {
        Strategy::GeneratedToken
    }

    async fn prepare(&self, image_url: &str) -> Result<AccessDescriptor, AccessError> {
        // Reject foreign blobs before touching the vault.
        let location = BlobLocation::parse(image_url)?;
        if !location.account.eq_ignore_ascii_case(&self.account) {
            return Err(AccessError::AccountMismatch {
                expected: self.account.clone(),
                found: location.account,
            });
        }

        let analysis_key = self
            .retriever
            .get_secret(&self.vault_uri, &self.analysis_key_secret)
            .await?;
        let account_key = self
            .retriever
            .get_secret(&self.vault_uri, &self.account_key_secret)
            .await?;

        let sas = sign_blob_read(&location, account_key.expose(), self.clock.now(), self.ttl)?;
        info!(
            container = %location.container,
            blob = %location.blob,
            expires_at = %sas.expires_at,
            "access_token_generated"
        );

        Ok(AccessDescriptor {
            strategy: Strategy::GeneratedToken,
            image_url: sas.apply(location.url()).to_string(),
            analysis_key,
            expires_at: Some(sas.expires_at),
        })
    }
}

/// Build the implementation for the strategy `config` selects.
pub fn build_strategy(
    config: &AccessConfig,
    retriever: SecretRetriever,
    clock: Arc<dyn Clock>,
) -> Result<Box<dyn AccessStrategy>, AccessError> {
    Ok(match select_strategy(config) {
        Strategy::AmbientIdentity => Box::new(AmbientIdentityAccess::new(retriever, config)),
        Strategy::GeneratedToken => {
            Box::new(GeneratedTokenAccess::new(retriever, config, clock)?)
        }
    })
}
