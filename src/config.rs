//! Function app settings.
//!
//! Settings are read from the process environment with the `config` crate,
//! under the app-setting names the function was deployed with. Names match
//! case-insensitively. A `.env` file in the working directory is honoured for
//! local runs (the binary loads it with `dotenvy` before anything else).
//!
//! | Setting | Default |
//! |---|---|
//! | `KeyVaultUri` | required |
//! | `CompVisEndpoint` | required |
//! | `CompVisKeySecretName` | `CompVisKey` |
//! | `BlobAccessStrategy` | `AmbientIdentity` |
//! | `StorageAccountName` | required for `GeneratedToken` |
//! | `StorageAccountKeySecretName` | `StorageAccountKey` |
//! | `ManagedIdentityClientId` | none |
//! | `SecretFetchTimeoutSecs` | `10` |
//! | `AnalysisTimeoutSecs` | `30` |

use std::time::Duration;

use ::config::{Config, Environment, Map};
use access::{AccessConfig, Strategy};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const KEY_VAULT_URI: &str = "KeyVaultUri";
pub const COMP_VIS_ENDPOINT: &str = "CompVisEndpoint";
pub const COMP_VIS_KEY_SECRET_NAME: &str = "CompVisKeySecretName";
pub const BLOB_ACCESS_STRATEGY: &str = "BlobAccessStrategy";
pub const STORAGE_ACCOUNT_NAME: &str = "StorageAccountName";
pub const STORAGE_ACCOUNT_KEY_SECRET_NAME: &str = "StorageAccountKeySecretName";
pub const MANAGED_IDENTITY_CLIENT_ID: &str = "ManagedIdentityClientId";
pub const SECRET_FETCH_TIMEOUT_SECS: &str = "SecretFetchTimeoutSecs";
pub const ANALYSIS_TIMEOUT_SECS: &str = "AnalysisTimeoutSecs";

const SETTINGS: [&str; 9] = [
    KEY_VAULT_URI,
    COMP_VIS_ENDPOINT,
    COMP_VIS_KEY_SECRET_NAME,
    BLOB_ACCESS_STRATEGY,
    STORAGE_ACCOUNT_NAME,
    STORAGE_ACCOUNT_KEY_SECRET_NAME,
    MANAGED_IDENTITY_CLIENT_ID,
    SECRET_FETCH_TIMEOUT_SECS,
    ANALYSIS_TIMEOUT_SECS,
];

/// Errors raised while reading settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting '{0}'")]
    Missing(&'static str),
    #[error("invalid value for setting '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Settings as the environment source hands them over. The environment
/// source lowercases keys, so every field is renamed to the lowercased
/// setting name.
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(rename = "keyvaulturi")]
    key_vault_uri: Option<String>,

    #[serde(rename = "compvisendpoint")]
    comp_vis_endpoint: Option<String>,

    #[serde(rename = "compviskeysecretname")]
    comp_vis_key_secret_name: Option<String>,

    #[serde(rename = "blobaccessstrategy")]
    blob_access_strategy: Option<String>,

    #[serde(rename = "storageaccountname")]
    storage_account_name: Option<String>,

    #[serde(rename = "storageaccountkeysecretname")]
    storage_account_key_secret_name: Option<String>,

    #[serde(rename = "managedidentityclientid")]
    managed_identity_client_id: Option<String>,

    /// Per-attempt secret fetch timeout in seconds
    #[serde(rename = "secretfetchtimeoutsecs", default = "default_secret_fetch_timeout_secs")]
    secret_fetch_timeout_secs: u64,

    /// Analysis request timeout in seconds
    #[serde(rename = "analysistimeoutsecs", default = "default_analysis_timeout_secs")]
    analysis_timeout_secs: u64,
}

/// Settings needed to handle a blob-created event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfig {
    pub key_vault_uri: Url,
    pub comp_vis_endpoint: Url,
    pub comp_vis_key_secret_name: String,
    pub blob_access_strategy: Strategy,
    pub storage_account_name: Option<String>,
    pub storage_account_key_secret_name: String,
    pub managed_identity_client_id: Option<String>,
    pub secret_fetch_timeout: Duration,
    pub analysis_timeout: Duration,
}

impl FunctionConfig {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    /// Load settings from explicit name/value pairs instead of the process
    /// environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: Map<String, String> = vars
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self::load(Environment::default().source(Some(vars)))
    }

    fn load(source: Environment) -> Result<Self, ConfigError> {
        let raw: RawSettings = Config::builder()
            .add_source(source.ignore_empty(true))
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(invalid_settings)?;
        Self::validate(raw)
    }

    /// Required values, strategy parsing and URL checks on top of what
    /// deserialization already enforced. Blank values count as absent.
    fn validate(raw: RawSettings) -> Result<Self, ConfigError> {
        let key_vault_uri = parse_http_url(
            KEY_VAULT_URI,
            &present(raw.key_vault_uri).ok_or(ConfigError::Missing(KEY_VAULT_URI))?,
        )?;
        let comp_vis_endpoint = parse_http_url(
            COMP_VIS_ENDPOINT,
            &present(raw.comp_vis_endpoint).ok_or(ConfigError::Missing(COMP_VIS_ENDPOINT))?,
        )?;

        let blob_access_strategy = match present(raw.blob_access_strategy) {
            Some(value) => value.parse::<Strategy>().map_err(|reason| ConfigError::Invalid {
                name: BLOB_ACCESS_STRATEGY,
                reason,
            })?,
            None => Strategy::default(),
        };

        let storage_account_name = present(raw.storage_account_name);
        if blob_access_strategy == Strategy::GeneratedToken && storage_account_name.is_none() {
            return Err(ConfigError::Missing(STORAGE_ACCOUNT_NAME));
        }

        Ok(Self {
            key_vault_uri,
            comp_vis_endpoint,
            comp_vis_key_secret_name: present(raw.comp_vis_key_secret_name)
                .unwrap_or_else(default_comp_vis_key_secret_name),
            blob_access_strategy,
            storage_account_name,
            storage_account_key_secret_name: present(raw.storage_account_key_secret_name)
                .unwrap_or_else(default_storage_account_key_secret_name),
            managed_identity_client_id: present(raw.managed_identity_client_id),
            secret_fetch_timeout: timeout(SECRET_FETCH_TIMEOUT_SECS, raw.secret_fetch_timeout_secs)?,
            analysis_timeout: timeout(ANALYSIS_TIMEOUT_SECS, raw.analysis_timeout_secs)?,
        })
    }

    /// The slice of settings the access step works from.
    pub fn access_config(&self) -> AccessConfig {
        AccessConfig {
            strategy: self.blob_access_strategy,
            vault_uri: self.key_vault_uri.to_string(),
            analysis_key_secret: self.comp_vis_key_secret_name.clone(),
            storage_account: self.storage_account_name.clone(),
            account_key_secret: self.storage_account_key_secret_name.clone(),
        }
    }
}

fn default_comp_vis_key_secret_name() -> String {
    "CompVisKey".to_string()
}

fn default_storage_account_key_secret_name() -> String {
    "StorageAccountKey".to_string()
}

fn default_secret_fetch_timeout_secs() -> u64 {
    10
}

fn default_analysis_timeout_secs() -> u64 {
    30
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Map a deserialization failure back to the setting it came from.
fn invalid_settings(err: ::config::ConfigError) -> ConfigError {
    let name = match &err {
        ::config::ConfigError::Type { key: Some(key), .. } => SETTINGS
            .into_iter()
            .find(|name| key.eq_ignore_ascii_case(name)),
        _ => None,
    };
    ConfigError::Invalid {
        name: name.unwrap_or("environment"),
        reason: err.to_string(),
    }
}

fn parse_http_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("'{raw}' is not an absolute URL: {e}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn timeout(name: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}
