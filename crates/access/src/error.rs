use secrets::SecretError;
use thiserror::Error;

/// Errors raised while preparing access to a blob.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessError {
    /// The event URL does not name an account, a container and a blob.
    #[error("cannot parse blob url '{url}': {reason}")]
    UrlParse { url: String, reason: String },
    /// The blob lives in a different storage account than the configured one.
    #[error("blob account '{found}' does not match configured account '{expected}'")]
    AccountMismatch { expected: String, found: String },
    /// The account key is not valid base64.
    #[error("storage account key is not valid base64")]
    InvalidAccountKey,
    /// `GeneratedToken` was requested without a storage account name.
    #[error("storage account name is required for generated token access")]
    MissingAccount,
    #[error(transparent)]
    Secret(#[from] SecretError),
}

impl AccessError {
    pub(crate) fn url_parse(url: &str, reason: impl Into<String>) -> Self {
        AccessError::UrlParse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}
