use access::AccessError;
use analysis::AnalysisError;
use event::EventError;
use secrets::{SecretError, SecretErrorKind};
use thiserror::Error;

use crate::config::ConfigError;

/// Why an invocation failed.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("event could not be decoded")]
    Event(#[from] EventError),

    #[error("configuration error")]
    Config(#[from] ConfigError),

    #[error("secret retrieval failed")]
    Secret(#[from] SecretError),

    #[error("blob access could not be prepared")]
    Access(#[from] AccessError),

    #[error("image analysis failed")]
    Analysis(#[from] AnalysisError),

    #[error("http client could not be built: {0}")]
    Client(String),
}

impl HandlerError {
    /// Stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::Event(_) => "malformed_event",
            HandlerError::Config(ConfigError::Missing(_)) => "config_missing",
            HandlerError::Config(ConfigError::Invalid { .. }) => "config_invalid",
            HandlerError::Secret(err) | HandlerError::Access(AccessError::Secret(err)) => {
                secret_kind(err)
            }
            HandlerError::Access(AccessError::UrlParse { .. }) => "access_url_parse",
            HandlerError::Access(AccessError::AccountMismatch { .. }) => "access_account_mismatch",
            HandlerError::Access(AccessError::InvalidAccountKey) => "access_invalid_account_key",
            HandlerError::Access(_) => "access_misconfigured",
            HandlerError::Analysis(AnalysisError::Service { .. }) => "analysis_service",
            HandlerError::Analysis(AnalysisError::Transport(_)) => "analysis_transport",
            HandlerError::Analysis(_) => "analysis_invalid_response",
            HandlerError::Client(_) => "http_client",
        }
    }
}

fn secret_kind(err: &SecretError) -> &'static str {
    match err.kind() {
        SecretErrorKind::Transient => "secret_transient",
        SecretErrorKind::NotFound => "secret_not_found",
        SecretErrorKind::Forbidden => "secret_forbidden",
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use secrets::FetchError;

    use super::*;

    #[test]
    fn kinds_are_stable() {
        let not_found = SecretError::NotFound {
            name: "CompVisKey".into(),
            cause: FetchError::NotFound("HTTP 404".into()),
        };
        assert_eq!(HandlerError::from(not_found.clone()).kind(), "secret_not_found");
        assert_eq!(
            HandlerError::from(AccessError::Secret(not_found)).kind(),
            "secret_not_found"
        );
        assert_eq!(
            HandlerError::from(ConfigError::Missing("KeyVaultUri")).kind(),
            "config_missing"
        );
        assert_eq!(
            HandlerError::from(AnalysisError::Transport("refused".into())).kind(),
            "analysis_transport"
        );
        assert_eq!(
            HandlerError::from(EventError::Malformed("x".into())).kind(),
            "malformed_event"
        );
    }

    #[test]
    fn source_chain_reaches_the_cause() {
        let err = HandlerError::from(ConfigError::Missing("CompVisEndpoint"));
        assert_eq!(err.to_string(), "configuration error");
        assert_eq!(
            err.source().unwrap().to_string(),
            "missing required setting 'CompVisEndpoint'"
        );
    }
}
