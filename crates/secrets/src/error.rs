use thiserror::Error;

/// Outcome of a single failed read against the secret store.
///
/// Only [`Transient`](FetchError::Transient) is worth another attempt; the
/// other two mean the answer will not change on a retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network trouble, timeouts, throttling, 5xx.
    #[error("transient failure: {0}")]
    Transient(String),
    /// The vault answered and the secret does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The identity was rejected, or the request was refused outright.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    /// Classify an HTTP status returned by the vault or the identity endpoint.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body}")
        };
        match status {
            404 => FetchError::NotFound(detail),
            408 | 429 | 500..=599 => FetchError::Transient(detail),
            _ => FetchError::Forbidden(detail),
        }
    }

    /// Classify a transport-level failure. Anything that never produced a
    /// response is transient.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return FetchError::from_status(status.as_u16(), "");
        }
        if err.is_timeout() {
            FetchError::Transient(format!("request timed out: {err}"))
        } else {
            FetchError::Transient(format!("request failed: {err}"))
        }
    }
}

/// Which flavour of unavailability a [`SecretError`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretErrorKind {
    Transient,
    NotFound,
    Forbidden,
}

/// The secret could not be obtained.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// Every attempt failed transiently; carries the last cause.
    #[error("secret '{name}' unavailable after {attempts} attempts")]
    Transient {
        name: String,
        attempts: u32,
        #[source]
        last: FetchError,
    },
    #[error("secret '{name}' not found")]
    NotFound {
        name: String,
        #[source]
        cause: FetchError,
    },
    #[error("access to secret '{name}' forbidden")]
    Forbidden {
        name: String,
        #[source]
        cause: FetchError,
    },
}

impl SecretError {
    pub fn kind(&self) -> SecretErrorKind {
        match self {
            SecretError::Transient { .. } => SecretErrorKind::Transient,
            SecretError::NotFound { .. } => SecretErrorKind::NotFound,
            SecretError::Forbidden { .. } => SecretErrorKind::Forbidden,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SecretError::Transient { name, .. }
            | SecretError::NotFound { name, .. }
            | SecretError::Forbidden { name, .. } => name,
        }
    }

    /// Lift the final fetch failure into the public error.
    pub(crate) fn from_fetch(name: &str, attempts: u32, err: FetchError) -> Self {
        let name = name.to_string();
        match err {
            FetchError::Transient(_) => SecretError::Transient {
                name,
                attempts,
                last: err,
            },
            FetchError::NotFound(_) => SecretError::NotFound { name, cause: err },
            FetchError::Forbidden(_) => SecretError::Forbidden { name, cause: err },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(FetchError::from_status(404, ""), FetchError::NotFound(_)));
        assert!(matches!(FetchError::from_status(403, ""), FetchError::Forbidden(_)));
        assert!(matches!(FetchError::from_status(401, ""), FetchError::Forbidden(_)));
        assert!(matches!(FetchError::from_status(400, ""), FetchError::Forbidden(_)));
        assert!(matches!(FetchError::from_status(429, ""), FetchError::Transient(_)));
        assert!(matches!(FetchError::from_status(408, ""), FetchError::Transient(_)));
        assert!(matches!(FetchError::from_status(503, ""), FetchError::Transient(_)));
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(FetchError::Transient("x".into()).is_retryable());
        assert!(!FetchError::NotFound("x".into()).is_retryable());
        assert!(!FetchError::Forbidden("x".into()).is_retryable());
    }

    #[test]
    fn status_detail_includes_body() {
        let err = FetchError::from_status(503, "busy");
        assert_eq!(err.to_string(), "transient failure: HTTP 503: busy");
    }

    #[test]
    fn transient_wraps_last_cause() {
        let err = SecretError::from_fetch("CompVisKey", 5, FetchError::Transient("HTTP 503".into()));
        assert_eq!(err.kind(), SecretErrorKind::Transient);
        assert_eq!(err.name(), "CompVisKey");
        assert!(err.to_string().contains("after 5 attempts"));
        let source = err.source().expect("has cause");
        assert!(source.to_string().contains("HTTP 503"));
    }

    #[test]
    fn non_transient_kinds_preserved() {
        let nf = SecretError::from_fetch("a", 1, FetchError::NotFound("HTTP 404".into()));
        let fb = SecretError::from_fetch("b", 1, FetchError::Forbidden("HTTP 403".into()));
        assert_eq!(nf.kind(), SecretErrorKind::NotFound);
        assert_eq!(fb.kind(), SecretErrorKind::Forbidden);
    }
}
