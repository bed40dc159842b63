use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnalysisError {
    /// The service answered with a 4xx/5xx.
    #[error("analysis service returned HTTP {status}{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Service {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// No response: connection failure or timeout.
    #[error("analysis request failed: {0}")]
    Transport(String),
    /// A 2xx whose body could not be decoded.
    #[error("invalid analysis response: {0}")]
    InvalidResponse(String),
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Wrapped { error: ErrorDetail },
    Flat(ErrorDetail),
}

impl AnalysisError {
    /// Build a [`Service`](AnalysisError::Service) error, decoding the
    /// service's error body when it has the usual shape.
    pub fn from_response(status: u16, body: &str) -> Self {
        let detail = match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody::Wrapped { error }) | Ok(ErrorBody::Flat(error)) => Some(error),
            Err(_) => None,
        };
        let (code, message) = match detail {
            Some(ErrorDetail { code, message }) if code.is_some() || message.is_some() => {
                (code, message.unwrap_or_default())
            }
            _ => (None, body.trim().to_string()),
        };
        AnalysisError::Service {
            status,
            code,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wrapped_error_body() {
        let err = AnalysisError::from_response(
            400,
            r#"{"error":{"code":"InvalidImageUrl","message":"Image URL is badly formatted."}}"#,
        );
        assert_eq!(
            err,
            AnalysisError::Service {
                status: 400,
                code: Some("InvalidImageUrl".into()),
                message: "Image URL is badly formatted.".into()
            }
        );
        assert_eq!(
            err.to_string(),
            "analysis service returned HTTP 400 (InvalidImageUrl): Image URL is badly formatted."
        );
    }

    #[test]
    fn decodes_flat_error_body() {
        let err = AnalysisError::from_response(401, r#"{"code":"401","message":"Access denied"}"#);
        assert!(matches!(err, AnalysisError::Service { code: Some(c), .. } if c == "401"));
    }

    #[test]
    fn falls_back_to_raw_body() {
        let err = AnalysisError::from_response(502, "Bad Gateway");
        assert_eq!(err.to_string(), "analysis service returned HTTP 502: Bad Gateway");
    }
}
