//! Error surface of the event crate.
//!
//! There is exactly one way to fail: the input belongs to neither envelope.
//! Unknown event types and undecodable payloads are not errors, they come out
//! as [`EventKind::Other`](crate::EventKind::Other).
use thiserror::Error;

/// Errors produced while normalizing an incoming notification.
///
/// ```rust
/// use event::EventError;
///
/// let err = EventError::Malformed("missing subject".into());
/// assert_eq!(err.to_string(), "malformed event: missing subject");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventError {
    /// Neither the legacy nor the current envelope's mandatory members
    /// (`eventType`, `subject`) could be found, or the input is not JSON.
    #[error("malformed event: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_carries_reason() {
        let err = EventError::Malformed("missing eventType, subject".into());
        assert!(err.to_string().contains("missing eventType, subject"));
    }

    #[test]
    fn errors_are_comparable() {
        assert_eq!(
            EventError::Malformed("a".into()),
            EventError::Malformed("a".into())
        );
        assert_ne!(
            EventError::Malformed("a".into()),
            EventError::Malformed("b".into())
        );
    }
}
