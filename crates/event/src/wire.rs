//! The two envelopes a notification can arrive in.
//!
//! The legacy one is the Event Grid schema, the current one is CloudEvents 1.0
//! in structured JSON mode. Both decode into [`RawEvent`]; nothing outside this
//! crate touches these structs.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event Grid schema envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    pub subject: String,
    pub event_type: String,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub data_version: Option<String>,
    #[serde(default)]
    pub metadata_version: Option<String>,
}

/// CloudEvents 1.0 structured-mode envelope.
///
/// `dataversion` is not a core attribute; Event Grid forwards it as an
/// extension when the publisher sets one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudEventEnvelope {
    pub specversion: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub subject: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub data_base64: Option<String>,
    #[serde(default)]
    pub datacontenttype: Option<String>,
    #[serde(default)]
    pub dataschema: Option<String>,
    #[serde(default)]
    pub dataversion: Option<String>,
}

impl CloudEventEnvelope {
    /// `data` wins over `data_base64`; the encoded form is kept as a string.
    pub(crate) fn take_data(&mut self) -> Value {
        match (self.data.take(), self.data_base64.take()) {
            (Some(data), _) => data,
            (None, Some(encoded)) => Value::String(encoded),
            (None, None) => Value::Null,
        }
    }
}

/// Either envelope. CloudEvents is tried first because `specversion` is a
/// required member there and never appears in the legacy schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawEvent {
    CloudEvents(CloudEventEnvelope),
    Legacy(LegacyEnvelope),
}

/// Names the mandatory members a JSON object is missing, for error messages.
pub(crate) fn missing_members(value: &Value) -> Vec<&'static str> {
    let Some(obj) = value.as_object() else {
        return vec!["eventType", "subject"];
    };
    let has_str = |key: &str| obj.get(key).is_some_and(Value::is_string);

    let mut missing = Vec::new();
    if !has_str("eventType") && !has_str("type") {
        missing.push("eventType");
    }
    if !has_str("subject") {
        missing.push("subject");
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cloud_event_preferred_when_specversion_present() {
        let raw: RawEvent = serde_json::from_value(json!({
            "specversion": "1.0",
            "type": "Custom.Ping",
            "source": "/custom",
            "subject": "ping",
            "id": "42"
        }))
        .unwrap();
        assert!(matches!(raw, RawEvent::CloudEvents(_)));
    }

    #[test]
    fn legacy_envelope_without_data_defaults_to_null() {
        let raw: RawEvent = serde_json::from_value(json!({
            "eventType": "Custom.Ping",
            "subject": "ping"
        }))
        .unwrap();
        match raw {
            RawEvent::Legacy(env) => assert_eq!(env.data, Value::Null),
            other => panic!("expected legacy envelope, got {other:?}"),
        }
    }

    #[test]
    fn base64_data_kept_as_text() {
        let mut env: CloudEventEnvelope = serde_json::from_value(json!({
            "specversion": "1.0",
            "type": "Custom.Bytes",
            "subject": "bytes",
            "data_base64": "aGVsbG8="
        }))
        .unwrap();
        assert_eq!(env.take_data(), json!("aGVsbG8="));
    }

    #[test]
    fn missing_members_reports_both() {
        assert_eq!(missing_members(&json!({"data": {}})), vec!["eventType", "subject"]);
        assert_eq!(missing_members(&json!({"type": "x"})), vec!["subject"]);
        assert_eq!(missing_members(&json!([1, 2])), vec!["eventType", "subject"]);
    }
}
