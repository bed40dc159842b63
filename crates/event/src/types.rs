//! Canonical event model.
//!
//! Whatever envelope the trigger hands us, downstream code only ever sees a
//! [`NotificationEvent`]. The wire shapes live in [`crate::wire`] and stop there.
//!
//! ```text
//! NotificationEvent
//! ├── kind: EventKind
//! │   ├── BlobCreated(BlobChangeData)
//! │   ├── BlobDeleted(BlobChangeData)
//! │   └── Other(String)          raw event type, kept for diagnostics
//! ├── id: Option<String>
//! ├── subject / topic / event_type / data_version: String
//! ├── event_time: Option<DateTime<Utc>>
//! ├── encoding: EventEncoding     not part of equality
//! └── payload: serde_json::Value  untouched `data`
//! ```
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type string for a blob write.
pub const BLOB_CREATED: &str = "Microsoft.Storage.BlobCreated";
/// Event type string for a blob removal.
pub const BLOB_DELETED: &str = "Microsoft.Storage.BlobDeleted";

/// Payload shared by blob created and blob deleted notifications.
///
/// Only `url` is guaranteed non-empty; the other string fields default to
/// empty when the source system leaves them out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlobChangeData {
    /// Storage operation that produced the event, e.g. `PutBlob` or `DeleteBlob`.
    #[serde(default)]
    pub api: String,
    #[serde(default)]
    pub content_type: String,
    /// Opaque ordering token from the storage service. Never interpreted.
    #[serde(default)]
    pub sequencer: String,
    /// Absolute address of the object.
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_type: Option<String>,
    #[serde(default, rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Closed set of event kinds the dispatcher knows how to route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventKind {
    BlobCreated(BlobChangeData),
    BlobDeleted(BlobChangeData),
    /// Anything else, carrying the raw event type name.
    Other(String),
}

impl EventKind {
    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::BlobCreated(_) => "blob_created",
            EventKind::BlobDeleted(_) => "blob_deleted",
            EventKind::Other(_) => "other",
        }
    }

    /// Blob payload for created/deleted events.
    pub fn blob_data(&self) -> Option<&BlobChangeData> {
        match self {
            EventKind::BlobCreated(data) | EventKind::BlobDeleted(data) => Some(data),
            EventKind::Other(_) => None,
        }
    }
}

/// Which envelope an event arrived in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventEncoding {
    /// Event Grid schema (`eventType`, `topic`, `dataVersion`, ...).
    Legacy,
    /// CloudEvents 1.0 JSON (`specversion`, `type`, `source`, ...).
    CloudEvents,
}

impl fmt::Display for EventEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventEncoding::Legacy => f.write_str("legacy"),
            EventEncoding::CloudEvents => f.write_str("cloudevents"),
        }
    }
}

/// A storage notification after normalization.
///
/// Equality ignores [`encoding`](Self::encoding): the same logical event
/// compares equal no matter which envelope carried it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub id: Option<String>,
    pub subject: String,
    pub topic: String,
    pub event_type: String,
    pub data_version: String,
    pub event_time: Option<DateTime<Utc>>,
    pub encoding: EventEncoding,
    pub payload: serde_json::Value,
}

impl NotificationEvent {
    /// The payload rendered as compact JSON, for the diagnostic branch.
    pub fn payload_text(&self) -> String {
        match &self.payload {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for NotificationEvent {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.id == other.id
            && self.subject == other.subject
            && self.topic == other.topic
            && self.event_type == other.event_type
            && self.data_version == other.data_version
            && self.event_time == other.event_time
            && self.payload == other.payload
    }
}

impl Eq for NotificationEvent {}
