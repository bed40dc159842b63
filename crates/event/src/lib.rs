//! Frame Events notification layer
//!
//! This is where a storage change notification enters the system. The trigger
//! can hand us one of two envelopes for the very same logical event:
//!
//! - **Legacy** - the Event Grid schema (`eventType`, `topic`, `dataVersion`)
//! - **Current** - CloudEvents 1.0 (`specversion`, `type`, `source`)
//!
//! Both collapse into a single [`NotificationEvent`]. Blob created and blob
//! deleted system events get their `data` decoded into [`BlobChangeData`];
//! everything else is kept as-is under [`EventKind::Other`] with the raw type
//! name so nothing is silently dropped.
//!
//! ## Main entry point
//!
//! Call [`normalize`] with the decoded JSON (or [`normalize_json`] with the raw
//! text). The only failure is [`EventError::Malformed`], when neither envelope's
//! mandatory members are present.
//!
//! ## Example
//!
//! ```
//! use event::{normalize_json, EventKind};
//!
//! let raw = r#"{
//!     "specversion": "1.0",
//!     "type": "Microsoft.Storage.BlobDeleted",
//!     "source": "/subscriptions/s/resourceGroups/g/providers/Microsoft.Storage/storageAccounts/acct",
//!     "subject": "/blobServices/default/containers/cont/blobs/img.jpg",
//!     "id": "evt-1",
//!     "data": { "api": "DeleteBlob", "url": "https://acct.blob.core.windows.net/cont/img.jpg" }
//! }"#;
//!
//! let event = normalize_json(raw).unwrap();
//! assert!(matches!(event.kind, EventKind::BlobDeleted(_)));
//! ```
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

mod error;
mod types;
mod wire;

pub use crate::error::EventError;
pub use crate::types::{
    BlobChangeData, EventEncoding, EventKind, NotificationEvent, BLOB_CREATED, BLOB_DELETED,
};
pub use crate::wire::{CloudEventEnvelope, LegacyEnvelope, RawEvent};

/// Normalize a decoded JSON value in either envelope.
pub fn normalize(raw: Value) -> Result<NotificationEvent, EventError> {
    let missing = wire::missing_members(&raw);
    match serde_json::from_value::<RawEvent>(raw) {
        Ok(envelope) => {
            let event = NotificationEvent::from(envelope);
            debug!(
                encoding = %event.encoding,
                kind = event.kind.label(),
                event_type = %event.event_type,
                "event_normalized"
            );
            Ok(event)
        }
        Err(err) => {
            let reason = if missing.is_empty() {
                format!("unrecognized envelope: {err}")
            } else {
                format!("missing {}", missing.join(", "))
            };
            warn!(reason = %reason, "event_malformed");
            Err(EventError::Malformed(reason))
        }
    }
}

/// Normalize a notification from its JSON text.
pub fn normalize_json(raw: &str) -> Result<NotificationEvent, EventError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| EventError::Malformed(format!("invalid json: {err}")))?;
    normalize(value)
}

/// Derive the event kind from the type string and the payload shape.
///
/// A blob type whose `data` does not decode, or decodes without a `url`, is
/// not treated as a system event.
pub fn classify(event_type: &str, payload: &Value) -> EventKind {
    let blob_data = || {
        serde_json::from_value::<BlobChangeData>(payload.clone())
            .ok()
            .filter(|data| !data.url.is_empty())
    };

    if event_type.eq_ignore_ascii_case(BLOB_CREATED) {
        if let Some(data) = blob_data() {
            return EventKind::BlobCreated(data);
        }
    } else if event_type.eq_ignore_ascii_case(BLOB_DELETED) {
        if let Some(data) = blob_data() {
            return EventKind::BlobDeleted(data);
        }
    }
    EventKind::Other(event_type.to_string())
}

impl From<RawEvent> for NotificationEvent {
    fn from(raw: RawEvent) -> Self {
        match raw {
            RawEvent::Legacy(env) => {
                let kind = classify(&env.event_type, &env.data);
                NotificationEvent {
                    kind,
                    id: env.id,
                    subject: env.subject,
                    topic: env.topic.unwrap_or_default(),
                    event_type: env.event_type,
                    data_version: env.data_version.unwrap_or_default(),
                    event_time: parse_time(env.event_time.as_deref()),
                    encoding: EventEncoding::Legacy,
                    payload: env.data,
                }
            }
            RawEvent::CloudEvents(mut env) => {
                let payload = env.take_data();
                let kind = classify(&env.event_type, &payload);
                NotificationEvent {
                    kind,
                    id: env.id,
                    subject: env.subject,
                    topic: env.source.unwrap_or_default(),
                    event_type: env.event_type,
                    data_version: env.dataversion.unwrap_or_default(),
                    event_time: parse_time(env.time.as_deref()),
                    encoding: EventEncoding::CloudEvents,
                    payload,
                }
            }
        }
    }
}

fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(err) => {
            debug!(time = raw, error = %err, "event_time_unparsed");
            None
        }
    }
}
