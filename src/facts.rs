//! Log-worthy facts and where they go.
use std::sync::Mutex;

use access::Strategy;
use analysis::FaceRectangle;
use serde::Serialize;
use tracing::info;

/// One structured record produced while handling an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum Fact {
    BlobMetadata {
        api: String,
        content_type: String,
        sequencer: String,
        url: String,
    },
    AccessStrategy {
        strategy: Strategy,
    },
    Face {
        index: usize,
        gender: String,
        age: u32,
        rectangle: FaceRectangle,
    },
    OtherEvent {
        event_type: String,
        subject: String,
        topic: String,
        payload: String,
    },
}

impl Fact {
    pub fn name(&self) -> &'static str {
        match self {
            Fact::BlobMetadata { .. } => "blob_metadata",
            Fact::AccessStrategy { .. } => "access_strategy",
            Fact::Face { .. } => "face",
            Fact::OtherEvent { .. } => "other_event",
        }
    }
}

pub trait FactSink: Send + Sync {
    fn emit(&self, fact: &Fact);
}

/// Writes each fact as one `info` record with the fact's fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl FactSink for TracingSink {
    fn emit(&self, fact: &Fact) {
        match fact {
            Fact::BlobMetadata {
                api,
                content_type,
                sequencer,
                url,
            } => info!(
                fact = fact.name(),
                api = api.as_str(),
                content_type = content_type.as_str(),
                sequencer = sequencer.as_str(),
                url = url.as_str(),
                "blob_metadata"
            ),
            Fact::AccessStrategy { strategy } => {
                info!(fact = fact.name(), strategy = %strategy, "access_strategy")
            }
            Fact::Face {
                index,
                gender,
                age,
                rectangle,
            } => info!(
                fact = fact.name(),
                index,
                gender = gender.as_str(),
                age,
                left = rectangle.left,
                top = rectangle.top,
                width = rectangle.width,
                height = rectangle.height,
                "face_detected"
            ),
            Fact::OtherEvent {
                event_type,
                subject,
                topic,
                payload,
            } => info!(
                fact = fact.name(),
                event_type = event_type.as_str(),
                subject = subject.as_str(),
                topic = topic.as_str(),
                payload = payload.as_str(),
                "other_event"
            ),
        }
    }
}

/// Keeps every fact it is given, in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    facts: Mutex<Vec<Fact>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facts(&self) -> Vec<Fact> {
        self.facts
            .lock()
            .map(|facts| facts.clone())
            .unwrap_or_default()
    }
}

impl FactSink for MemorySink {
    fn emit(&self, fact: &Fact) {
        if let Ok(mut facts) = self.facts.lock() {
            facts.push(fact.clone());
        }
    }
}
