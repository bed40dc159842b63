//! Event dispatcher.
//!
//! ```text
//! Received ─normalize─▶ Classified ─┬─▶ CreatedHandling ─┐
//!                                   ├─▶ DeletedHandling ─┼─▶ Completed
//!                                   └─▶ OtherHandling ───┘
//! ```
//!
//! The branch depends on nothing but the event kind. Only the created branch
//! asks the [`ServiceProvider`] for collaborators, so deleted and unknown
//! events are handled without configuration and without remote calls.
use std::sync::Arc;

use access::{build_strategy, select_strategy, AccessConfig, Clock, Strategy, SystemClock};
use analysis::{AnalysisRequest, ComputerVisionClient, ImageAnalyzer};
use event::{BlobChangeData, EventKind, NotificationEvent};
use secrets::{
    IdentitySource, KeyVaultClient, ManagedIdentityCredential, RetryPolicy, SecretRetriever,
    SecretStore,
};
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::FunctionConfig;
use crate::error::HandlerError;
use crate::facts::{Fact, FactSink};

/// Where an invocation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Received,
    Classified,
    CreatedHandling,
    DeletedHandling,
    OtherHandling,
    Completed,
}

/// Handling path taken for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Created,
    Deleted,
    Other,
}

impl Branch {
    pub fn of(kind: &EventKind) -> Self {
        match kind {
            EventKind::BlobCreated(_) => Branch::Created,
            EventKind::BlobDeleted(_) => Branch::Deleted,
            EventKind::Other(_) => Branch::Other,
        }
    }

    fn state(self) -> State {
        match self {
            Branch::Created => State::CreatedHandling,
            Branch::Deleted => State::DeletedHandling,
            Branch::Other => State::OtherHandling,
        }
    }
}

/// What the analysis said about faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceData {
    /// The result carried a face list (possibly empty).
    Present,
    /// The result carried no face data at all.
    Absent,
    /// No analysis ran for this event.
    NotRequested,
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub branch: Branch,
    pub strategy: Option<Strategy>,
    pub facts: Vec<Fact>,
    pub face_count: usize,
    pub face_data: FaceData,
}

/// Collaborators for the blob-created path.
#[derive(Clone)]
pub struct Services {
    pub access: AccessConfig,
    pub secrets: Arc<dyn SecretStore>,
    pub retry: RetryPolicy,
    pub analyzer: Arc<dyn ImageAnalyzer>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Real Key Vault, managed identity and Computer Vision clients for
    /// `config`. The HTTP client is built here, once per invocation.
    pub fn from_config(config: &FunctionConfig) -> Result<Self, HandlerError> {
        let http = reqwest::Client::builder()
            .timeout(config.secret_fetch_timeout)
            .build()
            .map_err(|e| HandlerError::Client(e.to_string()))?;

        let credential = ManagedIdentityCredential::new(http.clone(), IdentitySource::from_env())
            .with_client_id(config.managed_identity_client_id.clone());
        let vault = KeyVaultClient::new(http.clone(), Arc::new(credential))
            .with_timeout(config.secret_fetch_timeout);
        let analyzer = ComputerVisionClient::new(http, config.comp_vis_endpoint.clone())
            .with_timeout(config.analysis_timeout);

        Ok(Self {
            access: config.access_config(),
            secrets: Arc::new(vault),
            retry: RetryPolicy::default(),
            analyzer: Arc::new(analyzer),
            clock: Arc::new(SystemClock),
        })
    }
}

/// Supplies [`Services`] when, and only when, an event needs them.
pub trait ServiceProvider: Send + Sync {
    fn services(&self) -> Result<Services, HandlerError>;
}

impl ServiceProvider for Services {
    fn services(&self) -> Result<Services, HandlerError> {
        Ok(self.clone())
    }
}

/// Reads [`FunctionConfig`] from the environment on demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvServices;

impl ServiceProvider for EnvServices {
    fn services(&self) -> Result<Services, HandlerError> {
        let config = FunctionConfig::from_env()?;
        Services::from_config(&config)
    }
}

/// Emits facts to the sink and keeps a copy for the outcome.
struct FactLog<'a> {
    sink: &'a dyn FactSink,
    facts: Vec<Fact>,
}

impl FactLog<'_> {
    fn push(&mut self, fact: Fact) {
        self.sink.emit(&fact);
        self.facts.push(fact);
    }
}

fn enter(state: State) {
    debug!(state = ?state, "dispatch_state");
}

pub struct Dispatcher<'a> {
    provider: &'a dyn ServiceProvider,
    sink: &'a dyn FactSink,
}

impl<'a> Dispatcher<'a> {
    pub fn new(provider: &'a dyn ServiceProvider, sink: &'a dyn FactSink) -> Self {
        Self { provider, sink }
    }

    /// Normalize a raw event and dispatch it.
    pub async fn handle(&self, raw: Value) -> Result<DispatchOutcome, HandlerError> {
        enter(State::Received);
        let event = event::normalize(raw)?;
        self.dispatch(&event).await
    }

    /// Normalize an event from its JSON text and dispatch it. Text that is not
    /// JSON fails as a malformed event.
    pub async fn handle_json(&self, raw: &str) -> Result<DispatchOutcome, HandlerError> {
        enter(State::Received);
        let event = event::normalize_json(raw)?;
        self.dispatch(&event).await
    }

    /// Dispatch an already normalized event.
    pub async fn dispatch(&self, event: &NotificationEvent) -> Result<DispatchOutcome, HandlerError> {
        let span = info_span!(
            "dispatch",
            event_type = %event.event_type,
            subject = %event.subject,
            id = event.id.as_deref().unwrap_or(""),
        );
        async {
            info!(
                event_type = event.event_type.as_str(),
                subject = event.subject.as_str(),
                topic = event.topic.as_str(),
                id = event.id.as_deref().unwrap_or(""),
                encoding = %event.encoding,
                "event_received"
            );

            let branch = Branch::of(&event.kind);
            enter(State::Classified);
            debug!(branch = ?branch, kind = event.kind.label(), "event_classified");
            enter(branch.state());

            let mut log = FactLog {
                sink: self.sink,
                facts: Vec::new(),
            };
            let result = match &event.kind {
                EventKind::BlobCreated(data) => self.handle_created(data, &mut log).await,
                EventKind::BlobDeleted(data) => {
                    log.push(blob_metadata(data));
                    Ok((None, 0, FaceData::NotRequested))
                }
                EventKind::Other(event_type) => {
                    log.push(Fact::OtherEvent {
                        event_type: event_type.clone(),
                        subject: event.subject.clone(),
                        topic: event.topic.clone(),
                        payload: event.payload_text(),
                    });
                    Ok((None, 0, FaceData::NotRequested))
                }
            };

            match result {
                Ok((strategy, face_count, face_data)) => {
                    enter(State::Completed);
                    info!(facts = log.facts.len(), face_count, "dispatch_success");
                    Ok(DispatchOutcome {
                        branch,
                        strategy,
                        facts: log.facts,
                        face_count,
                        face_data,
                    })
                }
                Err(err) => {
                    warn!(error_kind = err.kind(), error = %err, "dispatch_failure");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn handle_created(
        &self,
        data: &BlobChangeData,
        log: &mut FactLog<'_>,
    ) -> Result<(Option<Strategy>, usize, FaceData), HandlerError> {
        log.push(blob_metadata(data));

        let services = self.provider.services()?;
        let strategy = select_strategy(&services.access);
        log.push(Fact::AccessStrategy { strategy });

        let retriever = SecretRetriever::new(services.secrets.clone()).with_policy(services.retry);
        let access = build_strategy(&services.access, retriever, services.clock.clone())?;
        let descriptor = access.prepare(&data.url).await?;

        let request =
            AnalysisRequest::faces(descriptor.image_url, descriptor.analysis_key.expose());
        let result = services.analyzer.analyze(&request).await?;

        let (face_count, face_data) = match result.faces {
            Some(faces) => {
                let count = faces.len();
                for (index, face) in faces.into_iter().enumerate() {
                    log.push(Fact::Face {
                        index,
                        gender: face.gender,
                        age: face.age,
                        rectangle: face.rectangle,
                    });
                }
                (count, FaceData::Present)
            }
            None => {
                debug!("analysis_without_face_data");
                (0, FaceData::Absent)
            }
        };

        Ok((Some(strategy), face_count, face_data))
    }
}

fn blob_metadata(data: &BlobChangeData) -> Fact {
    Fact::BlobMetadata {
        api: data.api.clone(),
        content_type: data.content_type.clone(),
        sequencer: data.sequencer.clone(),
        url: data.url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::Mutex;

    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;
    use crate::facts::MemorySink;

    type Fields = Arc<Mutex<Vec<(String, String)>>>;

    /// Records the fields of every `dispatch` span.
    struct DispatchSpanFields(Fields);

    impl<S: Subscriber> Layer<S> for DispatchSpanFields {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            if attrs.metadata().name() == "dispatch" {
                attrs.record(&mut FieldRecorder(self.0.clone()));
            }
        }
    }

    struct FieldRecorder(Fields);

    impl Visit for FieldRecorder {
        fn record_str(&mut self, field: &Field, value: &str) {
            if let Ok(mut fields) = self.0.lock() {
                fields.push((field.name().to_string(), value.to_string()));
            }
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if let Ok(mut fields) = self.0.lock() {
                fields.push((field.name().to_string(), format!("{value:?}")));
            }
        }
    }

    #[test]
    fn dispatch_span_carries_event_id() {
        let fields = Fields::default();
        let subscriber =
            tracing_subscriber::registry().with(DispatchSpanFields(fields.clone()));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        let sink = MemorySink::new();
        let outcome = tracing::subscriber::with_default(subscriber, || {
            runtime.block_on(Dispatcher::new(&EnvServices, &sink).handle(serde_json::json!({
                "id": "evt-42",
                "eventType": "Custom.Ping",
                "subject": "ping",
                "topic": "/custom",
                "data": {}
            })))
        })
        .unwrap();
        assert_eq!(outcome.branch, Branch::Other);

        let fields = fields.lock().unwrap().clone();
        assert!(fields.contains(&("id".to_string(), "evt-42".to_string())));
        assert!(fields.contains(&("event_type".to_string(), "Custom.Ping".to_string())));
        assert!(fields.contains(&("subject".to_string(), "ping".to_string())));
    }

    #[test]
    fn branch_follows_kind() {
        assert_eq!(Branch::of(&EventKind::Other("Custom.Ping".into())), Branch::Other);
        assert_eq!(
            Branch::of(&EventKind::BlobDeleted(BlobChangeData::default())),
            Branch::Deleted
        );
        assert_eq!(Branch::Created.state(), State::CreatedHandling);
    }

    #[test]
    fn services_build_from_config() {
        let config = FunctionConfig::from_vars([
            ("KeyVaultUri", "https://kv.vault.azure.net/"),
            ("CompVisEndpoint", "https://cv.example.com/"),
        ])
        .unwrap();
        let services = Services::from_config(&config).unwrap();
        assert_eq!(services.access.strategy, Strategy::AmbientIdentity);
        assert_eq!(services.retry, RetryPolicy::default());
    }
}
