//! Blob change notification handler.
//!
//! One storage event in, one [`DispatchOutcome`] out:
//!
//! ```text
//! raw JSON ─▶ event::normalize ─▶ Dispatcher
//!                                  ├─ BlobCreated ─▶ access strategy ─▶ secrets ─▶ analysis ─▶ facts
//!                                  ├─ BlobDeleted ─▶ facts
//!                                  └─ Other       ─▶ facts
//! ```
//!
//! Facts go to a [`FactSink`]; the binary uses [`TracingSink`].
//!
//! ```rust
//! use frame_events::{Branch, Dispatcher, EnvServices, Fact, MemorySink};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let sink = MemorySink::new();
//! let dispatcher = Dispatcher::new(&EnvServices, &sink);
//! let outcome = dispatcher
//!     .handle(serde_json::json!({
//!         "specversion": "1.0",
//!         "type": "Custom.Ping",
//!         "source": "/custom",
//!         "subject": "ping",
//!         "id": "1",
//!         "data": {"n": 1}
//!     }))
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.branch, Branch::Other);
//! assert!(matches!(&outcome.facts[0], Fact::OtherEvent { payload, .. } if payload == r#"{"n":1}"#));
//! # });
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod facts;
pub mod telemetry;

pub use crate::config::{ConfigError, FunctionConfig};
pub use crate::dispatch::{
    Branch, DispatchOutcome, Dispatcher, EnvServices, FaceData, ServiceProvider, Services, State,
};
pub use crate::error::HandlerError;
pub use crate::facts::{Fact, FactSink, MemorySink, TracingSink};
pub use crate::telemetry::{init_tracing, LogFormat};
