//! How the image-analysis service gets to read the blob an event names.
//!
//! Two strategies, chosen by [`select_strategy`] from configuration alone:
//!
//! - [`Strategy::AmbientIdentity`] hands the URL over untouched and fetches
//!   only the analysis key.
//! - [`Strategy::GeneratedToken`] also fetches the storage account key and
//!   appends a read-only, single-blob SAS that expires five minutes after it
//!   was signed.
//!
//! ```rust
//! use access::{select_strategy, AccessConfig, Strategy};
//!
//! let config = AccessConfig::new("https://kv.vault.azure.net");
//! assert_eq!(select_strategy(&config), Strategy::AmbientIdentity);
//! ```

pub mod error;
pub mod location;
pub mod sas;
pub mod strategy;

pub use error::AccessError;
pub use location::BlobLocation;
pub use sas::{default_grant_ttl, sign_blob_read, string_to_sign, BlobSas, SAS_VERSION};
pub use strategy::{
    build_strategy, select_strategy, AccessConfig, AccessDescriptor, AccessStrategy,
    AmbientIdentityAccess, Clock, FixedClock, GeneratedTokenAccess, Strategy, SystemClock,
};
