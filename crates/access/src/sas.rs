//! Read-only service SAS for a single blob.
//!
//! The grant is scoped to one blob (`sr=b`), read permission only (`sp=r`),
//! HTTPS only, and expires a fixed time after generation. The signature is an
//! HMAC-SHA256 over the service-SAS string-to-sign using the decoded account
//! key.
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::error::AccessError;
use crate::location::BlobLocation;

type HmacSha256 = Hmac<Sha256>;

pub const SAS_VERSION: &str = "2020-12-06";

/// Lifetime of a generated grant.
pub fn default_grant_ttl() -> TimeDelta {
    TimeDelta::minutes(5)
}

/// A signed grant ready to be appended to the blob URL.
#[derive(Clone, PartialEq, Eq)]
pub struct BlobSas {
    pub expires_at: DateTime<Utc>,
    signature: String,
}

impl std::fmt::Debug for BlobSas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobSas")
            .field("expires_at", &self.expires_at)
            .field("signature", &"***")
            .finish()
    }
}

fn sas_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

impl BlobSas {
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Query parameters in the order they are appended.
    pub fn query_pairs(&self) -> [(&'static str, String); 6] {
        [
            ("sv", SAS_VERSION.to_string()),
            ("se", sas_time(&self.expires_at)),
            ("sr", "b".to_string()),
            ("sp", "r".to_string()),
            ("spr", "https".to_string()),
            ("sig", self.signature.clone()),
        ]
    }

    /// `url` with the grant appended as its query string.
    pub fn apply(&self, url: &Url) -> Url {
        let mut signed = url.clone();
        {
            let mut query = signed.query_pairs_mut();
            for (key, value) in self.query_pairs() {
                query.append_pair(key, &value);
            }
        }
        signed
    }
}

/// Service-SAS string-to-sign for a read-only blob grant.
pub fn string_to_sign(location: &BlobLocation, expires_at: &DateTime<Utc>) -> String {
    let expiry = sas_time(expires_at);
    let resource = location.canonical_resource();
    [
        "r",               // signed permissions
        "",                // signed start
        expiry.as_str(),   // signed expiry
        resource.as_str(), // canonicalized resource
        "",                // signed identifier
        "",                // signed ip
        "https",           // signed protocol
        SAS_VERSION,       // signed version
        "b",               // signed resource
        "",                // snapshot time
        "",                // encryption scope
        "",                // rscc
        "",                // rscd
        "",                // rsce
        "",                // rscl
        "",                // rsct
    ]
    .join("\n")
}

/// Sign a read grant for `location` valid for `ttl` from `now`.
pub fn sign_blob_read(
    location: &BlobLocation,
    account_key: &str,
    now: DateTime<Utc>,
    ttl: TimeDelta,
) -> Result<BlobSas, AccessError> {
    let key = general_purpose::STANDARD
        .decode(account_key.trim())
        .map_err(|_| AccessError::InvalidAccountKey)?;
    if key.is_empty() {
        return Err(AccessError::InvalidAccountKey);
    }

    let expires_at = now + ttl;
    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| AccessError::InvalidAccountKey)?;
    mac.update(string_to_sign(location, &expires_at).as_bytes());
    let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    Ok(BlobSas {
        expires_at,
        signature,
    })
}
