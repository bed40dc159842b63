use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::AccessError;

/// Account, container and blob named by a blob URL of the form
/// `https://{account}.blob.../{container}/{blob path}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocation {
    pub account: String,
    /// Container name, percent-decoded.
    pub container: String,
    /// Blob path inside the container, `/` separated and percent-decoded.
    pub blob: String,
    url: Url,
}

impl BlobLocation {
    pub fn parse(raw: &str) -> Result<Self, AccessError> {
        let url = Url::parse(raw).map_err(|e| AccessError::url_parse(raw, e.to_string()))?;

        let host = url
            .host_str()
            .ok_or_else(|| AccessError::url_parse(raw, "missing host"))?;
        let account = host
            .split('.')
            .next()
            .filter(|label| !label.is_empty())
            .ok_or_else(|| AccessError::url_parse(raw, "missing account"))?
            .to_string();

        let path = url.path().trim_start_matches('/');
        let (container, blob) = path
            .split_once('/')
            .ok_or_else(|| AccessError::url_parse(raw, "missing blob name"))?;
        if container.is_empty() {
            return Err(AccessError::url_parse(raw, "missing container"));
        }
        if blob.is_empty() {
            return Err(AccessError::url_parse(raw, "missing blob name"));
        }

        let decode = |segment: &str| {
            percent_decode_str(segment)
                .decode_utf8()
                .map(|name| name.into_owned())
                .map_err(|_| AccessError::url_parse(raw, "path is not valid UTF-8"))
        };

        Ok(Self {
            account,
            container: decode(container)?,
            blob: decode(blob)?,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Resource string signed into a service SAS. Uses the decoded names.
    pub fn canonical_resource(&self) -> String {
        format!("/blob/{}/{}/{}", self.account, self.container, self.blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_account_container_and_blob() {
        let loc = BlobLocation::parse("https://acct.blob.core.windows.net/cont/img.jpg").unwrap();
        assert_eq!(loc.account, "acct");
        assert_eq!(loc.container, "cont");
        assert_eq!(loc.blob, "img.jpg");
        assert_eq!(loc.canonical_resource(), "/blob/acct/cont/img.jpg");
    }

    #[test]
    fn nested_blob_paths_are_kept_whole() {
        let loc = BlobLocation::parse("https://acct.blob/cont/2024/05/frame-001.png").unwrap();
        assert_eq!(loc.container, "cont");
        assert_eq!(loc.blob, "2024/05/frame-001.png");
    }

    #[test]
    fn encoded_names_are_decoded() {
        let loc = BlobLocation::parse("https://acct.blob.core.windows.net/cont/my photo.jpg").unwrap();
        assert_eq!(loc.blob, "my photo.jpg");
        assert_eq!(loc.canonical_resource(), "/blob/acct/cont/my photo.jpg");
        assert_eq!(loc.url().path(), "/cont/my%20photo.jpg");

        let loc = BlobLocation::parse("https://acct.blob/my%20cont/caf%C3%A9/100%25.png").unwrap();
        assert_eq!(loc.container, "my cont");
        assert_eq!(loc.blob, "café/100%.png");
    }

    #[test]
    fn undecodable_path_is_rejected() {
        let err = BlobLocation::parse("https://acct.blob/cont/%FF.jpg").unwrap_err();
        assert!(matches!(err, AccessError::UrlParse { reason, .. } if reason == "path is not valid UTF-8"));
    }

    #[test]
    fn container_only_url_is_rejected() {
        let err = BlobLocation::parse("https://acct.blob/cont").unwrap_err();
        assert!(matches!(err, AccessError::UrlParse { reason, .. } if reason == "missing blob name"));
        assert!(BlobLocation::parse("https://acct.blob/cont/").is_err());
    }

    #[test]
    fn non_url_is_rejected() {
        assert!(matches!(
            BlobLocation::parse("not a url"),
            Err(AccessError::UrlParse { .. })
        ));
    }
}
