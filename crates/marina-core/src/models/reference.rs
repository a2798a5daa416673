use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Media kind a document claims for a URL field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaType::Image => write!(f, "image"),
            MediaType::Video => write!(f, "video"),
        }
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            _ => Err(anyhow::anyhow!("Invalid media type: {}", s)),
        }
    }
}

/// A URL-bearing field found by the scanner. Ephemeral: produced per document,
/// consumed by the classifier, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaReference {
    /// Dot/bracket field path within the document, e.g. `media[2].url`.
    pub path: String,
    pub url: String,
    pub declared_type: Option<MediaType>,
}

/// Classification outcome for a single URL. Exactly one status per reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum UrlStatus {
    Valid,
    /// 2xx whose content-type mismatched the declared type, trusted anyway
    /// because the file extension agreed. Counts as valid in reports.
    OkExtensionOverride,
    Blob,
    Relative,
    Missing,
    Malformed,
    ContentTypeMismatch,
    HttpError(u16),
    RequestFailed,
}

impl UrlStatus {
    /// True when the URL is usable as-is.
    pub fn is_valid(&self) -> bool {
        matches!(self, UrlStatus::Valid | UrlStatus::OkExtensionOverride)
    }

    /// True when the URL can be mechanically repaired (placeholder
    /// substitution or absolute rewrite).
    pub fn is_repairable(&self) -> bool {
        matches!(self, UrlStatus::Blob | UrlStatus::Relative)
    }
}

impl Display for UrlStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UrlStatus::Valid => write!(f, "valid"),
            UrlStatus::OkExtensionOverride => write!(f, "ok_extension_override"),
            UrlStatus::Blob => write!(f, "blob"),
            UrlStatus::Relative => write!(f, "relative"),
            UrlStatus::Missing => write!(f, "missing"),
            UrlStatus::Malformed => write!(f, "malformed"),
            UrlStatus::ContentTypeMismatch => write!(f, "content_type_mismatch"),
            UrlStatus::HttpError(code) => write!(f, "http_error_{}", code),
            UrlStatus::RequestFailed => write!(f, "request_failed"),
        }
    }
}

impl FromStr for UrlStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(code) = s.strip_prefix("http_error_") {
            let code: u16 = code
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid http_error status: {}", s))?;
            return Ok(UrlStatus::HttpError(code));
        }
        match s {
            "valid" => Ok(UrlStatus::Valid),
            "ok_extension_override" => Ok(UrlStatus::OkExtensionOverride),
            "blob" => Ok(UrlStatus::Blob),
            "relative" => Ok(UrlStatus::Relative),
            "missing" => Ok(UrlStatus::Missing),
            "malformed" => Ok(UrlStatus::Malformed),
            "content_type_mismatch" => Ok(UrlStatus::ContentTypeMismatch),
            "request_failed" => Ok(UrlStatus::RequestFailed),
            _ => Err(anyhow::anyhow!("Invalid url status: {}", s)),
        }
    }
}

impl From<UrlStatus> for String {
    fn from(status: UrlStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for UrlStatus {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One classified reference within a collection scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub reference: MediaReference,
    pub collection: String,
    pub doc_id: String,
    pub status: UrlStatus,
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_round_trip() {
        for status in [
            UrlStatus::Valid,
            UrlStatus::OkExtensionOverride,
            UrlStatus::Blob,
            UrlStatus::Relative,
            UrlStatus::Missing,
            UrlStatus::Malformed,
            UrlStatus::ContentTypeMismatch,
            UrlStatus::HttpError(404),
            UrlStatus::RequestFailed,
        ] {
            assert_eq!(status.to_string().parse::<UrlStatus>().unwrap(), status);
        }
    }

    #[test]
    fn http_error_display_includes_code() {
        assert_eq!(UrlStatus::HttpError(404).to_string(), "http_error_404");
        assert_eq!(UrlStatus::HttpError(503).to_string(), "http_error_503");
    }

    #[test]
    fn invalid_status_rejected() {
        assert!("bogus".parse::<UrlStatus>().is_err());
        assert!("http_error_abc".parse::<UrlStatus>().is_err());
    }

    #[test]
    fn validity_and_repairability() {
        assert!(UrlStatus::Valid.is_valid());
        assert!(UrlStatus::OkExtensionOverride.is_valid());
        assert!(!UrlStatus::Blob.is_valid());
        assert!(UrlStatus::Blob.is_repairable());
        assert!(UrlStatus::Relative.is_repairable());
        assert!(!UrlStatus::HttpError(404).is_repairable());
        assert!(!UrlStatus::Malformed.is_repairable());
        assert!(!UrlStatus::RequestFailed.is_repairable());
    }

    #[test]
    fn status_serializes_as_wire_string() {
        let json = serde_json::to_string(&UrlStatus::HttpError(404)).unwrap();
        assert_eq!(json, "\"http_error_404\"");
        let back: UrlStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UrlStatus::HttpError(404));
    }

    #[test]
    fn media_type_parse() {
        assert_eq!("image".parse::<MediaType>().unwrap(), MediaType::Image);
        assert_eq!("video".parse::<MediaType>().unwrap(), MediaType::Video);
        assert!("audio".parse::<MediaType>().is_err());
    }
}
