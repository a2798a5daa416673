//! URL classification
//!
//! Two layers: `classify_syntactic` is a pure function that settles every
//! status decidable from the string alone, and `Classifier` resolves the rest
//! with an HTTP probe. Classification outcomes are data, never errors; a
//! failed probe request is itself a status (`request_failed`).

use std::sync::Arc;

use marina_core::models::{MediaReference, MediaType, UrlStatus, ValidationResult};

use crate::probe::UrlProbe;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "svg", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "m4v", "avi", "mkv"];

/// Statuses decidable without touching the network. Ordered, first match
/// wins; `None` means the URL needs a probe.
pub fn classify_syntactic(url: &str) -> Option<UrlStatus> {
    if url.trim().is_empty() {
        return Some(UrlStatus::Missing);
    }
    if url.starts_with("blob:") {
        return Some(UrlStatus::Blob);
    }
    if url.starts_with('/') && !url.starts_with("//") {
        return Some(UrlStatus::Relative);
    }
    if reqwest::Url::parse(url).is_err() {
        return Some(UrlStatus::Malformed);
    }
    None
}

pub struct Classifier {
    probe: Arc<dyn UrlProbe>,
}

impl Classifier {
    pub fn new(probe: Arc<dyn UrlProbe>) -> Self {
        Self { probe }
    }

    /// Classify one reference. Exactly one status per reference.
    pub async fn classify(
        &self,
        collection: &str,
        doc_id: &str,
        reference: MediaReference,
    ) -> ValidationResult {
        let (status, detail) = match classify_syntactic(&reference.url) {
            Some(status) => (status, None),
            None => self.classify_by_probe(&reference).await,
        };

        ValidationResult {
            reference,
            collection: collection.to_string(),
            doc_id: doc_id.to_string(),
            status,
            detail,
        }
    }

    async fn classify_by_probe(&self, reference: &MediaReference) -> (UrlStatus, Option<String>) {
        let response = match self.probe.probe(&reference.url).await {
            Ok(response) => response,
            Err(e) => return (UrlStatus::RequestFailed, Some(e.to_string())),
        };

        if !response.is_success() {
            return (UrlStatus::HttpError(response.status), None);
        }

        let Some(declared) = reference.declared_type else {
            return (UrlStatus::Valid, None);
        };

        if content_type_matches(response.content_type.as_deref(), declared) {
            return (UrlStatus::Valid, None);
        }

        let content_type = response.content_type.as_deref().unwrap_or("absent");
        if extension_matches(&reference.url, declared) {
            // Object-storage backends regularly serve images as
            // application/octet-stream; the extension is trusted over the
            // reported content type.
            (
                UrlStatus::OkExtensionOverride,
                Some(format!(
                    "content-type {content_type} overridden by file extension"
                )),
            )
        } else {
            (
                UrlStatus::ContentTypeMismatch,
                Some(format!(
                    "content-type {content_type} does not match declared {declared}"
                )),
            )
        }
    }
}

fn content_type_matches(content_type: Option<&str>, declared: MediaType) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    match declared {
        MediaType::Image => content_type.starts_with("image/"),
        MediaType::Video => content_type.starts_with("video/"),
    }
}

fn extension_matches(url: &str, declared: MediaType) -> bool {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => return false,
    };
    let Some(dot) = path.rfind('.') else {
        return false;
    };
    let extension = path[dot + 1..].to_ascii_lowercase();
    match declared {
        MediaType::Image => IMAGE_EXTENSIONS.contains(&extension.as_str()),
        MediaType::Video => VIDEO_EXTENSIONS.contains(&extension.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use marina_core::AppError;

    use crate::probe::ProbeResponse;

    #[test]
    fn syntactic_statuses_in_order() {
        assert_eq!(classify_syntactic(""), Some(UrlStatus::Missing));
        assert_eq!(classify_syntactic("   "), Some(UrlStatus::Missing));
        assert_eq!(
            classify_syntactic("blob:https://app.example.com/550e8400"),
            Some(UrlStatus::Blob)
        );
        assert_eq!(
            classify_syntactic("/uploads/yacht.jpg"),
            Some(UrlStatus::Relative)
        );
        assert_eq!(
            classify_syntactic("not a url at all"),
            Some(UrlStatus::Malformed)
        );
        assert_eq!(classify_syntactic("https://cdn.example.com/a.jpg"), None);
    }

    #[test]
    fn blob_wins_over_everything() {
        // A blob URL is also unparsable by some parsers; the blob check must
        // run before the parse check.
        assert_eq!(
            classify_syntactic("blob:invalid-rest"),
            Some(UrlStatus::Blob)
        );
    }

    #[test]
    fn protocol_relative_is_not_relative() {
        assert_ne!(
            classify_syntactic("//cdn.example.com/a.jpg"),
            Some(UrlStatus::Relative)
        );
    }

    struct CannedProbe {
        response: Result<ProbeResponse, String>,
    }

    #[async_trait]
    impl UrlProbe for CannedProbe {
        async fn probe(&self, _url: &str) -> Result<ProbeResponse, AppError> {
            self.response
                .clone()
                .map_err(AppError::Probe)
        }
    }

    fn classifier(status: u16, content_type: Option<&str>) -> Classifier {
        Classifier::new(Arc::new(CannedProbe {
            response: Ok(ProbeResponse {
                status,
                content_type: content_type.map(|s| s.to_string()),
            }),
        }))
    }

    fn reference(url: &str, declared_type: Option<MediaType>) -> MediaReference {
        MediaReference {
            path: "mainImage".to_string(),
            url: url.to_string(),
            declared_type,
        }
    }

    #[tokio::test]
    async fn reachable_image_is_valid() {
        let result = classifier(200, Some("image/jpeg"))
            .classify("yacht_profiles", "yp-1", reference(
                "https://cdn.example.com/a.jpg",
                Some(MediaType::Image),
            ))
            .await;
        assert_eq!(result.status, UrlStatus::Valid);
    }

    #[tokio::test]
    async fn http_error_carries_code() {
        let result = classifier(404, None)
            .classify("yacht_profiles", "yp-1", reference(
                "https://cdn.example.com/gone.jpg",
                Some(MediaType::Image),
            ))
            .await;
        assert_eq!(result.status, UrlStatus::HttpError(404));
        assert_eq!(result.status.to_string(), "http_error_404");
    }

    #[tokio::test]
    async fn octet_stream_with_matching_extension_is_override() {
        let result = classifier(200, Some("application/octet-stream"))
            .classify("yacht_profiles", "yp-1", reference(
                "https://cdn.example.com/a.jpg",
                Some(MediaType::Image),
            ))
            .await;
        assert_eq!(result.status, UrlStatus::OkExtensionOverride);
        assert!(result.status.is_valid());
    }

    #[tokio::test]
    async fn mismatch_without_extension_agreement() {
        let result = classifier(200, Some("text/html"))
            .classify("yacht_profiles", "yp-1", reference(
                "https://cdn.example.com/page",
                Some(MediaType::Image),
            ))
            .await;
        assert_eq!(result.status, UrlStatus::ContentTypeMismatch);
    }

    #[tokio::test]
    async fn no_declared_type_accepts_any_content_type() {
        let result = classifier(200, Some("text/html"))
            .classify("yacht_profiles", "yp-1", reference(
                "https://cdn.example.com/page",
                None,
            ))
            .await;
        assert_eq!(result.status, UrlStatus::Valid);
    }

    #[tokio::test]
    async fn transport_failure_is_request_failed() {
        let classifier = Classifier::new(Arc::new(CannedProbe {
            response: Err("connection refused".to_string()),
        }));
        let result = classifier
            .classify("yacht_profiles", "yp-1", reference(
                "https://unreachable.example.com/a.jpg",
                Some(MediaType::Image),
            ))
            .await;
        assert_eq!(result.status, UrlStatus::RequestFailed);
        assert!(result.detail.is_some());
    }

    #[tokio::test]
    async fn video_extension_override() {
        let result = classifier(200, Some("application/octet-stream"))
            .classify("unified_yacht_experiences", "x-1", reference(
                "https://cdn.example.com/tour.mp4?alt=media",
                Some(MediaType::Video),
            ))
            .await;
        assert_eq!(result.status, UrlStatus::OkExtensionOverride);
    }
}
