//! Placeholder selection for blob-URL repair
//!
//! Blob URLs cannot be dereferenced server-side, so repair substitutes a
//! hosted placeholder chosen from the field context: a yacht image field gets
//! the yacht placeholder, a service add-on field gets the service one, and so
//! on. Selection only looks at the collection name, field path, and declared
//! media type.

use crate::models::{MediaType, RepairTask};

/// Default host for placeholder assets.
pub const DEFAULT_PLACEHOLDER_BASE_URL: &str =
    "https://storage.googleapis.com/etoile-yachts.firebasestorage.app/placeholders";

const YACHT_PLACEHOLDER: &str = "yacht-placeholder.jpg";
const SERVICE_PLACEHOLDER: &str = "service-placeholder.jpg";
const DINING_PLACEHOLDER: &str = "dining-placeholder.jpg";
const EVENT_PLACEHOLDER: &str = "event-placeholder.jpg";
const ARTICLE_PLACEHOLDER: &str = "article-placeholder.jpg";
const VIDEO_PLACEHOLDER: &str = "video-placeholder.mp4";
const GENERIC_PLACEHOLDER: &str = "media-placeholder.jpg";

#[derive(Debug, Clone)]
pub struct PlaceholderCatalog {
    base_url: String,
}

impl PlaceholderCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Pick the placeholder URL for a repair task. First match wins: video
    /// contexts beat collection keywords so a yacht promo video still gets a
    /// video placeholder.
    pub fn select(&self, task: &RepairTask) -> String {
        let context = format!("{} {}", task.collection, task.path).to_lowercase();

        let asset = if task.declared_type == Some(MediaType::Video)
            || context.contains("video")
            || context.contains("scene")
        {
            VIDEO_PLACEHOLDER
        } else if context.contains("yacht") || context.contains("experience") {
            YACHT_PLACEHOLDER
        } else if context.contains("addon") || context.contains("add_on") || context.contains("service") {
            SERVICE_PLACEHOLDER
        } else if context.contains("dining") || context.contains("catering") {
            DINING_PLACEHOLDER
        } else if context.contains("event") {
            EVENT_PLACEHOLDER
        } else if context.contains("article") || context.contains("guide") {
            ARTICLE_PLACEHOLDER
        } else {
            GENERIC_PLACEHOLDER
        };

        format!("{}/{}", self.base_url, asset)
    }

    /// True when `url` is already a placeholder from this catalog, so repair
    /// can treat it as a no-op.
    pub fn is_placeholder(&self, url: &str) -> bool {
        url.starts_with(&self.base_url)
    }
}

impl Default for PlaceholderCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepairReason;

    fn task(collection: &str, path: &str, declared_type: Option<MediaType>) -> RepairTask {
        RepairTask {
            run_id: uuid::Uuid::new_v4(),
            collection: collection.to_string(),
            doc_id: "d1".to_string(),
            path: path.to_string(),
            old_url: "blob:https://host/abc".to_string(),
            reason: RepairReason::Blob,
            declared_type,
        }
    }

    #[test]
    fn yacht_context_gets_yacht_placeholder() {
        let catalog = PlaceholderCatalog::default();
        let url = catalog.select(&task("yacht_profiles", "mainImage", None));
        assert!(url.ends_with("yacht-placeholder.jpg"), "{}", url);
    }

    #[test]
    fn video_context_wins_over_collection() {
        let catalog = PlaceholderCatalog::default();
        let url = catalog.select(&task(
            "yacht_profiles",
            "media[0].url",
            Some(MediaType::Video),
        ));
        assert!(url.ends_with("video-placeholder.mp4"), "{}", url);
    }

    #[test]
    fn addon_and_event_contexts() {
        let catalog = PlaceholderCatalog::default();
        assert!(catalog
            .select(&task("products_add_ons", "images[0]", None))
            .ends_with("service-placeholder.jpg"));
        assert!(catalog
            .select(&task("event_announcements", "banner", None))
            .ends_with("event-placeholder.jpg"));
    }

    #[test]
    fn unknown_context_falls_back_to_generic() {
        let catalog = PlaceholderCatalog::default();
        let url = catalog.select(&task("misc", "cover", None));
        assert!(url.ends_with("media-placeholder.jpg"), "{}", url);
    }

    #[test]
    fn trailing_slash_trimmed_and_detection() {
        let catalog = PlaceholderCatalog::new("https://cdn.example.com/ph/");
        let url = catalog.select(&task("misc", "cover", None));
        assert_eq!(url, "https://cdn.example.com/ph/media-placeholder.jpg");
        assert!(catalog.is_placeholder(&url));
        assert!(!catalog.is_placeholder("https://elsewhere.example.com/x.jpg"));
    }
}
