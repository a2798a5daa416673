//! Document scanner
//!
//! Pure walk over a document body that finds every URL-bearing field and
//! reports it with a dot/bracket path (`media[2].url`). Restartable: the scan
//! never mutates the document, so a crashed run just scans again.

use serde_json::{Map, Value};

use marina_core::models::{MediaReference, MediaType};

/// Keys whose subtrees are known media containers; always descended into,
/// only the overall depth bound applies.
const CONTAINER_KEYS: &[&str] = &[
    "media",
    "thumbnail",
    "images",
    "gallery",
    "scenes",
    "photos",
    "virtualTour",
];

/// A string field whose key contains one of these yields a reference.
const URL_KEY_HINTS: &[&str] = &[
    "url",
    "image",
    "photo",
    "thumbnail",
    "avatar",
    "cover",
    "banner",
];

const IMAGE_KEY_HINTS: &[&str] = &["image", "photo", "thumbnail", "avatar", "cover", "banner"];

/// Find every media reference in one document. A non-object root is skipped
/// with a warning and produces no references; it never aborts the collection
/// scan.
pub fn scan_document(
    collection: &str,
    doc_id: &str,
    value: &Value,
    max_depth: usize,
) -> Vec<MediaReference> {
    let Some(root) = value.as_object() else {
        tracing::warn!(collection, doc_id, "Skipping non-object document root");
        return Vec::new();
    };

    let mut refs = Vec::new();
    walk_object(&mut refs, root, "", 0, true, max_depth);
    refs
}

/// `descend_free` lets arbitrary unlabelled objects be entered one level past
/// where we came from; container keys reset it to true so media subtrees are
/// explored in full (up to `max_depth`).
fn walk_object(
    refs: &mut Vec<MediaReference>,
    map: &Map<String, Value>,
    path: &str,
    depth: usize,
    descend_free: bool,
    max_depth: usize,
) {
    for (key, value) in map {
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        match value {
            Value::String(url) if is_url_key(key) => {
                refs.push(MediaReference {
                    path: child_path,
                    url: url.clone(),
                    declared_type: declared_type(key, map),
                });
            }
            Value::Object(child) if depth < max_depth && (is_container(key) || descend_free) => {
                walk_object(refs, child, &child_path, depth + 1, is_container(key), max_depth);
            }
            Value::Array(items)
                if depth < max_depth && (is_container(key) || descend_free || is_url_key(key)) =>
            {
                walk_array(refs, key, items, &child_path, depth, max_depth, is_container(key));
            }
            _ => {}
        }
    }
}

fn walk_array(
    refs: &mut Vec<MediaReference>,
    key: &str,
    items: &[Value],
    path: &str,
    depth: usize,
    max_depth: usize,
    container: bool,
) {
    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{path}[{i}]");
        match item {
            Value::String(url) if container || is_url_key(key) => {
                refs.push(MediaReference {
                    path: item_path,
                    url: url.clone(),
                    declared_type: type_hint(key),
                });
            }
            Value::Object(child) if depth < max_depth => {
                walk_object(refs, child, &item_path, depth + 1, container, max_depth);
            }
            Value::Array(nested) if depth < max_depth => {
                walk_array(refs, key, nested, &item_path, depth + 1, max_depth, container);
            }
            _ => {}
        }
    }
}

/// Declared type for a string field. The `{ url, type }` media-object shape
/// wins for the bare `url` key; everything else falls back to the key name.
fn declared_type(key: &str, map: &Map<String, Value>) -> Option<MediaType> {
    if key.eq_ignore_ascii_case("url") {
        if let Some(declared) = map
            .get("type")
            .and_then(Value::as_str)
            .and_then(|t| t.parse().ok())
        {
            return Some(declared);
        }
    }
    type_hint(key)
}

fn type_hint(key: &str) -> Option<MediaType> {
    let key = key.to_lowercase();
    if key.contains("video") {
        Some(MediaType::Video)
    } else if IMAGE_KEY_HINTS.iter().any(|h| key.contains(h)) {
        Some(MediaType::Image)
    } else {
        None
    }
}

fn is_url_key(key: &str) -> bool {
    let key = key.to_lowercase();
    URL_KEY_HINTS.iter().any(|h| key.contains(h))
}

fn is_container(key: &str) -> bool {
    CONTAINER_KEYS.iter().any(|c| key.eq_ignore_ascii_case(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scan(value: &Value) -> Vec<MediaReference> {
        scan_document("yacht_profiles", "yp-1", value, 6)
    }

    fn paths(refs: &[MediaReference]) -> Vec<&str> {
        refs.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn finds_top_level_url_fields() {
        let doc = json!({
            "name": "Serenity",
            "mainImage": "https://cdn.example.com/serenity.jpg",
            "coverPhoto": "https://cdn.example.com/cover.jpg",
        });
        let refs = scan(&doc);
        assert_eq!(paths(&refs), vec!["coverPhoto", "mainImage"]);
        assert_eq!(refs[0].declared_type, Some(MediaType::Image));
    }

    #[test]
    fn media_array_objects_carry_declared_type() {
        let doc = json!({
            "media": [
                { "url": "https://cdn.example.com/a.jpg", "type": "image" },
                { "url": "https://cdn.example.com/b.mp4", "type": "video" },
            ]
        });
        let refs = scan(&doc);
        assert_eq!(paths(&refs), vec!["media[0].url", "media[1].url"]);
        assert_eq!(refs[0].declared_type, Some(MediaType::Image));
        assert_eq!(refs[1].declared_type, Some(MediaType::Video));
    }

    #[test]
    fn string_arrays_under_container_keys() {
        let doc = json!({
            "images": ["https://cdn.example.com/1.jpg", "/uploads/2.jpg"]
        });
        let refs = scan(&doc);
        assert_eq!(paths(&refs), vec!["images[0]", "images[1]"]);
        assert_eq!(refs[1].url, "/uploads/2.jpg");
    }

    #[test]
    fn nested_containers_are_descended() {
        let doc = json!({
            "virtualTour": {
                "scenes": [
                    { "panoramaUrl": "https://cdn.example.com/pano.jpg" }
                ]
            }
        });
        let refs = scan(&doc);
        assert_eq!(paths(&refs), vec!["virtualTour.scenes[0].panoramaUrl"]);
    }

    #[test]
    fn unlabelled_objects_descend_one_level_only() {
        let doc = json!({
            "details": {
                "heroImage": "https://cdn.example.com/hero.jpg",
                "inner": {
                    "deepImage": "https://cdn.example.com/deep.jpg"
                }
            }
        });
        let refs = scan(&doc);
        assert_eq!(paths(&refs), vec!["details.heroImage"]);
    }

    #[test]
    fn depth_bound_stops_container_recursion() {
        let doc = json!({
            "media": { "media": { "media": { "url": "https://cdn.example.com/x.jpg" } } }
        });
        let refs = scan_document("c", "d", &doc, 2);
        assert!(refs.is_empty());
        let refs = scan_document("c", "d", &doc, 6);
        assert_eq!(paths(&refs), vec!["media.media.media.url"]);
    }

    #[test]
    fn non_object_root_yields_nothing() {
        assert!(scan(&json!("just a string")).is_empty());
        assert!(scan(&json!(42)).is_empty());
        assert!(scan(&json!(null)).is_empty());
    }

    #[test]
    fn video_key_heuristic() {
        let doc = json!({ "promoVideoUrl": "https://cdn.example.com/promo.mp4" });
        let refs = scan(&doc);
        assert_eq!(refs[0].declared_type, Some(MediaType::Video));
    }

    #[test]
    fn non_url_strings_ignored() {
        let doc = json!({
            "title": "Sunset cruise",
            "description": "https://not-a-media-field.example.com"
        });
        assert!(scan(&doc).is_empty());
    }
}
