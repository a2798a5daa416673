//! Dot/bracket field paths
//!
//! The scanner reports where it found a URL using paths like `media[2].url`.
//! Repair needs to navigate back to that field, so parsing and traversal live
//! here, shared by every document-store implementation.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Parse a dot/bracket path into segments. Rejects empty keys, unterminated
/// brackets, and non-numeric indexes.
pub fn parse_path(path: &str) -> Result<Vec<Segment>, anyhow::Error> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return Err(anyhow::anyhow!("Empty segment in path: {}", path));
        }
        let mut rest = part;
        match rest.find('[') {
            Some(0) => {}
            Some(idx) => {
                segments.push(Segment::Key(rest[..idx].to_string()));
                rest = &rest[idx..];
            }
            None => {
                segments.push(Segment::Key(rest.to_string()));
                continue;
            }
        }
        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| anyhow::anyhow!("Unterminated bracket in path: {}", path))?;
            let index: usize = rest[1..close]
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid index in path: {}", path))?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(anyhow::anyhow!("Malformed path: {}", path));
            }
        }
    }
    if segments.is_empty() {
        return Err(anyhow::anyhow!("Empty path"));
    }
    Ok(segments)
}

/// Resolve a path inside a document. `None` when any segment is absent.
pub fn get_path<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match segment {
            Segment::Key(key) => current.as_object()?.get(key)?,
            Segment::Index(idx) => current.as_array()?.get(*idx)?,
        };
    }
    Some(current)
}

/// Overwrite the value at a path. Returns false (document untouched) when the
/// path does not fully exist; repair never creates fields.
pub fn set_path(value: &mut Value, segments: &[Segment], new_value: Value) -> bool {
    let mut current = value;
    for segment in segments {
        current = match segment {
            Segment::Key(key) => match current.as_object_mut().and_then(|m| m.get_mut(key)) {
                Some(v) => v,
                None => return false,
            },
            Segment::Index(idx) => match current.as_array_mut().and_then(|a| a.get_mut(*idx)) {
                Some(v) => v,
                None => return false,
            },
        };
    }
    *current = new_value;
    true
}
