use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::reference::UrlStatus;

/// Per-collection slice of a validation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionStats {
    pub documents: u64,
    pub urls: u64,
    pub valid: u64,
    pub invalid: u64,
    pub missing: u64,
    pub blob: u64,
    pub relative: u64,
}

/// Aggregate counts for one validation run.
///
/// Invariant: `by_status` values sum to `total_urls`, and
/// `valid_urls + invalid_urls + missing_urls == total_urls`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStats {
    pub total_documents: u64,
    pub total_fields: u64,
    pub total_urls: u64,
    pub valid_urls: u64,
    pub invalid_urls: u64,
    pub missing_urls: u64,
    pub by_collection: BTreeMap<String, CollectionStats>,
    /// Counts keyed by wire status string (`valid`, `blob`, `http_error_404`, ...).
    pub by_status: BTreeMap<String, u64>,
}

impl RunStats {
    pub fn count_for(&self, status: UrlStatus) -> u64 {
        self.by_status.get(&status.to_string()).copied().unwrap_or(0)
    }
}

/// Persisted aggregate for one validation run. Immutable after write;
/// superseded (not deleted) by later runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub stats: RunStats,
    pub execution_time_ms: u64,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for ValidationReport {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        let stats: serde_json::Value = row.get("stats");
        Ok(ValidationReport {
            id: row.get("id"),
            created_at: row.get("created_at"),
            stats: serde_json::from_value(stats).map_err(|e| {
                sqlx::Error::Decode(format!("Failed to decode report stats: {}", e).into())
            })?,
            execution_time_ms: row.get::<i64, _>("execution_time_ms").max(0) as u64,
        })
    }
}

/// One successfully repaired URL, written in a batch alongside a repair report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixedUrlRecord {
    pub doc_id: String,
    pub collection: String,
    /// Leaf field name, e.g. `url` for path `media[2].url`.
    pub field: String,
    pub field_path: String,
    pub old_url: String,
    pub new_url: String,
}

impl FixedUrlRecord {
    /// Derive the leaf field name from a dot/bracket path.
    pub fn field_from_path(path: &str) -> String {
        let leaf = path.rsplit('.').next().unwrap_or(path);
        match leaf.find('[') {
            Some(idx) if idx > 0 => leaf[..idx].to_string(),
            _ => leaf.to_string(),
        }
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for FixedUrlRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(FixedUrlRecord {
            doc_id: row.get("doc_id"),
            collection: row.get("collection"),
            field: row.get("field"),
            field_path: row.get("field_path"),
            old_url: row.get("old_url"),
            new_url: row.get("new_url"),
        })
    }
}

/// Persisted summary of one URL-repair run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub attempted: u64,
    pub fixed: u64,
    pub already_fixed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub execution_time_ms: u64,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for RepairReport {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        let count = |name: &str| -> Result<u64, sqlx::Error> {
            Ok(row.try_get::<i64, _>(name)?.max(0) as u64)
        };
        Ok(RepairReport {
            id: row.get("id"),
            created_at: row.get("created_at"),
            attempted: count("attempted")?,
            fixed: count("fixed")?,
            already_fixed: count("already_fixed")?,
            skipped: count("skipped")?,
            failed: count("failed")?,
            execution_time_ms: count("execution_time_ms")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_from_path_plain() {
        assert_eq!(FixedUrlRecord::field_from_path("mainImage"), "mainImage");
    }

    #[test]
    fn field_from_path_nested() {
        assert_eq!(FixedUrlRecord::field_from_path("media[2].url"), "url");
        assert_eq!(
            FixedUrlRecord::field_from_path("gallery[0].thumbnail"),
            "thumbnail"
        );
    }

    #[test]
    fn field_from_path_indexed_leaf() {
        assert_eq!(FixedUrlRecord::field_from_path("images[3]"), "images");
    }

    #[test]
    fn stats_round_trip_through_json() {
        let mut stats = RunStats::default();
        stats.total_urls = 3;
        stats.valid_urls = 2;
        stats.invalid_urls = 1;
        stats.by_status.insert("valid".to_string(), 2);
        stats.by_status.insert("http_error_404".to_string(), 1);
        stats
            .by_collection
            .insert("yacht_profiles".to_string(), CollectionStats {
                documents: 1,
                urls: 3,
                valid: 2,
                invalid: 1,
                ..Default::default()
            });

        let value = serde_json::to_value(&stats).unwrap();
        let back: RunStats = serde_json::from_value(value).unwrap();
        assert_eq!(back, stats);
        assert_eq!(back.count_for(UrlStatus::HttpError(404)), 1);
        assert_eq!(back.count_for(UrlStatus::Blob), 0);
    }
}
