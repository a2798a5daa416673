//! Replacement-URL computation
//!
//! Deterministic: the same task always yields the same replacement, and
//! repairing an already-repaired URL returns it unchanged. Workers rely on
//! that to stay idempotent under queue redelivery.

use marina_core::models::{RepairReason, RepairTask};
use marina_core::PlaceholderCatalog;

pub fn repair_url(task: &RepairTask, catalog: &PlaceholderCatalog, public_base_url: &str) -> String {
    match task.reason {
        RepairReason::Blob => {
            if catalog.is_placeholder(&task.old_url) {
                return task.old_url.clone();
            }
            catalog.select(task)
        }
        RepairReason::Relative => {
            if !task.old_url.starts_with('/') {
                return task.old_url.clone();
            }
            format!(
                "{}{}",
                public_base_url.trim_end_matches('/'),
                task.old_url
            )
        }
    }
}
