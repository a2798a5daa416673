use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::reference::{MediaType, UrlStatus};

/// Topic carrying repair tasks from the validator to workers.
pub const REPAIR_TOPIC: &str = "media-repair";

/// Topic carrying repair results from workers back to the reporter.
pub const REPAIR_RESULT_TOPIC: &str = "media-repair-results";

/// Why a URL is being repaired. Only mechanically repairable classifications
/// appear here; everything else is report-only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepairReason {
    Blob,
    Relative,
}

impl Display for RepairReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RepairReason::Blob => write!(f, "blob"),
            RepairReason::Relative => write!(f, "relative"),
        }
    }
}

impl FromStr for RepairReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(RepairReason::Blob),
            "relative" => Ok(RepairReason::Relative),
            _ => Err(anyhow::anyhow!("Invalid repair reason: {}", s)),
        }
    }
}

impl TryFrom<UrlStatus> for RepairReason {
    type Error = anyhow::Error;

    fn try_from(status: UrlStatus) -> Result<Self, Self::Error> {
        match status {
            UrlStatus::Blob => Ok(RepairReason::Blob),
            UrlStatus::Relative => Ok(RepairReason::Relative),
            other => Err(anyhow::anyhow!("Status {} is not repairable", other)),
        }
    }
}

/// Queue message payload for one field repair. Created only for repairable
/// classifications, consumed exactly once per delivery, never persisted; the
/// outcome folds into the repair report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepairTask {
    /// Identifies the run that published this task. Results are correlated
    /// back to their run by it; leftover results from an earlier run never
    /// count toward a later one.
    pub run_id: Uuid,
    pub collection: String,
    pub doc_id: String,
    pub path: String,
    pub old_url: String,
    pub reason: RepairReason,
    pub declared_type: Option<MediaType>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepairOutcome {
    /// Field was rewritten to the replacement URL.
    Fixed,
    /// Field no longer held the old URL; nothing written.
    AlreadyFixed,
    /// Document disappeared between scan and repair.
    Skipped,
    /// Permanent failure (unparsable payload, contract violation).
    Failed,
}

impl Display for RepairOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RepairOutcome::Fixed => write!(f, "fixed"),
            RepairOutcome::AlreadyFixed => write!(f, "already_fixed"),
            RepairOutcome::Skipped => write!(f, "skipped"),
            RepairOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Result message a worker publishes after handling a repair task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairResult {
    pub task: RepairTask,
    pub new_url: Option<String>,
    pub outcome: RepairOutcome,
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_from_status() {
        assert_eq!(
            RepairReason::try_from(UrlStatus::Blob).unwrap(),
            RepairReason::Blob
        );
        assert_eq!(
            RepairReason::try_from(UrlStatus::Relative).unwrap(),
            RepairReason::Relative
        );
        assert!(RepairReason::try_from(UrlStatus::Malformed).is_err());
        assert!(RepairReason::try_from(UrlStatus::HttpError(404)).is_err());
    }

    #[test]
    fn task_payload_round_trip() {
        let task = RepairTask {
            run_id: Uuid::new_v4(),
            collection: "yacht_profiles".to_string(),
            doc_id: "yp-1".to_string(),
            path: "mainImage".to_string(),
            old_url: "blob:https://host/abc".to_string(),
            reason: RepairReason::Blob,
            declared_type: Some(MediaType::Image),
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["reason"], "blob");
        let back: RepairTask = serde_json::from_value(value).unwrap();
        assert_eq!(back, task);
    }
}
