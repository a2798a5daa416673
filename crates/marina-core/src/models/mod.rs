pub mod reference;
pub mod repair;
pub mod report;

pub use reference::{MediaReference, MediaType, UrlStatus, ValidationResult};
pub use repair::{
    RepairOutcome, RepairReason, RepairResult, RepairTask, REPAIR_RESULT_TOPIC, REPAIR_TOPIC,
};
pub use report::{
    CollectionStats, FixedUrlRecord, RepairReport, RunStats, ValidationReport,
};
