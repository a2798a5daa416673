//! Media-URL validation pipeline
//!
//! Scans hierarchical documents for URL-bearing fields, classifies each URL
//! syntactically and (when needed) by HTTP probe, computes replacement URLs
//! for the mechanically repairable cases, and aggregates everything into
//! persisted run reports.

pub mod classifier;
pub mod probe;
pub mod repair;
pub mod reporter;
pub mod scanner;
pub mod service;

pub use classifier::{classify_syntactic, Classifier};
pub use probe::{HttpProbe, ProbeResponse, UrlProbe};
pub use repair::repair_url;
pub use reporter::{RepairTallies, Reporter, RunAggregator};
pub use scanner::scan_document;
pub use service::{RepairService, ValidationService};
