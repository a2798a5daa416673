//! Marina Core Library
//!
//! This crate provides the domain models, error types, configuration, and the
//! placeholder catalog shared across all Marina components.

pub mod config;
pub mod error;
pub mod fieldpath;
pub mod models;
pub mod placeholder;
pub mod task_error;

// Re-export commonly used types
pub use config::Config;
pub use error::AppError;
pub use placeholder::PlaceholderCatalog;
pub use task_error::{TaskError, TaskResultExt};
