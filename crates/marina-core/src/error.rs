//! Error types module
//!
//! All errors are unified under the `AppError` enum, which can represent
//! database, queue, probe, and validation errors.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx`
//! feature. With `default-features = false` there is no database variant and
//! DB errors must be mapped by the caller.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Whether the operation that produced this error may succeed on retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Queue(_)
                | AppError::Probe(_)
                | AppError::Internal(_)
                | AppError::InternalWithSource { .. }
        )
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_variants() {
        assert!(AppError::Queue("transport down".into()).is_recoverable());
        assert!(AppError::Probe("timeout".into()).is_recoverable());
        assert!(!AppError::InvalidInput("bad path".into()).is_recoverable());
        assert!(!AppError::MissingConfig("PUBLIC_BASE_URL".into()).is_recoverable());
    }

    #[test]
    fn json_error_maps_to_invalid_input() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let app: AppError = err.into();
        assert!(matches!(app, AppError::InvalidInput(_)));
    }
}
