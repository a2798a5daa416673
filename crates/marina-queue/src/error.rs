#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Queue transport error: {0}")]
    Transport(String),

    /// The backend cannot answer honestly (e.g. exact backlog size).
    /// Preferred over returning misleading data.
    #[error("Operation not supported by this queue backend: {0}")]
    Unsupported(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<QueueError> for marina_core::AppError {
    fn from(err: QueueError) -> Self {
        marina_core::AppError::Queue(err.to_string())
    }
}
