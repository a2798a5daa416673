//! Repair task execution errors
//!
//! Lets a queue handler mark an error as recoverable (nack, redeliver) or
//! unrecoverable (ack with failure, do not redeliver). The default conversion
//! from `anyhow::Error` is recoverable.

use std::fmt;

#[derive(Debug)]
pub struct TaskError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl TaskError {
    /// Unrecoverable errors fail immediately without redelivery. Use for
    /// unparsable payloads, missing configuration, and other inputs that will
    /// not change on retry.
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Recoverable errors are redelivered after the queue's deadline. Use for
    /// transient network or store failures.
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

/// Extension trait for Result to mark errors unrecoverable in one call.
pub trait TaskResultExt<T> {
    fn unrecoverable(self) -> Result<T, TaskError>;
}

impl<T, E: Into<anyhow::Error>> TaskResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, TaskError> {
        self.map_err(|e| TaskError::unrecoverable(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecoverable_error() {
        let err = TaskError::unrecoverable(anyhow::anyhow!("bad payload"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("bad payload"));
    }

    #[test]
    fn default_conversion_is_recoverable() {
        let err: TaskError = anyhow::anyhow!("store unavailable").into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn result_ext() {
        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("missing config"));
        let task_result = result.unrecoverable();
        assert!(!task_result.unwrap_err().is_recoverable());
    }
}
