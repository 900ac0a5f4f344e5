use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A persisted record could not be mapped back into an entity.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Outcome of an optimistic lifecycle update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The expected lifecycle matched and the new one was written.
    Applied,
    /// The stored lifecycle no longer matches the expected one.
    Conflict,
    /// No activity exists with this identifier.
    Missing,
}

/// Outcome of recording a student response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new row was created for the student.
    Inserted { response_count: u64 },
    /// The student's existing row was overwritten in place.
    Replaced { response_count: u64 },
    /// The activity is not running at the expected start epoch.
    NotRunning,
    /// No activity exists with this identifier.
    ActivityMissing,
}
