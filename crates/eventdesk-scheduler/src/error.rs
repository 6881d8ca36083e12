use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The cursor store could not be read or written.
    #[error("Cursor store error: {0}")]
    Store(String),

    /// A catalog source or the item config store failed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// A required collaborator was not supplied to the builder.
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client could not be constructed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Failure reported by a [`crate::sender::ReportSender`].
///
/// Only `Transient` failures are retried; a `Permanent` failure ends the
/// retry loop at once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Timeouts, rate limits, 5xx responses.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Invalid recipient, malformed payload, rejected request.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}
