//! Error types module
//!
//! Every stage failure is expressed as a [`RelayError`]. Errors are surfaced to
//! the hosting loop unchanged; redelivery and dead-lettering belong to the queue
//! service, so the metadata here only informs logging and operators.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Warning level - for bad partner input and transient upstream issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Failed to fetch {uri}: {reason}")]
    UpstreamFetchFailed { uri: String, reason: String },

    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Batch failed after emitting {emitted} of {total} lines: {source}")]
    PartialBatchFailure {
        emitted: usize,
        total: usize,
        #[source]
        source: Box<RelayError>,
    },

    #[error("Queue send failed on {queue}: {reason}")]
    QueueSendFailed { queue: String, reason: String },

    /// Receiving from or acknowledging on an inbound queue failed.
    #[error("Queue receive failed on {queue}: {reason}")]
    QueueReceiveFailed { queue: String, reason: String },

    #[error("Image transform failed: {0}")]
    TransformFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type used across the relay crates
pub type RelayResult<T> = Result<T, RelayError>;

/// Static metadata for each variant: (error_code, recoverable, log_level).
fn relay_error_static_metadata(err: &RelayError) -> (&'static str, bool, LogLevel) {
    match err {
        RelayError::MalformedMessage(_) => ("MALFORMED_MESSAGE", false, LogLevel::Warn),
        RelayError::UpstreamFetchFailed { .. } => ("UPSTREAM_FETCH_FAILED", true, LogLevel::Warn),
        RelayError::StorageWriteFailed(_) => ("STORAGE_WRITE_FAILED", true, LogLevel::Error),
        RelayError::BlobNotFound(_) => ("BLOB_NOT_FOUND", false, LogLevel::Error),
        RelayError::PartialBatchFailure { source, .. } => {
            let (_, recoverable, level) = relay_error_static_metadata(source);
            ("PARTIAL_BATCH_FAILURE", recoverable, level)
        }
        RelayError::QueueSendFailed { .. } => ("QUEUE_SEND_FAILED", true, LogLevel::Error),
        RelayError::QueueReceiveFailed { .. } => ("QUEUE_RECEIVE_FAILED", true, LogLevel::Warn),
        RelayError::TransformFailed(_) => ("TRANSFORM_FAILED", false, LogLevel::Error),
        RelayError::Serialization(_) => ("SERIALIZATION_ERROR", false, LogLevel::Error),
        RelayError::Config(_) => ("CONFIG_ERROR", false, LogLevel::Error),
    }
}

impl RelayError {
    pub fn malformed(message: impl Into<String>) -> Self {
        RelayError::MalformedMessage(message.into())
    }

    pub fn fetch_failed(uri: impl Into<String>, reason: impl ToString) -> Self {
        RelayError::UpstreamFetchFailed {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    /// Machine-readable error code (e.g., "BLOB_NOT_FOUND")
    pub fn error_code(&self) -> &'static str {
        relay_error_static_metadata(self).0
    }

    /// Whether redelivering the same message could plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        relay_error_static_metadata(self).1
    }

    pub fn log_level(&self) -> LogLevel {
        relay_error_static_metadata(self).2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_is_not_recoverable() {
        let err = RelayError::malformed("too few tokens");
        assert_eq!(err.error_code(), "MALFORMED_MESSAGE");
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "Malformed message: too few tokens");
    }

    #[test]
    fn fetch_failure_is_recoverable() {
        let err = RelayError::fetch_failed("https://cdn/b.png", "503 Service Unavailable");
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert!(err.to_string().contains("https://cdn/b.png"));
    }

    #[test]
    fn partial_batch_failure_inherits_source_metadata() {
        let err = RelayError::PartialBatchFailure {
            emitted: 2,
            total: 5,
            source: Box::new(RelayError::QueueSendFailed {
                queue: "update".to_string(),
                reason: "throttled".to_string(),
            }),
        };
        assert_eq!(err.error_code(), "PARTIAL_BATCH_FAILURE");
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Error);
        assert!(std::error::Error::source(&err).is_some());
    }
}
