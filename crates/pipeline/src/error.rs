use stockwatch_storage::StorageError;

/// Errors raised inside the alerting pipeline.
///
/// None of these reach the product write path: the dispatcher logs them and
/// moves on. The administrative surface maps them to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A change event was malformed and has been dropped.
    #[error("invalid change event: {0}")]
    Validation(String),

    #[error("alert not found: {alert_id}")]
    AlertNotFound { alert_id: String },

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlertNotFound { alert_id } => PipelineError::AlertNotFound { alert_id },
            other => PipelineError::Storage(other),
        }
    }
}
