use crate::core::cache::{AudioStoreError, IndexError};
use crate::core::tts::TTSError;

/// Service-facing error type.
///
/// Every failure surfaced through [`crate::core::service::TtsService`] is
/// folded into one of these variants so that the excluded transport layer can
/// map it onto its own status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(#[from] TTSError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the caller sent something unusable, as opposed to a server-side fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidRequest(_) | AppError::InvalidFilename(_) | AppError::NotFound(_)
        )
    }
}

impl From<AudioStoreError> for AppError {
    fn from(err: AudioStoreError) -> Self {
        match err {
            AudioStoreError::InvalidFilename(name) => AppError::InvalidFilename(name),
            AudioStoreError::Io(e) => AppError::Storage(e.to_string()),
        }
    }
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        AppError::Storage(err.to_string())
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
