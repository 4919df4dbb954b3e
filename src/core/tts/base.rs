//! Base abstractions for speech synthesis backends.
//!
//! A backend turns one normalized [`SynthesisRequest`] into the complete audio
//! payload for that request. Backends are single-shot: every call opens its
//! own session and returns only after the session has finished or failed.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use voxcache::core::tts::{BaseTTS, EdgeTTS, EdgeTTSConfig};
//!
//! async fn example(request: SynthesisRequest) -> Result<(), TTSError> {
//!     let tts = EdgeTTS::new(EdgeTTSConfig::default())?;
//!     let audio = tts.synthesize(&request).await?;
//!     println!("received {} bytes", audio.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::core::request::SynthesisRequest;

/// TTS-specific error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum TTSError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl TTSError {
    /// Transport failures: the backend could not be reached or the link dropped.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TTSError::ConnectionFailed(_) | TTSError::NetworkError(_) | TTSError::TimeoutError(_)
        )
    }
}

/// Result type for TTS operations
pub type TTSResult<T> = Result<T, TTSError>;

/// A speech synthesis backend.
///
/// Implementations perform one bounded round trip per call. No retry is
/// attempted on failure.
#[async_trait]
pub trait BaseTTS: Send + Sync {
    /// Synthesize the request and return the reassembled audio bytes.
    ///
    /// The returned bytes are the concatenation of every audio payload the
    /// backend sent, in arrival order. An empty result is never returned:
    /// a session that ends without audio is an error.
    async fn synthesize(&self, request: &SynthesisRequest) -> TTSResult<Bytes>;

    /// Get provider-specific information
    fn get_provider_info(&self) -> serde_json::Value;
}

/// Shared handle to a backend.
pub type BoxedTTS = Arc<dyn BaseTTS>;
