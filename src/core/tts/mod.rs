mod base;
pub mod edge;

pub use base::{BaseTTS, BoxedTTS, TTSError, TTSResult};
pub use edge::{EDGE_TTS_URL, EdgeOutputFormat, EdgeTTS, EdgeTTSConfig};
use std::sync::Arc;

/// Factory function to create a synthesis backend.
///
/// # Supported Providers
///
/// - `"edge"` or `"edge-tts"` - Edge read-aloud websocket service
pub fn create_tts_provider(provider_type: &str, config: EdgeTTSConfig) -> TTSResult<BoxedTTS> {
    match provider_type.to_lowercase().as_str() {
        "edge" | "edge-tts" | "edge_tts" => Ok(Arc::new(EdgeTTS::new(config)?)),
        _ => Err(TTSError::InvalidConfiguration(format!(
            "Unsupported TTS provider: {provider_type}. Supported providers: edge"
        ))),
    }
}
