pub mod cache;
pub mod openai;
pub mod request;
pub mod service;
pub mod tts;

// Re-export commonly used types for convenience
pub use cache::{
    CacheCoordinator, CacheIndex, CacheSource, CoordinatorOptions, MokaFastCache, NoopFastCache,
    Resolved,
};
pub use openai::OpenAISpeechRequest;
pub use request::{ContentKey, RequestNormalizer, SynthesisRequest};
pub use service::{AudioFile, CacheStats, SynthesisResponse, TtsService};
pub use tts::{BaseTTS, BoxedTTS, EdgeTTS, EdgeTTSConfig, TTSError, TTSResult, create_tts_provider};
