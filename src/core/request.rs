//! Synthesis request model, default filling and content addressing.

use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_128;

use crate::errors::{AppError, AppResult};

/// Prefix used for fast-cache keys.
pub const FAST_CACHE_KEY_PREFIX: &str = "tts";

/// A text-to-speech request.
///
/// Only `text` is required on the wire; every other field is filled by
/// [`RequestNormalizer`] before the request reaches the cache pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub format: String,
    pub speed: f64,
    /// Signed pitch offset in Hz.
    pub pitch: i32,
    pub volume: f64,
    pub style: String,
    /// When set, `text` is trusted markup and is embedded without escaping.
    pub ssml: bool,
}

impl SynthesisRequest {
    /// Creates a request for `text` with every other field left to the normalizer.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_pitch(mut self, pitch: i32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_ssml(mut self, ssml: bool) -> Self {
        self.ssml = ssml;
        self
    }

    /// Content key of this request. Only text, voice and format participate.
    pub fn content_key(&self) -> ContentKey {
        ContentKey::compute(&self.text, &self.voice, &self.format)
    }
}

/// Deterministic identifier of a synthesis result.
///
/// Computed with XXH3-128 over the length-prefixed (text, voice, format)
/// triple, so `("ab", "c")` and `("a", "bc")` never collide by construction.
/// Rendered as 32 lowercase hex characters, which doubles as the audio
/// file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn compute(text: &str, voice: &str, format: &str) -> Self {
        let mut buf = Vec::with_capacity(text.len() + voice.len() + format.len() + 24);
        for part in [text, voice, format] {
            buf.extend_from_slice(&(part.len() as u64).to_le_bytes());
            buf.extend_from_slice(part.as_bytes());
        }
        Self(format!("{:032x}", xxh3_128(&buf)))
    }

    /// Wraps an already-computed key, e.g. one read back from the durable index.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which this entry lives in the fast cache.
    pub fn fast_cache_key(&self) -> String {
        format!("{FAST_CACHE_KEY_PREFIX}:{}", self.0)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fills request defaults and rejects unusable requests.
#[derive(Debug, Clone)]
pub struct RequestNormalizer {
    default_voice: String,
    default_format: String,
}

impl RequestNormalizer {
    pub fn new(default_voice: impl Into<String>, default_format: impl Into<String>) -> Self {
        Self {
            default_voice: default_voice.into(),
            default_format: default_format.into(),
        }
    }

    /// Returns the request with voice, format, speed and volume defaulted.
    ///
    /// Format is lowercased so `"MP3"` and `"mp3"` share a content key.
    ///
    /// # Errors
    /// [`AppError::InvalidRequest`] if the text is empty or whitespace only.
    pub fn normalize(&self, mut request: SynthesisRequest) -> AppResult<SynthesisRequest> {
        if request.text.trim().is_empty() {
            return Err(AppError::InvalidRequest("text must not be empty".to_string()));
        }

        if request.voice.trim().is_empty() {
            request.voice = self.default_voice.clone();
        } else {
            request.voice = request.voice.trim().to_string();
        }

        request.format = if request.format.trim().is_empty() {
            self.default_format.to_lowercase()
        } else {
            request.format.trim().to_lowercase()
        };

        if !(request.speed.is_finite() && request.speed > 0.0) {
            request.speed = 1.0;
        }
        if !(request.volume.is_finite() && request.volume > 0.0) {
            request.volume = 1.0;
        }

        Ok(request)
    }
}
