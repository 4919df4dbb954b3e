//! OpenAI-compatible speech request translation.
//!
//! Accepts the `/v1/audio/speech` request shape and maps it onto a
//! [`SynthesisRequest`]. OpenAI voice names are mapped onto Edge neural
//! voices; any other voice name is passed through untouched so callers can
//! address Edge voices directly.

use serde::{Deserialize, Serialize};

use crate::core::request::SynthesisRequest;
use crate::errors::{AppError, AppResult};

/// Format used when `response_format` is absent.
pub const DEFAULT_RESPONSE_FORMAT: &str = "mp3";

/// OpenAI voice name → Edge voice.
const VOICE_MAP: &[(&str, &str)] = &[
    ("alloy", "en-US-JennyNeural"),
    ("echo", "en-US-GuyNeural"),
    ("fable", "en-US-DavisNeural"),
    ("onyx", "en-US-JasonNeural"),
    ("nova", "en-US-SaraNeural"),
    ("shimmer", "en-US-AriaNeural"),
];

/// Body of an OpenAI `audio/speech` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OpenAISpeechRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub voice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl OpenAISpeechRequest {
    /// Translates into a fully populated synthesis request.
    ///
    /// # Errors
    /// `InvalidRequest` when `input` or `voice` is empty.
    pub fn into_synthesis_request(self) -> AppResult<SynthesisRequest> {
        if self.input.trim().is_empty() {
            return Err(AppError::InvalidRequest("input must not be empty".to_string()));
        }
        if self.voice.trim().is_empty() {
            return Err(AppError::InvalidRequest("voice must not be empty".to_string()));
        }

        let format = self
            .response_format
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RESPONSE_FORMAT.to_string());

        let speed = match self.speed {
            Some(s) if s > 0.0 && s.is_finite() => s,
            _ => 1.0,
        };

        Ok(SynthesisRequest {
            text: self.input,
            voice: map_voice(&self.voice).to_string(),
            format,
            speed,
            pitch: 0,
            volume: 1.0,
            style: "default".to_string(),
            ssml: false,
        })
    }
}

/// Maps an OpenAI voice name onto an Edge voice, passing unknown names through.
pub fn map_voice(voice: &str) -> &str {
    VOICE_MAP
        .iter()
        .find(|(openai, _)| *openai == voice)
        .map(|(_, edge)| *edge)
        .unwrap_or(voice)
}

/// OpenAI voice names understood by [`map_voice`].
pub fn supported_voices() -> impl Iterator<Item = &'static str> {
    VOICE_MAP.iter().map(|(openai, _)| *openai)
}

/// MIME type for an OpenAI `response_format` value.
pub fn content_type_for_format(format: &str) -> &'static str {
    match format {
        "wav" => "audio/wav",
        "ogg" | "opus" => "audio/ogg",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "pcm" => "audio/pcm",
        _ => "audio/mpeg",
    }
}
