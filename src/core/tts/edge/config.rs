//! Edge TTS configuration types, markup rendering and connection signing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::core::request::SynthesisRequest;
use crate::core::tts::base::{TTSError, TTSResult};

use super::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_RECEIVE_TIMEOUT_SECS, DEFAULT_USER_AGENT, EDGE_TTS_URL,
    GEC_BUCKET_SECS, SEC_MS_GEC_VERSION, TRUSTED_CLIENT_TOKEN, WINDOWS_EPOCH_OFFSET_SECS,
};

// =============================================================================
// Output Format
// =============================================================================

/// Audio encoding requested from the service.
///
/// Only three formats are recognised; everything else falls back to MP3 so
/// that a stored file's extension always matches its actual encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOutputFormat {
    #[default]
    Mp3,
    Wav,
    Ogg,
}

impl EdgeOutputFormat {
    /// Maps a request format string onto an encoding. Case-insensitive.
    pub fn from_format(format: &str) -> Self {
        match format.trim().to_ascii_lowercase().as_str() {
            "wav" => Self::Wav,
            "ogg" => Self::Ogg,
            _ => Self::Mp3,
        }
    }

    /// Value of the `outputFormat` field in the speech config frame.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio-24khz-48kbitrate-mono-mp3",
            Self::Wav => "riff-24khz-16bit-mono-pcm",
            Self::Ogg => "ogg-24khz-16bit-mono-opus",
        }
    }

    /// File extension including the leading dot.
    #[inline]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => ".mp3",
            Self::Wav => ".wav",
            Self::Ogg => ".ogg",
        }
    }

    #[inline]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
        }
    }
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Connection settings for the Edge read-aloud backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTTSConfig {
    /// Websocket endpoint. Signing parameters are appended as query pairs.
    pub endpoint: String,
    pub trusted_client_token: String,
    pub gec_version: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Upper bound on the receive phase, measured from the first read.
    pub receive_timeout: Duration,
}

impl Default for EdgeTTSConfig {
    fn default() -> Self {
        Self {
            endpoint: EDGE_TTS_URL.to_string(),
            trusted_client_token: TRUSTED_CLIENT_TOKEN.to_string(),
            gec_version: SEC_MS_GEC_VERSION.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            receive_timeout: Duration::from_secs(DEFAULT_RECEIVE_TIMEOUT_SECS),
        }
    }
}

impl EdgeTTSConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> TTSResult<()> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            TTSError::InvalidConfiguration(format!("Invalid endpoint '{}': {e}", self.endpoint))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TTSError::InvalidConfiguration(format!(
                "Endpoint must use ws or wss, got '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(TTSError::InvalidConfiguration(
                "Endpoint must include a host".to_string(),
            ));
        }
        if self.trusted_client_token.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Trusted client token must not be empty".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() || self.receive_timeout.is_zero() {
            return Err(TTSError::InvalidConfiguration(
                "Timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the signed connection URL.
    ///
    /// # Arguments
    /// * `connection_id` - Dash-less UUID identifying the connection
    /// * `unix_secs` - Current wall-clock time, used for the `Sec-MS-GEC` bucket
    pub fn connection_url(&self, connection_id: &str, unix_secs: u64) -> TTSResult<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| {
            TTSError::InvalidConfiguration(format!("Invalid endpoint '{}': {e}", self.endpoint))
        })?;
        url.query_pairs_mut()
            .append_pair("TrustedClientToken", &self.trusted_client_token)
            .append_pair(
                "Sec-MS-GEC",
                &generate_sec_ms_gec(unix_secs, &self.trusted_client_token),
            )
            .append_pair("Sec-MS-GEC-Version", &self.gec_version)
            .append_pair("ConnectionId", connection_id);
        Ok(url)
    }
}

// =============================================================================
// Connection Signing
// =============================================================================

/// Computes the `Sec-MS-GEC` token for the given wall-clock time.
///
/// Ticks are 100ns intervals since 1601-01-01, truncated to the start of the
/// current five minute bucket, so every call inside one bucket yields the
/// same token.
pub fn generate_sec_ms_gec(unix_secs: u64, trusted_client_token: &str) -> String {
    let mut secs = unix_secs + WINDOWS_EPOCH_OFFSET_SECS;
    secs -= secs % GEC_BUCKET_SECS;
    let ticks = secs * 10_000_000;

    let digest = Sha256::digest(format!("{ticks}{trusted_client_token}").as_bytes());
    hex::encode_upper(digest)
}

// =============================================================================
// Markup Rendering
// =============================================================================

/// Escapes XML special characters in text.
pub fn escape_xml(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}

/// Renders the prosody rate: `"default"` at 1.0, otherwise one decimal.
pub fn format_rate(speed: f64) -> String {
    if (speed - 1.0).abs() < f64::EPSILON {
        "default".to_string()
    } else {
        format!("{speed:.1}")
    }
}

/// Renders the prosody pitch: `"default"` at 0, otherwise a signed Hz offset.
pub fn format_pitch(pitch: i32) -> String {
    match pitch {
        0 => "default".to_string(),
        p if p > 0 => format!("+{p}Hz"),
        p => format!("{p}Hz"),
    }
}

/// Extracts the locale prefix of a voice name (`zh-CN-XiaoxiaoNeural` → `zh-CN`).
///
/// Falls back to `en-US` for names without a locale prefix.
pub fn locale_from_voice(voice: &str) -> String {
    let mut parts = voice.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(lang), Some(region), Some(_))
            if (2..=3).contains(&lang.len())
                && lang.chars().all(|c| c.is_ascii_alphabetic())
                && (2..=4).contains(&region.len())
                && region.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!("{lang}-{region}")
        }
        _ => "en-US".to_string(),
    }
}

/// Builds the markup document for a request.
///
/// Plain text is XML-escaped. When the request carries the ssml flag the text
/// is trusted markup and is placed inside `<prosody>` verbatim.
pub fn build_ssml(request: &SynthesisRequest) -> String {
    let text = if request.ssml {
        request.text.clone()
    } else {
        escape_xml(&request.text)
    };

    format!(
        r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" xml:lang="{lang}"><voice name="{voice}"><prosody rate="{rate}" pitch="{pitch}">{text}</prosody></voice></speak>"#,
        lang = locale_from_voice(&request.voice),
        voice = escape_xml(&request.voice),
        rate = format_rate(request.speed),
        pitch = format_pitch(request.pitch),
    )
}
