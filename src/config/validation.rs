use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::utils::validate_backend_url;

/// Formats the backend can actually produce.
const RECOGNISED_FORMATS: &[&str] = &["mp3", "wav", "ogg"];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate the backend endpoint
///
/// The endpoint must be a `ws`/`wss` URL with a host.
pub fn validate_backend_endpoint(endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    validate_backend_url(endpoint)
        .map(|_| ())
        .map_err(|e| format!("EDGE_TTS_ENDPOINT is invalid: {e}").into())
}

/// Validate that a duration setting is non-zero
pub fn validate_non_zero_duration(
    name: &str,
    value: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    if value.is_zero() {
        return Err(format!("{name} must be greater than zero").into());
    }
    Ok(())
}

/// Validate that a count setting is non-zero
pub fn validate_non_zero(name: &str, value: u64) -> Result<(), Box<dyn std::error::Error>> {
    if value == 0 {
        return Err(format!("{name} must be greater than zero").into());
    }
    Ok(())
}

/// Validate that a path setting is non-empty
pub fn validate_path(name: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.as_os_str().is_empty() {
        return Err(format!("{name} must not be empty").into());
    }
    Ok(())
}

/// Validate the log level
pub fn validate_log_level(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        return Err(format!(
            "LOG_LEVEL must be one of {}, got {level:?}",
            LOG_LEVELS.join(", ")
        )
        .into());
    }
    Ok(())
}

/// Normalise the default format
///
/// Unrecognised formats fall back to `mp3` with a warning, since the backend
/// would render them as MP3 anyway.
pub fn normalize_default_format(format: &str) -> String {
    let lower = format.trim().to_ascii_lowercase();
    if RECOGNISED_FORMATS.contains(&lower.as_str()) {
        lower
    } else {
        warn!(format = %format, "Unrecognised TTS_DEFAULT_FORMAT, falling back to mp3");
        "mp3".to_string()
    }
}
