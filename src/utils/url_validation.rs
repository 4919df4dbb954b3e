//! Backend endpoint validation
//!
//! The synthesis backend is reached over a websocket. Endpoints must:
//! - Parse as a URL
//! - Use the `ws` or `wss` scheme
//! - Carry a host
//!
//! Plaintext `ws` is tolerated for loopback hosts (local mock backends) and
//! logged as a warning for anything else.

use thiserror::Error;
use tracing::warn;
use url::{Host, Url};

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be ws or wss, got: {0}")]
    WebSocketRequired(String),

    #[error("URL must have a host")]
    MissingHost,
}

/// Checks whether a URL points at the local machine.
pub fn is_loopback_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Validates a synthesis backend endpoint.
///
/// # Returns
/// * `Ok(Url)` - The parsed endpoint
/// * `Err(UrlValidationError)` if validation fails
///
/// # Example
/// ```rust,ignore
/// use voxcache::utils::url_validation::validate_backend_url;
///
/// assert!(validate_backend_url("wss://speech.platform.bing.com/v1").is_ok());
/// assert!(validate_backend_url("ws://127.0.0.1:9000").is_ok());
/// assert!(validate_backend_url("https://speech.platform.bing.com/v1").is_err());
/// ```
pub fn validate_backend_url(url: &str) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    match parsed.scheme() {
        "wss" => {}
        "ws" => {
            if !is_loopback_host(&parsed) {
                warn!(url = %url, "Backend endpoint uses plaintext ws on a non-loopback host");
            }
        }
        other => return Err(UrlValidationError::WebSocketRequired(other.to_string())),
    }

    if parsed.host().is_none() {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_backend_url_wss() {
        let url = validate_backend_url(
            "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1",
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("speech.platform.bing.com"));
    }

    #[test]
    fn test_validate_backend_url_local_ws() {
        assert!(validate_backend_url("ws://127.0.0.1:9000/").is_ok());
        assert!(validate_backend_url("ws://localhost:9000/").is_ok());
        assert!(validate_backend_url("ws://[::1]:9000/").is_ok());
    }

    #[test]
    fn test_validate_backend_url_rejects_http() {
        assert!(matches!(
            validate_backend_url("https://example.com/tts"),
            Err(UrlValidationError::WebSocketRequired(s)) if s == "https"
        ));
    }

    #[test]
    fn test_validate_backend_url_invalid_format() {
        assert!(matches!(
            validate_backend_url("not a url"),
            Err(UrlValidationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_is_loopback_host() {
        assert!(is_loopback_host(&Url::parse("ws://127.0.0.1:1").unwrap()));
        assert!(is_loopback_host(&Url::parse("ws://LOCALHOST:1").unwrap()));
        assert!(!is_loopback_host(&Url::parse("wss://example.com").unwrap()));
        assert!(!is_loopback_host(&Url::parse("ws://10.0.0.1").unwrap()));
    }
}
