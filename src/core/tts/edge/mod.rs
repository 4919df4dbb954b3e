//! Edge read-aloud streaming speech synthesis.
//!
//! A synthesis call is one websocket session against the read-aloud service:
//!
//! ```text
//! Disconnected ──connect──▶ Connected ──speech.config──▶ ConfigSent
//!      ──ssml──▶ ContentSent ──first frame──▶ Streaming ──turn.end──▶ Completed
//!                                                  └─ close / timeout / bad frame ─▶ Failed
//! ```
//!
//! The module is organized into:
//! - **config**: `EdgeTTSConfig`, output encoding table, markup rendering and
//!   connection signing
//! - **messages**: outbound frame builders and the strict inbound frame parser
//! - **provider**: `EdgeTTS` implementing `BaseTTS`, the session state machine
//!   and the receive loop
//!
//! # Connection signing
//!
//! The service only accepts connections whose URL carries a `Sec-MS-GEC`
//! token: the upper-case hex SHA-256 of the Windows-epoch tick count
//! (truncated to a five minute boundary) concatenated with the trusted client
//! token. Browser-like descriptive headers are sent alongside it.
//!
//! # Frame format
//!
//! Text frames carry `Name:Value` header lines, a blank line, then a body.
//! Binary audio frames carry the same header block either behind a 2-byte
//! big-endian length prefix or terminated by a blank line, followed by the
//! raw audio payload.

mod config;
mod messages;
mod provider;

#[cfg(test)]
mod tests;

// =============================================================================
// Constants
// =============================================================================

/// Read-aloud synthesis endpoint.
pub const EDGE_TTS_URL: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";

/// Trusted client token embedded in the read-aloud browser extension.
pub const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

/// Value of the `Sec-MS-GEC-Version` query parameter.
pub const SEC_MS_GEC_VERSION: &str = "1-130.0.2849.68";

/// Origin header expected by the service.
pub const EDGE_ORIGIN: &str = "chrome-extension://jdiccldimpdaibmpdkjnbmckianbfold";

/// Default desktop browser user agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0";

/// Seconds between 1601-01-01 and 1970-01-01.
pub const WINDOWS_EPOCH_OFFSET_SECS: u64 = 11_644_473_600;

/// Tokens are valid for five minute buckets.
pub const GEC_BUCKET_SECS: u64 = 300;

/// Default bound on the websocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default bound on the whole receive phase of one session.
pub const DEFAULT_RECEIVE_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Public Re-exports
// =============================================================================

pub use config::{
    EdgeOutputFormat, EdgeTTSConfig, build_ssml, escape_xml, format_pitch, format_rate,
    generate_sec_ms_gec, locale_from_voice,
};
pub use messages::{EdgeBinaryFrame, EdgeMessageKind, EdgeTextFrame, FrameHeaders};
pub use provider::{EdgeSession, EdgeTTS, SessionState};
