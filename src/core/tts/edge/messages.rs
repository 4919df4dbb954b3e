//! Edge read-aloud wire frames.
//!
//! Outbound: the `speech.config` frame selecting the output encoding and the
//! `ssml` frame carrying the markup document. Inbound: text control frames and
//! binary audio frames, parsed strictly by their header block.

use bytes::Bytes;
use serde_json::json;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::core::tts::base::{TTSError, TTSResult};

use super::config::EdgeOutputFormat;

// =============================================================================
// Outbound Frames
// =============================================================================

/// Timestamp in the `X-Timestamp` header format (`2024-01-02T03:04:05.678Z`).
pub(crate) fn timestamp(now: OffsetDateTime) -> TTSResult<String> {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    now.format(&format)
        .map_err(|e| TTSError::InternalError(format!("Failed to format timestamp: {e}")))
}

/// Builds the `speech.config` text frame.
pub(crate) fn speech_config_frame(
    request_id: &str,
    timestamp: &str,
    format: EdgeOutputFormat,
) -> String {
    let body = json!({
        "context": {
            "synthesis": {
                "audio": {
                    "metadataoptions": {
                        "sentenceBoundaryEnabled": "false",
                        "wordBoundaryEnabled": "true"
                    },
                    "outputFormat": format.as_str()
                }
            }
        }
    });

    format!(
        "Path: speech.config\r\nContent-Type: application/json; charset=utf-8\r\nX-RequestId: {request_id}\r\nX-Timestamp: {timestamp}\r\n\r\n{body}"
    )
}

/// Builds the `ssml` text frame carrying the markup document.
pub(crate) fn ssml_frame(request_id: &str, timestamp: &str, ssml: &str) -> String {
    format!(
        "Path: ssml\r\nContent-Type: application/ssml+xml\r\nX-RequestId: {request_id}\r\nX-Timestamp: {timestamp}\r\n\r\n{ssml}"
    )
}

// =============================================================================
// Frame Headers
// =============================================================================

/// Parsed `Name:Value` header block of a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameHeaders(Vec<(String, String)>);

impl FrameHeaders {
    /// Parses a header block. Empty lines are skipped; every other line must
    /// be `Name:Value` with a non-empty, whitespace-free name.
    pub fn parse(block: &str) -> TTSResult<Self> {
        let mut headers = Vec::new();
        for line in block.split('\n') {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                TTSError::ProtocolError(format!("Malformed header line: {line:?}"))
            })?;
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(TTSError::ProtocolError(format!(
                    "Invalid header name in line: {line:?}"
                )));
            }
            headers.push((name.to_string(), value.trim().to_string()));
        }
        Ok(Self(headers))
    }

    /// Case-insensitive header lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn path(&self) -> Option<&str> {
        self.get("Path")
    }

    fn require_path(&self) -> TTSResult<EdgeMessageKind> {
        self.path()
            .map(EdgeMessageKind::from_path)
            .ok_or_else(|| TTSError::ProtocolError("Frame has no Path header".to_string()))
    }
}

/// Frame classification by `Path` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeMessageKind {
    TurnStart,
    TurnEnd,
    Response,
    AudioMetadata,
    Audio,
    Other(String),
}

impl EdgeMessageKind {
    pub fn from_path(path: &str) -> Self {
        match path {
            "turn.start" => Self::TurnStart,
            "turn.end" => Self::TurnEnd,
            "response" => Self::Response,
            "audio.metadata" => Self::AudioMetadata,
            "audio" => Self::Audio,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Locates the blank line ending a header block.
///
/// Returns `(header_end, body_start)`.
fn find_header_end(data: &[u8]) -> Option<(usize, usize)> {
    let crlf = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| (pos, pos + 4));
    let lf = data
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn utf8_block(bytes: &[u8]) -> TTSResult<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| TTSError::ProtocolError(format!("Header block is not UTF-8: {e}")))
}

// =============================================================================
// Inbound Frames
// =============================================================================

/// A text control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeTextFrame {
    pub headers: FrameHeaders,
    pub kind: EdgeMessageKind,
    pub body: String,
}

impl EdgeTextFrame {
    /// Parses a text frame. A frame without a blank line is all headers.
    pub fn parse(text: &str) -> TTSResult<Self> {
        let (block, body) = match find_header_end(text.as_bytes()) {
            Some((end, start)) => (&text[..end], &text[start..]),
            None => (text, ""),
        };
        let headers = FrameHeaders::parse(block)?;
        let kind = headers.require_path()?;
        Ok(Self {
            headers,
            kind,
            body: body.to_string(),
        })
    }
}

/// A binary frame with its header block stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeBinaryFrame {
    pub headers: FrameHeaders,
    pub kind: EdgeMessageKind,
    pub payload: Bytes,
}

impl EdgeBinaryFrame {
    /// Parses a binary frame.
    ///
    /// A frame starting with an ASCII letter carries a header block ended by a
    /// blank line. Any other frame starts with a 2-byte big-endian header
    /// length. The payload is sliced from `data` without copying.
    pub fn parse(data: &Bytes) -> TTSResult<Self> {
        let first = *data
            .first()
            .ok_or_else(|| TTSError::ProtocolError("Empty binary frame".to_string()))?;

        let (block, payload_start) = if first.is_ascii_alphabetic() {
            let (end, start) = find_header_end(data).ok_or_else(|| {
                TTSError::ProtocolError("Binary frame has no header terminator".to_string())
            })?;
            (utf8_block(&data[..end])?, start)
        } else {
            if data.len() < 2 {
                return Err(TTSError::ProtocolError(
                    "Binary frame too short for header length".to_string(),
                ));
            }
            let header_len = u16::from_be_bytes([data[0], data[1]]) as usize;
            let start = 2 + header_len;
            if start > data.len() {
                return Err(TTSError::ProtocolError(format!(
                    "Header length {header_len} exceeds frame size {}",
                    data.len()
                )));
            }
            (utf8_block(&data[2..start])?, start)
        };

        let headers = FrameHeaders::parse(block)?;
        let kind = headers.require_path()?;
        Ok(Self {
            headers,
            kind,
            payload: data.slice(payload_start..),
        })
    }
}
