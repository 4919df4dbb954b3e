//! Edge TTS provider implementation.
//!
//! One call to [`EdgeTTS::synthesize`] runs one full websocket session:
//! connect, send the speech config, send the markup document, then read
//! frames until `turn.end`. Audio payloads are appended in arrival order.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, Stream, StreamExt};
use http::HeaderValue;
use time::OffsetDateTime;
use tokio::time::{Instant, timeout, timeout_at};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use super::EDGE_ORIGIN;
use super::config::{EdgeOutputFormat, EdgeTTSConfig, build_ssml};
use super::messages::{
    EdgeBinaryFrame, EdgeMessageKind, EdgeTextFrame, speech_config_frame, ssml_frame, timestamp,
};
use crate::core::request::SynthesisRequest;
use crate::core::tts::base::{BaseTTS, TTSError, TTSResult};
use crate::utils::generate_request_id;

// =============================================================================
// Session State Machine
// =============================================================================

/// Lifecycle of a single synthesis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    ConfigSent,
    ContentSent,
    Streaming,
    Completed,
    Failed,
}

/// Per-session state: lifecycle position plus the audio accumulated so far.
#[derive(Debug)]
pub struct EdgeSession {
    state: SessionState,
    audio: BytesMut,
    audio_frames: usize,
}

impl Default for EdgeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            audio: BytesMut::new(),
            audio_frames: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn audio_len(&self) -> usize {
        self.audio.len()
    }

    fn advance(&mut self, from: SessionState, to: SessionState) -> TTSResult<()> {
        if self.state != from {
            let err = TTSError::InternalError(format!(
                "Invalid session transition {:?} -> {to:?} (session is {:?})",
                from, self.state
            ));
            self.state = SessionState::Failed;
            return Err(err);
        }
        self.state = to;
        Ok(())
    }

    pub fn on_connected(&mut self) -> TTSResult<()> {
        self.advance(SessionState::Disconnected, SessionState::Connected)
    }

    pub fn on_config_sent(&mut self) -> TTSResult<()> {
        self.advance(SessionState::Connected, SessionState::ConfigSent)
    }

    pub fn on_content_sent(&mut self) -> TTSResult<()> {
        self.advance(SessionState::ConfigSent, SessionState::ContentSent)
    }

    /// Records a failure and hands the error back.
    pub fn fail(&mut self, error: TTSError) -> TTSError {
        self.state = SessionState::Failed;
        error
    }

    /// Handles one inbound websocket message.
    ///
    /// # Returns
    /// * `Ok(true)` - `turn.end` received, stop reading
    /// * `Ok(false)` - Continue reading
    /// * `Err(TTSError)` - Session failed
    pub fn handle_message(&mut self, message: Message) -> TTSResult<bool> {
        match self.state {
            SessionState::ContentSent => self.state = SessionState::Streaming,
            SessionState::Streaming => {}
            other => {
                return Err(self.fail(TTSError::InternalError(format!(
                    "Received frame while session is {other:?}"
                ))));
            }
        }

        match message {
            Message::Text(text) => {
                let frame = EdgeTextFrame::parse(text.as_str()).map_err(|e| self.fail(e))?;
                match frame.kind {
                    EdgeMessageKind::TurnEnd => {
                        debug!("Received turn.end after {} audio frames", self.audio_frames);
                        return Ok(true);
                    }
                    EdgeMessageKind::TurnStart => debug!("Received turn.start"),
                    EdgeMessageKind::Response => debug!("Received response frame"),
                    EdgeMessageKind::AudioMetadata => {
                        debug!("Received audio.metadata ({} bytes)", frame.body.len())
                    }
                    other => debug!("Ignoring text frame {:?}", other),
                }
            }

            Message::Binary(data) => {
                let frame = EdgeBinaryFrame::parse(&data).map_err(|e| self.fail(e))?;
                if frame.kind != EdgeMessageKind::Audio {
                    debug!("Ignoring binary frame {:?}", frame.kind);
                } else if frame.payload.is_empty() {
                    debug!("Skipping empty audio frame");
                } else {
                    self.audio.extend_from_slice(&frame.payload);
                    self.audio_frames += 1;
                }
            }

            Message::Close(close_frame) => {
                return Err(self.fail(TTSError::NetworkError(format!(
                    "Connection closed before turn.end: {close_frame:?}"
                ))));
            }

            Message::Ping(_) | Message::Pong(_) => {}

            _ => debug!("Received unexpected message type"),
        }

        Ok(false)
    }

    /// Completes the session after `turn.end`.
    ///
    /// # Errors
    /// `AudioGenerationFailed` if no audio bytes were received.
    pub fn finish(&mut self) -> TTSResult<Bytes> {
        if self.state != SessionState::Streaming {
            return Err(self.fail(TTSError::InternalError(format!(
                "Cannot complete session in state {:?}",
                self.state
            ))));
        }
        if self.audio.is_empty() {
            return Err(self.fail(TTSError::AudioGenerationFailed(
                "turn.end received without any audio data".to_string(),
            )));
        }
        self.state = SessionState::Completed;
        Ok(std::mem::take(&mut self.audio).freeze())
    }
}

/// Reads frames until `turn.end` or failure.
///
/// The whole receive phase is bounded by `receive_timeout`, measured from the
/// first read. There is no other cancellation point.
pub(crate) async fn receive_audio<S>(
    stream: &mut S,
    session: &mut EdgeSession,
    receive_timeout: Duration,
) -> TTSResult<Bytes>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let deadline = Instant::now() + receive_timeout;

    loop {
        match timeout_at(deadline, stream.next()).await {
            Err(_) => {
                return Err(session.fail(TTSError::TimeoutError(format!(
                    "No turn.end within {receive_timeout:?} ({} bytes received)",
                    session.audio_len()
                ))));
            }
            Ok(None) => {
                return Err(session.fail(TTSError::NetworkError(
                    "Stream ended before turn.end".to_string(),
                )));
            }
            Ok(Some(Err(e))) => {
                return Err(session.fail(TTSError::NetworkError(format!(
                    "WebSocket read failed: {e}"
                ))));
            }
            Ok(Some(Ok(message))) => {
                if session.handle_message(message)? {
                    return session.finish();
                }
            }
        }
    }
}

// =============================================================================
// EdgeTTS
// =============================================================================

/// Edge read-aloud synthesis backend.
#[derive(Debug, Clone)]
pub struct EdgeTTS {
    config: EdgeTTSConfig,
}

impl EdgeTTS {
    /// Creates a new provider after validating the configuration.
    pub fn new(config: EdgeTTSConfig) -> TTSResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EdgeTTSConfig {
        &self.config
    }

    /// Builds the signed handshake request with browser-style headers.
    fn build_request(
        &self,
    ) -> TTSResult<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TTSError::InternalError(format!("System clock before epoch: {e}")))?
            .as_secs();
        let url = self
            .config
            .connection_url(&generate_request_id(), unix_secs)?;

        let mut request = url.as_str().into_client_request().map_err(|e| {
            TTSError::ConnectionFailed(format!("Failed to create WebSocket request: {e}"))
        })?;

        let header_value = |value: &str| {
            HeaderValue::from_str(value).map_err(|e| {
                TTSError::InvalidConfiguration(format!("Invalid header value {value:?}: {e}"))
            })
        };
        let headers = request.headers_mut();
        headers.insert(http::header::USER_AGENT, header_value(&self.config.user_agent)?);
        headers.insert(http::header::ORIGIN, HeaderValue::from_static(EDGE_ORIGIN));
        headers.insert(http::header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(
            http::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );

        Ok(request)
    }
}

#[async_trait]
impl BaseTTS for EdgeTTS {
    async fn synthesize(&self, request: &SynthesisRequest) -> TTSResult<Bytes> {
        let mut session = EdgeSession::new();
        let format = EdgeOutputFormat::from_format(&request.format);
        let request_id = generate_request_id();

        let handshake = self.build_request()?;
        let (ws_stream, _response) = match timeout(
            self.config.connect_timeout,
            connect_async(handshake),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                return Err(session.fail(TTSError::ConnectionFailed(format!(
                    "Failed to connect to Edge TTS: {e}"
                ))));
            }
            Err(_) => {
                return Err(session.fail(TTSError::TimeoutError(format!(
                    "Connection not established within {:?}",
                    self.config.connect_timeout
                ))));
            }
        };
        session.on_connected()?;
        debug!(request_id = %request_id, "Connected to Edge TTS");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let config_frame =
            speech_config_frame(&request_id, &timestamp(OffsetDateTime::now_utc())?, format);
        ws_sink
            .send(Message::Text(config_frame.into()))
            .await
            .map_err(|e| {
                session.fail(TTSError::NetworkError(format!(
                    "Failed to send speech config: {e}"
                )))
            })?;
        session.on_config_sent()?;

        let content_frame = ssml_frame(
            &request_id,
            &timestamp(OffsetDateTime::now_utc())?,
            &build_ssml(request),
        );
        ws_sink
            .send(Message::Text(content_frame.into()))
            .await
            .map_err(|e| {
                session.fail(TTSError::NetworkError(format!("Failed to send ssml: {e}")))
            })?;
        session.on_content_sent()?;

        let result = receive_audio(&mut ws_stream, &mut session, self.config.receive_timeout).await;

        if let Err(e) = ws_sink.close().await {
            debug!("Error closing Edge TTS connection: {e}");
        }

        match &result {
            Ok(audio) => info!(
                request_id = %request_id,
                voice = %request.voice,
                bytes = audio.len(),
                "Edge TTS synthesis completed"
            ),
            Err(e) => warn!(request_id = %request_id, "Edge TTS synthesis failed: {e}"),
        }

        result
    }

    fn get_provider_info(&self) -> serde_json::Value {
        serde_json::json!({
            "provider": "edge",
            "version": "1.0.0",
            "api_type": "WebSocket",
            "endpoint": self.config.endpoint,
            "connect_timeout_ms": self.config.connect_timeout.as_millis() as u64,
            "receive_timeout_ms": self.config.receive_timeout.as_millis() as u64,
            "supported_formats": [
                EdgeOutputFormat::Mp3.as_str(),
                EdgeOutputFormat::Wav.as_str(),
                EdgeOutputFormat::Ogg.as_str(),
            ],
        })
    }
}
