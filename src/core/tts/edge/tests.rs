//! Tests for the Edge TTS provider.
//!
//! These tests cover:
//! - Markup rendering and prosody formatting
//! - Connection signing
//! - Strict frame parsing for both binary framings
//! - The session state machine and receive loop
//!
//! Network round trips against a local mock server live in `tests/`.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use time::macros::datetime;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::config::*;
use super::messages::*;
use super::provider::{EdgeSession, EdgeTTS, SessionState, receive_audio};
use super::*;
use crate::core::request::SynthesisRequest;
use crate::core::tts::base::{BaseTTS, TTSError};

// =============================================================================
// Test Helpers
// =============================================================================

fn text_frame(path: &str) -> Message {
    Message::Text(
        format!("X-RequestId:abc\r\nContent-Type:application/json\r\nPath:{path}\r\n\r\n{{}}")
            .into(),
    )
}

/// Binary audio frame using the 2-byte length prefix framing.
fn prefixed_audio(payload: &[u8]) -> Message {
    let header = b"X-RequestId:abc\r\nContent-Type:audio/mpeg\r\nPath:audio\r\n";
    let mut data = (header.len() as u16).to_be_bytes().to_vec();
    data.extend_from_slice(header);
    data.extend_from_slice(payload);
    Message::Binary(Bytes::from(data))
}

/// Binary audio frame using the blank-line framing.
fn blank_line_audio(payload: &[u8]) -> Message {
    let mut data = b"Path:audio\r\nContent-Type:audio/mpeg\r\n\r\n".to_vec();
    data.extend_from_slice(payload);
    Message::Binary(Bytes::from(data))
}

fn streaming_session() -> EdgeSession {
    let mut session = EdgeSession::new();
    session.on_connected().unwrap();
    session.on_config_sent().unwrap();
    session.on_content_sent().unwrap();
    session
}

fn request(text: &str) -> SynthesisRequest {
    SynthesisRequest::new(text)
        .with_voice("en-US-JennyNeural")
        .with_format("mp3")
        .with_speed(1.0)
}

// =============================================================================
// Prosody & Markup
// =============================================================================

#[test]
fn test_format_rate() {
    assert_eq!(format_rate(1.0), "default");
    assert_eq!(format_rate(1.5), "1.5");
    assert_eq!(format_rate(0.8), "0.8");
    assert_eq!(format_rate(1.23), "1.2");
    assert_eq!(format_rate(2.0), "2.0");
}

#[test]
fn test_format_pitch() {
    assert_eq!(format_pitch(0), "default");
    assert_eq!(format_pitch(5), "+5Hz");
    assert_eq!(format_pitch(-3), "-3Hz");
}

#[test]
fn test_locale_from_voice() {
    assert_eq!(locale_from_voice("en-US-JennyNeural"), "en-US");
    assert_eq!(locale_from_voice("zh-CN-XiaoxiaoNeural"), "zh-CN");
    assert_eq!(locale_from_voice("Kora"), "en-US");
    assert_eq!(locale_from_voice("not a-voice-name"), "en-US");
}

#[test]
fn test_build_ssml_escapes_plain_text() {
    let ssml = build_ssml(&request("Tom & Jerry <3").with_speed(1.5).with_pitch(5));
    assert!(ssml.contains(r#"xml:lang="en-US""#));
    assert!(ssml.contains(r#"<voice name="en-US-JennyNeural">"#));
    assert!(ssml.contains(r#"<prosody rate="1.5" pitch="+5Hz">Tom &amp; Jerry &lt;3</prosody>"#));
}

#[test]
fn test_build_ssml_trusted_markup_is_verbatim() {
    let ssml = build_ssml(&request(r#"Hi <break time="500ms"/> there"#).with_ssml(true));
    assert!(ssml.contains(r#"<prosody rate="default" pitch="default">Hi <break time="500ms"/> there</prosody>"#));
}

#[test]
fn test_output_format_table() {
    assert_eq!(
        EdgeOutputFormat::from_format("mp3").as_str(),
        "audio-24khz-48kbitrate-mono-mp3"
    );
    assert_eq!(
        EdgeOutputFormat::from_format("WAV").as_str(),
        "riff-24khz-16bit-mono-pcm"
    );
    assert_eq!(
        EdgeOutputFormat::from_format("ogg").as_str(),
        "ogg-24khz-16bit-mono-opus"
    );
    assert_eq!(EdgeOutputFormat::from_format("flac"), EdgeOutputFormat::Mp3);
    assert_eq!(EdgeOutputFormat::from_format("flac").extension(), ".mp3");
}

// =============================================================================
// Connection Signing
// =============================================================================

#[test]
fn test_sec_ms_gec_known_value() {
    assert_eq!(
        generate_sec_ms_gec(1_700_000_000, TRUSTED_CLIENT_TOKEN),
        "42301B335578FEFDAE2637DED1ABD614505D432559EC08032B82048483726AFF"
    );
}

#[test]
fn test_sec_ms_gec_five_minute_buckets() {
    let token = TRUSTED_CLIENT_TOKEN;
    // 1_699_999_800 starts the bucket containing 1_700_000_000
    assert_eq!(
        generate_sec_ms_gec(1_699_999_800, token),
        generate_sec_ms_gec(1_700_000_099, token)
    );
    assert_ne!(
        generate_sec_ms_gec(1_700_000_099, token),
        generate_sec_ms_gec(1_700_000_100, token)
    );
}

#[test]
fn test_connection_url_carries_signature() {
    let config = EdgeTTSConfig::default();
    let url = config.connection_url("conn123", 1_700_000_000).unwrap();
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    assert!(url.as_str().starts_with(EDGE_TTS_URL));
    assert!(pairs.contains(&("TrustedClientToken".into(), TRUSTED_CLIENT_TOKEN.into())));
    assert!(pairs.contains(&(
        "Sec-MS-GEC".into(),
        generate_sec_ms_gec(1_700_000_000, TRUSTED_CLIENT_TOKEN)
    )));
    assert!(pairs.contains(&("Sec-MS-GEC-Version".into(), SEC_MS_GEC_VERSION.into())));
    assert!(pairs.contains(&("ConnectionId".into(), "conn123".into())));
}

#[test]
fn test_config_validation() {
    assert!(EdgeTTSConfig::default().validate().is_ok());
    assert!(
        EdgeTTSConfig::default()
            .with_endpoint("https://example.com")
            .validate()
            .is_err()
    );
    assert!(
        EdgeTTSConfig::default()
            .with_receive_timeout(Duration::ZERO)
            .validate()
            .is_err()
    );
    assert!(EdgeTTS::new(EdgeTTSConfig::default().with_endpoint("::nope")).is_err());
}

#[test]
fn test_provider_info() {
    let tts = EdgeTTS::new(EdgeTTSConfig::default()).unwrap();
    let info = tts.get_provider_info();
    assert_eq!(info["provider"], "edge");
    assert_eq!(info["api_type"], "WebSocket");
    assert_eq!(info["receive_timeout_ms"], 30_000);
}

// =============================================================================
// Outbound Frames
// =============================================================================

#[test]
fn test_timestamp_format() {
    let ts = timestamp(datetime!(2024-01-02 03:04:05.678 UTC)).unwrap();
    assert_eq!(ts, "2024-01-02T03:04:05.678Z");
}

#[test]
fn test_speech_config_frame() {
    let frame = speech_config_frame("req1", "2024-01-02T03:04:05.678Z", EdgeOutputFormat::Wav);
    let (head, body) = frame.split_once("\r\n\r\n").unwrap();
    assert_eq!(
        head,
        "Path: speech.config\r\nContent-Type: application/json; charset=utf-8\r\nX-RequestId: req1\r\nX-Timestamp: 2024-01-02T03:04:05.678Z"
    );
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    let audio = &json["context"]["synthesis"]["audio"];
    assert_eq!(audio["outputFormat"], "riff-24khz-16bit-mono-pcm");
    assert_eq!(audio["metadataoptions"]["wordBoundaryEnabled"], "true");
    assert_eq!(audio["metadataoptions"]["sentenceBoundaryEnabled"], "false");
}

#[test]
fn test_ssml_frame() {
    let frame = ssml_frame("req1", "ts", "<speak/>");
    assert_eq!(
        frame,
        "Path: ssml\r\nContent-Type: application/ssml+xml\r\nX-RequestId: req1\r\nX-Timestamp: ts\r\n\r\n<speak/>"
    );
}

// =============================================================================
// Inbound Frame Parsing
// =============================================================================

#[test]
fn test_parse_text_frame() {
    let frame = EdgeTextFrame::parse(
        "X-RequestId:abc\r\nContent-Type:application/json; charset=utf-8\r\nPath:turn.end\r\n\r\n{}",
    )
    .unwrap();
    assert_eq!(frame.kind, EdgeMessageKind::TurnEnd);
    assert_eq!(frame.headers.get("x-requestid"), Some("abc"));
    assert_eq!(frame.body, "{}");
}

#[test]
fn test_parse_text_frame_requires_path() {
    let err = EdgeTextFrame::parse("X-RequestId:abc\r\n\r\n{}").unwrap_err();
    assert!(matches!(err, TTSError::ProtocolError(_)));
}

#[test]
fn test_parse_text_frame_rejects_garbage_header() {
    let err = EdgeTextFrame::parse("this is not a header\r\n\r\nbody").unwrap_err();
    assert!(matches!(err, TTSError::ProtocolError(_)));
}

#[test]
fn test_body_mentioning_turn_end_is_not_terminal() {
    let frame =
        EdgeTextFrame::parse("Path:audio.metadata\r\n\r\n{\"text\":\"Path:turn.end\"}").unwrap();
    assert_eq!(frame.kind, EdgeMessageKind::AudioMetadata);
}

#[test]
fn test_parse_length_prefixed_binary_frame() {
    let Message::Binary(data) = prefixed_audio(b"\x00\x01Path:audio\r\n\r\n") else {
        unreachable!()
    };
    let frame = EdgeBinaryFrame::parse(&data).unwrap();
    assert_eq!(frame.kind, EdgeMessageKind::Audio);
    // payload bytes resembling headers are kept verbatim
    assert_eq!(&frame.payload[..], b"\x00\x01Path:audio\r\n\r\n");
}

#[test]
fn test_parse_blank_line_binary_frame() {
    let Message::Binary(data) = blank_line_audio(b"ID3\x04") else {
        unreachable!()
    };
    let frame = EdgeBinaryFrame::parse(&data).unwrap();
    assert_eq!(frame.kind, EdgeMessageKind::Audio);
    assert_eq!(frame.headers.get("Content-Type"), Some("audio/mpeg"));
    assert_eq!(&frame.payload[..], b"ID3\x04");
}

#[test]
fn test_parse_blank_line_binary_frame_lf_only() {
    let data = Bytes::from_static(b"Path:audio\n\nDATA");
    let frame = EdgeBinaryFrame::parse(&data).unwrap();
    assert_eq!(&frame.payload[..], b"DATA");
}

#[test]
fn test_parse_binary_frame_errors() {
    let empty = Bytes::new();
    assert!(matches!(
        EdgeBinaryFrame::parse(&empty),
        Err(TTSError::ProtocolError(_))
    ));

    let truncated = Bytes::from_static(&[0x00, 0x40, b'P']);
    assert!(matches!(
        EdgeBinaryFrame::parse(&truncated),
        Err(TTSError::ProtocolError(_))
    ));

    let no_terminator = Bytes::from_static(b"Path:audio\r\nDATA");
    assert!(matches!(
        EdgeBinaryFrame::parse(&no_terminator),
        Err(TTSError::ProtocolError(_))
    ));

    let mut invalid_utf8 = vec![0x00, 0x02, 0xff, 0xfe];
    invalid_utf8.extend_from_slice(b"DATA");
    assert!(matches!(
        EdgeBinaryFrame::parse(&Bytes::from(invalid_utf8)),
        Err(TTSError::ProtocolError(_))
    ));
}

// =============================================================================
// Session State Machine
// =============================================================================

#[test]
fn test_session_transitions_in_order() {
    let mut session = EdgeSession::new();
    assert_eq!(session.state(), SessionState::Disconnected);
    session.on_connected().unwrap();
    assert_eq!(session.state(), SessionState::Connected);
    session.on_config_sent().unwrap();
    assert_eq!(session.state(), SessionState::ConfigSent);
    session.on_content_sent().unwrap();
    assert_eq!(session.state(), SessionState::ContentSent);

    assert!(!session.handle_message(text_frame("turn.start")).unwrap());
    assert_eq!(session.state(), SessionState::Streaming);
}

#[test]
fn test_session_rejects_out_of_order_transition() {
    let mut session = EdgeSession::new();
    assert!(session.on_config_sent().is_err());
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn test_session_rejects_frames_before_content() {
    let mut session = EdgeSession::new();
    session.on_connected().unwrap();
    assert!(session.handle_message(text_frame("turn.start")).is_err());
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn test_session_turn_end_without_audio_fails() {
    let mut session = streaming_session();
    assert!(session.handle_message(text_frame("turn.end")).unwrap());
    assert!(matches!(
        session.finish(),
        Err(TTSError::AudioGenerationFailed(_))
    ));
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn test_session_ignores_non_audio_binary_and_empty_payloads() {
    let mut session = streaming_session();
    let other = Message::Binary(Bytes::from_static(b"Path:audio.other\r\n\r\nXYZ"));
    assert!(!session.handle_message(other).unwrap());
    assert!(!session.handle_message(prefixed_audio(b"")).unwrap());
    assert_eq!(session.audio_len(), 0);
}

#[test]
fn test_session_close_before_turn_end_fails() {
    let mut session = streaming_session();
    let err = session.handle_message(Message::Close(None)).unwrap_err();
    assert!(matches!(err, TTSError::NetworkError(_)));
    assert_eq!(session.state(), SessionState::Failed);
}

// =============================================================================
// Receive Loop
// =============================================================================

#[tokio::test]
async fn test_receive_reassembles_in_order() {
    let frames: Vec<Result<Message, WsError>> = vec![
        Ok(text_frame("turn.start")),
        Ok(text_frame("response")),
        Ok(prefixed_audio(b"A")),
        Ok(text_frame("audio.metadata")),
        Ok(blank_line_audio(b"B")),
        Ok(text_frame("audio.metadata")),
        Ok(prefixed_audio(b"C")),
        Ok(text_frame("turn.end")),
        Ok(prefixed_audio(b"late")),
    ];
    let mut stream = stream::iter(frames);
    let mut session = streaming_session();

    let audio = receive_audio(&mut stream, &mut session, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(&audio[..], b"ABC");
    assert_eq!(session.state(), SessionState::Completed);
}

#[tokio::test]
async fn test_receive_keeps_duplicate_frames() {
    let frames: Vec<Result<Message, WsError>> = vec![
        Ok(prefixed_audio(b"xx")),
        Ok(prefixed_audio(b"xx")),
        Ok(text_frame("turn.end")),
    ];
    let mut session = streaming_session();
    let audio = receive_audio(&mut stream::iter(frames), &mut session, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(&audio[..], b"xxxx");
}

#[tokio::test]
async fn test_receive_stream_end_before_turn_end() {
    let frames: Vec<Result<Message, WsError>> = vec![Ok(prefixed_audio(b"A"))];
    let mut session = streaming_session();
    let err = receive_audio(&mut stream::iter(frames), &mut session, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, TTSError::NetworkError(_)));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_receive_transport_error() {
    let frames: Vec<Result<Message, WsError>> = vec![
        Ok(prefixed_audio(b"A")),
        Err(WsError::ConnectionClosed),
    ];
    let mut session = streaming_session();
    let err = receive_audio(&mut stream::iter(frames), &mut session, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, TTSError::NetworkError(_)));
}

#[tokio::test]
async fn test_receive_malformed_frame_is_protocol_error() {
    let frames: Vec<Result<Message, WsError>> = vec![
        Ok(prefixed_audio(b"A")),
        Ok(Message::Text("garbage without headers".into())),
        Ok(text_frame("turn.end")),
    ];
    let mut session = streaming_session();
    let err = receive_audio(&mut stream::iter(frames), &mut session, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, TTSError::ProtocolError(_)));
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_receive_deadline_elapses() {
    let mut stream = stream::iter(vec![Ok::<_, WsError>(prefixed_audio(b"A"))])
        .chain(stream::pending());
    let mut session = streaming_session();

    let err = receive_audio(&mut stream, &mut session, Duration::from_secs(30))
        .await
        .unwrap_err();

    assert!(matches!(err, TTSError::TimeoutError(_)));
    assert_eq!(session.state(), SessionState::Failed);
}
