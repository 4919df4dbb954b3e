//! In-process mock of the Edge read-aloud websocket backend.
//!
//! Records every handshake and every text frame the client sends, then
//! answers according to a [`Behavior`]. Audio frames alternate between the
//! length-prefixed and blank-line framings so both parser paths are hit.

// Shared by several test binaries; each uses a different subset.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// How the mock answers once it has received both client frames.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Streams each chunk as an audio frame between control frames, then `turn.end`.
    Stream(Vec<Vec<u8>>),
    /// Streams the chunks, then closes without `turn.end`.
    CloseBeforeTurnEnd(Vec<Vec<u8>>),
    /// Sends `turn.start` and `turn.end` with no audio.
    NoAudio,
    /// Sends a binary frame with no header terminator.
    Malformed,
    /// Never answers.
    Silent,
    /// Waits before streaming, so concurrent sessions overlap.
    Delayed(Duration, Vec<Vec<u8>>),
}

/// What the client presented during the websocket handshake.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Path and query of the request URI.
    pub uri: String,
    pub user_agent: Option<String>,
    pub origin: Option<String>,
}

struct MockState {
    behavior: Behavior,
    connections: AtomicU64,
    handshakes: Mutex<Vec<Handshake>>,
    frames: Mutex<Vec<String>>,
}

pub struct EdgeMock {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl EdgeMock {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState {
            behavior,
            connections: AtomicU64::new(0),
            handshakes: Mutex::new(Vec::new()),
            frames: Mutex::new(Vec::new()),
        });

        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = accept_state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        eprintln!("Mock backend connection error: {e}");
                    }
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}/consumer/speech/synthesize/readaloud/edge/v1", self.addr)
    }

    pub fn connections(&self) -> u64 {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn handshakes(&self) -> Vec<Handshake> {
        self.state.handshakes.lock().unwrap().clone()
    }

    /// Text frames received from clients, in arrival order.
    pub fn frames(&self) -> Vec<String> {
        self.state.frames.lock().unwrap().clone()
    }
}

impl Drop for EdgeMock {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn text_frame(path: &str, body: &str) -> Message {
    Message::Text(
        format!(
            "X-RequestId:0f1e2d3c4b5a69788796a5b4c3d2e1f0\r\nContent-Type:application/json; charset=utf-8\r\nPath:{path}\r\n\r\n{body}"
        )
        .into(),
    )
}

/// Audio frame with a 2-byte big-endian header length prefix.
pub fn prefixed_audio_frame(payload: &[u8]) -> Message {
    let headers = b"X-RequestId:0f1e2d3c4b5a69788796a5b4c3d2e1f0\r\nContent-Type:audio/mpeg\r\nPath:audio\r\n";
    let mut data = Vec::with_capacity(2 + headers.len() + payload.len());
    data.extend_from_slice(&(headers.len() as u16).to_be_bytes());
    data.extend_from_slice(headers);
    data.extend_from_slice(payload);
    Message::Binary(data.into())
}

/// Audio frame whose header block ends at a blank line.
pub fn blank_line_audio_frame(payload: &[u8]) -> Message {
    let mut data = b"Path:audio\r\nContent-Type:audio/mpeg\r\n\r\n".to_vec();
    data.extend_from_slice(payload);
    Message::Binary(data.into())
}

async fn stream_chunks<S>(write: &mut S, chunks: &[Vec<u8>]) -> Result<(), WsError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    write
        .send(text_frame("turn.start", r#"{"context":{"serviceTag":"mock"}}"#))
        .await?;
    for (i, chunk) in chunks.iter().enumerate() {
        let frame = if i % 2 == 0 {
            prefixed_audio_frame(chunk)
        } else {
            blank_line_audio_frame(chunk)
        };
        write.send(frame).await?;
        write
            .send(text_frame(
                "audio.metadata",
                r#"{"Metadata":[{"Type":"WordBoundary"}]}"#,
            ))
            .await?;
        if i == 0 {
            write.send(text_frame("response", "{}")).await?;
        }
    }
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handshake_state = state.clone();
    let ws_stream = accept_hdr_async(stream, move |req: &Request, resp: Response| {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let handshake = Handshake {
            uri: req.uri().to_string(),
            user_agent: header("user-agent"),
            origin: header("origin"),
        };
        handshake_state.handshakes.lock().unwrap().push(handshake);
        Ok::<Response, ErrorResponse>(resp)
    })
    .await?;

    state.connections.fetch_add(1, Ordering::SeqCst);
    let (mut write, mut read) = ws_stream.split();

    // speech.config, then ssml
    let mut received = 0;
    while received < 2 {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                state.frames.lock().unwrap().push(text.to_string());
                received += 1;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(()),
        }
    }

    match &state.behavior {
        Behavior::Stream(chunks) => {
            stream_chunks(&mut write, chunks).await?;
            write.send(text_frame("turn.end", "{}")).await?;
        }
        Behavior::Delayed(delay, chunks) => {
            tokio::time::sleep(*delay).await;
            stream_chunks(&mut write, chunks).await?;
            write.send(text_frame("turn.end", "{}")).await?;
        }
        Behavior::CloseBeforeTurnEnd(chunks) => {
            stream_chunks(&mut write, chunks).await?;
            write.send(Message::Close(None)).await?;
            return Ok(());
        }
        Behavior::NoAudio => {
            write.send(text_frame("turn.start", "{}")).await?;
            write.send(text_frame("turn.end", "{}")).await?;
        }
        Behavior::Malformed => {
            write
                .send(Message::Binary(b"Path:audio no terminator".to_vec().into()))
                .await?;
        }
        Behavior::Silent => {}
    }

    // drain until the client hangs up
    while let Some(msg) = read.next().await {
        if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
            break;
        }
    }
    Ok(())
}
