use crate::decode::{self, DecodeError};
use crate::dispatch::DispatchError;
use crate::encode;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle of one streaming connection. `Accepted` covers the window
/// between handshake and the first receive; `Closing` means an error
/// notification may still be written; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Streaming,
    Closing,
    Closed,
}

/// Per-connection state: identity, frame sequence counter for
/// diagnostics, and the pacing cursor. Owned exclusively by the
/// connection's handling task.
pub struct StreamSession {
    id: u64,
    state: SessionState,
    frames_received: u64,
    pacer: FramePacer,
}

impl StreamSession {
    pub fn new(id: u64, pacing_interval: Duration) -> Self {
        Self {
            id,
            state: SessionState::Accepted,
            frames_received: 0,
            pacer: FramePacer::new(pacing_interval),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn begin_streaming(&mut self) {
        debug_assert_eq!(self.state, SessionState::Accepted);
        self.state = SessionState::Streaming;
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Account for one received frame; returns its sequence number.
    pub fn next_frame(&mut self) -> u64 {
        self.frames_received += 1;
        self.frames_received
    }

    /// Unrecoverable per-session failure: an error notification may
    /// still go out before the socket closes.
    pub fn begin_close(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closing;
        }
    }

    /// Transport already gone; skip the notification step.
    pub fn abort(&mut self) {
        self.state = SessionState::Closed;
    }

    pub fn finish_close(&mut self) {
        self.state = SessionState::Closed;
    }

    pub fn pacer(&mut self) -> &mut FramePacer {
        &mut self.pacer
    }
}

/// Enforces the minimum interval between successive frame dispatches of
/// one streaming session, so a fast producer cannot monopolize the
/// shared engine.
pub struct FramePacer {
    interval: Duration,
    last_response: Option<Instant>,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_response: None,
        }
    }

    /// Sleep out the remainder of the pacing interval since the last
    /// response. The first frame passes immediately.
    pub async fn wait_turn(&self) {
        if let Some(last) = self.last_response {
            tokio::time::sleep_until(last + self.interval).await;
        }
    }

    /// Move the pacing cursor; called once per delivered response.
    pub fn mark(&mut self) {
        self.last_response = Some(Instant::now());
    }
}

/// Drive one WebSocket streaming session:
/// receive -> pace -> decode -> dispatch -> encode -> send, repeated
/// until disconnect or an unrecoverable per-session error.
pub async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut session = StreamSession::new(state.next_session_id(), state.pacing_interval);
    tracing::info!(session_id = session.id(), "New WebSocket connection established");
    session.begin_streaming();

    while session.is_streaming() {
        let message = match socket.recv().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::debug!(session_id = session.id(), error = %e, "WebSocket transport error");
                session.abort();
                break;
            }
            None => {
                session.abort();
                break;
            }
        };

        let payload = match message {
            Message::Text(text) => decode::decode_text_frame(&text),
            Message::Binary(bytes) => decode::decode_binary_frame(&bytes),
            Message::Close(_) => {
                session.abort();
                break;
            }
            // Ping/pong are handled by axum; nothing to do here.
            _ => continue,
        };

        let seq = session.next_frame();

        // Cap this client's dispatch rate before touching the shared
        // engine path.
        session.pacer().wait_turn().await;

        let image = match payload {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!(session_id = session.id(), seq, error = %e, "Frame decode failed");
                notify_error(&mut socket, &e).await;
                session.begin_close();
                break;
            }
        };

        match state.dispatch.submit(image, session.id()).await {
            Ok(detections) => {
                let body = match encode::ws_payload(&detections) {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::error!(session_id = session.id(), error = %e, "Response encoding failed");
                        session.abort();
                        break;
                    }
                };
                if socket.send(Message::Text(body)).await.is_err() {
                    session.abort();
                    break;
                }
                session.pacer().mark();
            }
            Err(DispatchError::Overloaded) => {
                // Recoverable: drop this frame, tell the client, keep
                // the stream alive.
                tracing::debug!(session_id = session.id(), seq, "Engine overloaded, frame dropped");
                let note = encode::error_payload("overloaded", "engine busy, frame dropped");
                if socket.send(Message::Text(note)).await.is_err() {
                    session.abort();
                    break;
                }
                session.pacer().mark();
            }
            Err(e) => {
                tracing::warn!(session_id = session.id(), seq, error = %e, "Dispatch failed");
                notify_dispatch_error(&mut socket, &e).await;
                session.begin_close();
                break;
            }
        }
    }

    if session.state() == SessionState::Closing {
        let _ = socket.send(Message::Close(None)).await;
    }
    session.finish_close();

    tracing::info!(
        session_id = session.id(),
        frames_received = session.frames_received(),
        "WebSocket session closed"
    );
}

async fn notify_error(socket: &mut WebSocket, err: &DecodeError) {
    let note = encode::error_payload("decode", &err.to_string());
    let _ = socket.send(Message::Text(note)).await;
}

async fn notify_dispatch_error(socket: &mut WebSocket, err: &DispatchError) {
    let kind = match err {
        DispatchError::Overloaded => "overloaded",
        DispatchError::Timeout(_) => "timeout",
        DispatchError::Engine(_) => "inference",
        DispatchError::Closed => "unavailable",
    };
    let note = encode::error_payload(kind, &err.to_string());
    let _ = socket.send(Message::Text(note)).await;
}
