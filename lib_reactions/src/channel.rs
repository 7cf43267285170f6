//! # Channel Manager
//!
//! One persistent WebSocket session per presentation id. A session is an
//! explicitly owned object with an `open`/`close` contract: opening spawns a
//! dedicated socket task, and every exit path (explicit close, drop of the
//! last handle, remote close, socket error) releases the connection.
//!
//! Events flow through a task+channel model rather than callbacks: the
//! socket task pushes [`ChannelEvent`]s onto an unbounded mpsc channel in
//! receipt order, and the consumer drains them from the receiver returned
//! by `open`.
//!
//! Delivery policy is at-most-once with no buffering: [`ChannelSession::send`]
//! silently drops the reaction unless the session is exactly `Open`.
//! Reactions are low-stakes, high-frequency, user-repeatable signals.
//!
//! There is no automatic reconnection at this layer. A dropped connection
//! transitions to `Closed` and surfaces as a [`ChannelEvent::Closed`]; the
//! consumer decides whether to open a fresh session.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tokio_util::sync::{CancellationToken, DropGuard};
use url::Url;

use crate::errors::ChannelError;
use crate::model::ReactionType;

/// Session lifecycle. `Connecting -> Open -> Closing -> Closed`, with a
/// direct `Connecting -> Closed` path on immediate connect failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Events emitted by a session's socket task, in receipt order.
#[derive(Debug)]
pub enum ChannelEvent {
    /// The connection is established; `send` is now live.
    Opened,
    /// A parsed inbound frame. The payload is an opaque change trigger and
    /// must not be trusted for state.
    Frame(serde_json::Value),
    /// A non-fatal or fatal channel error. Malformed frames are non-fatal:
    /// the session stays open and later frames are still delivered.
    Error(ChannelError),
    /// Terminal event; emitted exactly once per session.
    Closed,
}

struct SessionShared {
    presentation_id: String,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
    out_tx: mpsc::UnboundedSender<ReactionType>,
}

impl SessionShared {
    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().expect("session state lock poisoned");
        *state = next;
    }

    fn state(&self) -> SessionState {
        *self.state.lock().expect("session state lock poisoned")
    }
}

/// Handle to one live channel session. Cheap to clone; all clones refer to
/// the same underlying connection.
#[derive(Clone)]
pub struct ChannelSession {
    shared: Arc<SessionShared>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// Cancels the socket task when the last user-side handle goes away.
    /// Held here, not in `SessionShared`: the socket task owns a clone of
    /// the shared state, so a guard in there would never fire.
    _guard: Arc<DropGuard>,
}

impl ChannelSession {
    /// Opens a session for `presentation_id` against a `ws://`/`wss://` base
    /// URL. Returns immediately in `Connecting` state; progress is reported
    /// through the event receiver.
    pub fn open(
        ws_base: &str,
        presentation_id: &str,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let url = format!(
            "{}/ws/presentations/{}/",
            ws_base.trim_end_matches('/'),
            presentation_id
        );
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(SessionShared {
            presentation_id: presentation_id.to_string(),
            state: Mutex::new(SessionState::Connecting),
            cancel: CancellationToken::new(),
            out_tx,
        });

        let guard = shared.cancel.clone().drop_guard();
        let task = tokio::spawn(run_session(Arc::clone(&shared), url, event_tx, out_rx));

        let session = Self {
            shared,
            task: Arc::new(Mutex::new(Some(task))),
            _guard: Arc::new(guard),
        };
        (session, event_rx)
    }

    /// The presentation id this session is subscribed to.
    pub fn presentation_id(&self) -> &str {
        &self.shared.presentation_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Sends a reaction frame. Dropped silently unless the state is exactly
    /// `Open`: nothing is queued while connecting and nothing is transmitted
    /// after closure.
    pub fn send(&self, reaction: ReactionType) {
        if self.shared.state() != SessionState::Open {
            log::debug!(
                "dropping reaction '{}' for {}: channel not open",
                reaction,
                self.shared.presentation_id
            );
            return;
        }
        // The receiver lives inside the socket task; a failed send means the
        // session raced to Closed and the frame is simply dropped.
        let _ = self.shared.out_tx.send(reaction);
    }

    /// Closes the session and waits until the socket task has released the
    /// connection. Idempotent: closing a closed session is a no-op.
    pub async fn close(&self) {
        self.shared.cancel.cancel();
        let task = self.task.lock().expect("session task lock poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// Owns at most one live session and enforces the single-subscription rule:
/// opening a session for a new id fully closes the previous one (socket task
/// joined) before the new session's events can fire.
pub struct ChannelManager {
    ws_base: String,
    current: Option<ChannelSession>,
}

impl ChannelManager {
    /// Creates a manager for a `ws://`/`wss://` base URL.
    pub fn new(ws_base: &str) -> Result<Self, ChannelError> {
        let url = Url::parse(ws_base)?;
        Ok(Self {
            ws_base: url.to_string().trim_end_matches('/').to_string(),
            current: None,
        })
    }

    /// Opens a session for `presentation_id`, closing any previous session
    /// first so a stale subscription can never trigger reconciliation
    /// against the wrong id.
    pub async fn open(
        &mut self,
        presentation_id: &str,
    ) -> (ChannelSession, mpsc::UnboundedReceiver<ChannelEvent>) {
        if let Some(previous) = self.current.take() {
            log::info!(
                "closing channel for {} before opening {}",
                previous.presentation_id(),
                presentation_id
            );
            previous.close().await;
        }
        let (session, events) = ChannelSession::open(&self.ws_base, presentation_id);
        self.current = Some(session.clone());
        (session, events)
    }

    /// Closes the current session, if any.
    pub async fn close(&mut self) {
        if let Some(session) = self.current.take() {
            session.close().await;
        }
    }

    /// The currently owned session, if one is open.
    pub fn current(&self) -> Option<&ChannelSession> {
        self.current.as_ref()
    }
}

async fn run_session(
    shared: Arc<SessionShared>,
    url: String,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut out_rx: mpsc::UnboundedReceiver<ReactionType>,
) {
    log::info!("connecting channel: {}", url);

    let ws_stream = tokio::select! {
        _ = shared.cancel.cancelled() => {
            shared.set_state(SessionState::Closed);
            let _ = events.send(ChannelEvent::Closed);
            return;
        }
        connected = connect_async(url.as_str()) => match connected {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                log::error!("channel connect failed for {}: {}", shared.presentation_id, e);
                shared.set_state(SessionState::Closed);
                let _ = events.send(ChannelEvent::Error(ChannelError::Socket(e)));
                let _ = events.send(ChannelEvent::Closed);
                return;
            }
        }
    };

    shared.set_state(SessionState::Open);
    let _ = events.send(ChannelEvent::Opened);
    log::info!("channel open for {}", shared.presentation_id);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => {
                shared.set_state(SessionState::Closing);
                let _ = write.close().await;
                break;
            }
            Some(reaction) = out_rx.recv() => {
                let frame = serde_json::json!({ "reaction_type": reaction }).to_string();
                if let Err(e) = write.send(WsMessage::Text(frame.into())).await {
                    log::error!("channel send failed for {}: {}", shared.presentation_id, e);
                    let _ = events.send(ChannelEvent::Error(ChannelError::Socket(e)));
                    break;
                }
            }
            inbound = read.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<serde_json::Value>(text.as_str()) {
                        Ok(payload) => {
                            let _ = events.send(ChannelEvent::Frame(payload));
                        }
                        Err(e) => {
                            // Malformed-frame tolerance: report and keep going.
                            log::warn!(
                                "malformed inbound frame for {}: {}",
                                shared.presentation_id,
                                e
                            );
                            let _ = events.send(ChannelEvent::Error(ChannelError::Malformed(e)));
                        }
                    }
                }
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                Some(Ok(WsMessage::Close(_))) => {
                    log::info!("channel closed by server for {}", shared.presentation_id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::error!("channel read error for {}: {}", shared.presentation_id, e);
                    let _ = events.send(ChannelEvent::Error(ChannelError::Socket(e)));
                    break;
                }
                None => {
                    log::warn!("channel stream ended for {}", shared.presentation_id);
                    break;
                }
            }
        }
    }

    shared.set_state(SessionState::Closed);
    let _ = events.send(ChannelEvent::Closed);
}
