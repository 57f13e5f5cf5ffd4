//! Chat session runtimes
//!
//! Each open widget gets one `SessionRuntime` task that owns its dialogue and
//! transcript. The manager only routes events to it and disposes of it when
//! the widget closes.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;

use crate::completion::CompletionBridge;
use crate::state_machine::{DialogueState, DonorRecord, Event, SessionContext};
use crate::transcript::TranscriptEntry;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Default pause before an assistant message appears
pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(1000);

/// Default time without visitor events before a session is reaped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Session pacing
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    pub typing_delay: Duration,
    pub link_pause: Duration,
    pub idle_timeout: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            typing_delay: DEFAULT_TYPING_DELAY,
            link_pause: crate::state_machine::state::DEFAULT_LINK_PAUSE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl SessionTiming {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |name: &str| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
        };
        Self {
            typing_delay: millis("CAMPAIGN_CHAT_TYPING_DELAY_MS").unwrap_or(defaults.typing_delay),
            link_pause: millis("CAMPAIGN_CHAT_LINK_PAUSE_MS").unwrap_or(defaults.link_pause),
            idle_timeout: std::env::var("CAMPAIGN_CHAT_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map_or(defaults.idle_timeout, Duration::from_secs),
        }
    }
}

/// Errors from session lookup and delivery
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session is closed")]
    Closed,
}

/// Snapshot of a session as the widget renders it
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub state: DialogueState,
    pub transcript: Vec<TranscriptEntry>,
    pub confirm_buttons_visible: bool,
    /// Only ever leaves the server inside the donation link
    #[serde(skip)]
    pub donor: DonorRecord,
}

impl SessionView {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            state: DialogueState::Intro,
            transcript: Vec::new(),
            confirm_buttons_visible: false,
            donor: DonorRecord::default(),
        }
    }

    #[allow(dead_code)] // Used by tests
    pub fn last_text(&self) -> Option<&str> {
        self.transcript.last().map(|e| e.message.text.as_str())
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseEvent {
    Init { view: SessionView },
    Message { entry: TranscriptEntry },
    OptionsWithdrawn { ids: Vec<u64> },
    ConfirmButtons { visible: bool },
    StateChange { state: DialogueState },
    /// A streamed completion fragment, not yet part of the transcript
    Delta { text: String },
    Error { message: String },
}

impl SseEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            SseEvent::Init { .. } => "init",
            SseEvent::Message { .. } => "message",
            SseEvent::OptionsWithdrawn { .. } => "options_withdrawn",
            SseEvent::ConfirmButtons { .. } => "confirm_buttons",
            SseEvent::StateChange { .. } => "state_change",
            SseEvent::Delta { .. } => "delta",
            SseEvent::Error { .. } => "error",
        }
    }
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub session_id: String,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    view_rx: watch::Receiver<SessionView>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Queue an event for the runtime
    pub async fn send(&self, event: Event) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }
        self.event_tx
            .send(event)
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Latest snapshot
    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    /// Stop the runtime and drop anything still pending
    pub fn close(&self) {
        self.cancel.cancel();
    }

    #[allow(dead_code)] // Used by tests
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Manager for all open sessions
pub struct SessionManager {
    bridge: CompletionBridge,
    timing: SessionTiming,
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionManager {
    pub fn new(bridge: CompletionBridge, timing: SessionTiming) -> Self {
        Self {
            bridge,
            timing,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Mount a new session; it starts at `Intro` and greets the visitor.
    /// The entry is dropped again once the runtime stops, whether it was
    /// closed or went idle.
    pub async fn open(&self) -> SessionHandle {
        let session_id = uuid::Uuid::new_v4().to_string();
        let context = SessionContext::new(&session_id).with_link_pause(self.timing.link_pause);

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (view_tx, view_rx) = watch::channel(SessionView::new(&session_id));
        let cancel = CancellationToken::new();

        let runtime = SessionRuntime::new(
            context,
            self.bridge.clone(),
            self.timing.typing_delay,
            self.timing.idle_timeout,
            event_rx,
            broadcast_tx.clone(),
            view_tx,
            cancel.clone(),
        );
        let handle = SessionHandle {
            session_id: session_id.clone(),
            event_tx,
            broadcast_tx,
            view_rx,
            cancel,
        };

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), handle.clone());
        tracing::info!(session_id = %session_id, "Session opened");

        let sessions = Arc::clone(&self.sessions);
        let reaped_id = session_id.clone();
        tokio::spawn(async move {
            runtime.run().await;
            if sessions.write().await.remove(&reaped_id).is_some() {
                tracing::info!(session_id = %reaped_id, "Session reaped");
            }
        });

        handle
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Unmount a session and cancel its pending work
    pub async fn close(&self, session_id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        handle.close();
        tracing::info!(session_id = %session_id, "Session closed");
        Ok(())
    }

    #[allow(dead_code)] // Used by tests
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
