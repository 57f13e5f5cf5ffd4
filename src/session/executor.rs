//! Session runtime executor

use super::{SessionView, SseEvent};
use crate::completion::{ChatMessage, CompletionBridge};
use crate::state_machine::{transition, Dialogue, Effect, Event, Pacing, SessionContext};
use crate::transcript::Transcript;
use futures::StreamExt;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Runs one session's dialogue, one event at a time
pub struct SessionRuntime {
    context: SessionContext,
    dialogue: Dialogue,
    transcript: Transcript,
    confirm_buttons_visible: bool,
    bridge: CompletionBridge,
    typing_delay: Duration,
    idle_timeout: Duration,
    event_rx: mpsc::Receiver<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    view_tx: watch::Sender<SessionView>,
    /// Cancels pending emissions and in-flight completions on close
    cancel: CancellationToken,
}

impl SessionRuntime {
    pub fn new(
        context: SessionContext,
        bridge: CompletionBridge,
        typing_delay: Duration,
        idle_timeout: Duration,
        event_rx: mpsc::Receiver<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        view_tx: watch::Sender<SessionView>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            context,
            dialogue: Dialogue::default(),
            transcript: Transcript::new(),
            confirm_buttons_visible: false,
            bridge,
            typing_delay,
            idle_timeout,
            event_rx,
            broadcast_tx,
            view_tx,
            cancel,
        }
    }

    pub async fn run(mut self) {
        let session_id = self.context.session_id.clone();
        tracing::info!(session_id = %session_id, "Starting session runtime");

        self.process_event(Event::Mount).await;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                event = self.event_rx.recv() => match event {
                    Some(event) => self.process_event(event).await,
                    None => break,
                },
                () = tokio::time::sleep(self.idle_timeout) => {
                    tracing::info!(
                        session_id = %session_id,
                        idle_secs = self.idle_timeout.as_secs(),
                        "Session idle, closing"
                    );
                    break;
                }
            }
        }
        self.cancel.cancel();

        tracing::info!(
            session_id = %session_id,
            messages = self.transcript.len(),
            "Session runtime stopped"
        );
    }

    /// Apply `event` and everything its effects feed back, before the next
    /// queued event is looked at
    async fn process_event(&mut self, event: Event) {
        let mut events = VecDeque::from([event]);

        while let Some(current) = events.pop_front() {
            if self.cancel.is_cancelled() {
                return;
            }

            let name = current.name();
            let result = match transition(&self.dialogue, &self.context, current) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.context.session_id,
                        event = name,
                        state = self.dialogue.step.as_str(),
                        error = %e,
                        "Rejected event"
                    );
                    let _ = self.broadcast_tx.send(SseEvent::Error {
                        message: e.to_string(),
                    });
                    return;
                }
            };

            let previous = self.dialogue.step;
            self.dialogue = result.next;
            if previous != self.dialogue.step {
                tracing::debug!(
                    session_id = %self.context.session_id,
                    from = previous.as_str(),
                    to = self.dialogue.step.as_str(),
                    "Dialogue step changed"
                );
                let _ = self.broadcast_tx.send(SseEvent::StateChange {
                    state: self.dialogue.step,
                });
            }
            self.publish_view();

            for effect in result.effects {
                if let Some(generated) = self.execute_effect(effect).await {
                    events.push_back(generated);
                }
            }
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::Emit { message, pacing } => {
                if pacing == Pacing::Typed && !self.pause(self.typing_delay).await {
                    return None;
                }
                let entry = if self.dialogue.step.handles_donor_data() {
                    self.transcript.append_confidential(message).clone()
                } else {
                    self.transcript.append(message).clone()
                };
                let _ = self.broadcast_tx.send(SseEvent::Message { entry });
                self.publish_view();
                None
            }

            Effect::WithdrawOptions => {
                let ids = self.transcript.withdraw_options();
                if !ids.is_empty() {
                    let _ = self.broadcast_tx.send(SseEvent::OptionsWithdrawn { ids });
                    self.publish_view();
                }
                None
            }

            Effect::SetConfirmButtons { visible } => {
                self.confirm_buttons_visible = visible;
                let _ = self.broadcast_tx.send(SseEvent::ConfirmButtons { visible });
                self.publish_view();
                None
            }

            Effect::RequestCompletion => self.request_completion().await,

            Effect::ScheduleEvent { delay, event } => {
                if delay.is_zero() || self.pause(delay).await {
                    Some(event)
                } else {
                    None
                }
            }
        }
    }

    /// Stream a reply for the current history, relaying fragments as deltas.
    /// Returns `None` if the session was closed meanwhile.
    async fn request_completion(&mut self) -> Option<Event> {
        let history = self.history();
        tracing::info!(
            session_id = %self.context.session_id,
            messages = history.len(),
            "Requesting completion"
        );

        let opened = tokio::select! {
            () = self.cancel.cancelled() => return None,
            opened = self.bridge.send_conversation(history) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    kind = e.kind.as_str(),
                    error = %e,
                    "Completion failed to start"
                );
                return Some(Event::CompletionFailed { message: e.message });
            }
        };

        let mut reply = String::new();
        let mut chunks = 0usize;
        loop {
            let next = tokio::select! {
                () = self.cancel.cancelled() => return None,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(text)) => {
                    chunks += 1;
                    reply.push_str(&text);
                    let _ = self.broadcast_tx.send(SseEvent::Delta { text });
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        session_id = %self.context.session_id,
                        kind = e.kind.as_str(),
                        error = %e,
                        chunks,
                        "Completion stream failed"
                    );
                    return Some(Event::CompletionFailed { message: e.message });
                }
                None => break,
            }
        }

        tracing::info!(
            session_id = %self.context.session_id,
            chunks,
            chars = reply.len(),
            "Completion finished"
        );
        if reply.trim().is_empty() {
            tracing::warn!(session_id = %self.context.session_id, "Completion returned no text");
            return Some(Event::CompletionFailed {
                message: "Completion returned no text".to_string(),
            });
        }
        Some(Event::CompletionFinished { text: reply })
    }

    /// Conversation so far, without controls or anything from the donation flow
    fn history(&self) -> Vec<ChatMessage> {
        self.transcript
            .entries()
            .iter()
            .filter(|e| !e.message.is_control() && !e.confidential)
            .map(|e| {
                if e.message.is_from_user {
                    ChatMessage::user(e.message.text.clone())
                } else {
                    ChatMessage::assistant(e.message.text.clone())
                }
            })
            .collect()
    }

    /// Sleep unless the session closes first; false if it closed
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    fn publish_view(&self) {
        self.view_tx.send_replace(SessionView {
            session_id: self.context.session_id.clone(),
            state: self.dialogue.step,
            transcript: self.transcript.entries().to_vec(),
            confirm_buttons_visible: self.confirm_buttons_visible,
            donor: self.dialogue.donor.clone(),
        });
    }
}
