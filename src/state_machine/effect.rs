//! Effects produced by dialogue transitions

use super::event::Event;
use crate::transcript::Message;
use std::time::Duration;

/// How an emitted message is paced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Appears after the typing delay
    Typed,
    /// Appears at once (user echoes, finished completions)
    Immediate,
}

/// Effects to be executed after a transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the transcript
    Emit { message: Message, pacing: Pacing },

    /// Strip every option message from the transcript
    WithdrawOptions,

    /// Show or hide the summary's confirm buttons
    SetConfirmButtons { visible: bool },

    /// Forward the transcript history to the completion bridge
    RequestCompletion,

    /// Feed an event back into the session after a delay
    ScheduleEvent { delay: Duration, event: Event },
}

impl Effect {
    pub fn echo(text: impl Into<String>) -> Self {
        Effect::Emit {
            message: Message::user(text),
            pacing: Pacing::Immediate,
        }
    }

    pub fn say(text: impl Into<String>) -> Self {
        Effect::Emit {
            message: Message::assistant(text),
            pacing: Pacing::Typed,
        }
    }

    pub fn say_now(text: impl Into<String>) -> Self {
        Effect::Emit {
            message: Message::assistant(text),
            pacing: Pacing::Immediate,
        }
    }

    pub fn offer_option(label: impl Into<String>) -> Self {
        Effect::Emit {
            message: Message::option(label),
            pacing: Pacing::Typed,
        }
    }

    pub fn offer_confirm(label: impl Into<String>) -> Self {
        Effect::Emit {
            message: Message::confirm_button(label),
            pacing: Pacing::Typed,
        }
    }

    pub fn show_link(url: impl Into<String>) -> Self {
        Effect::Emit {
            message: Message::link(url),
            pacing: Pacing::Typed,
        }
    }

    pub fn dispatch(event: Event) -> Self {
        Effect::ScheduleEvent {
            delay: Duration::ZERO,
            event,
        }
    }
}
