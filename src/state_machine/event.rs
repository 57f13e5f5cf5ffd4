//! Events that can occur in a chat session

/// Events that trigger dialogue transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Widget events
    /// Chat panel mounted; emits the welcome and the option menu
    Mount,
    /// Visitor typed text (or clicked a confirm button)
    UserInput { text: String },
    /// Visitor clicked one of the option buttons
    OptionSelected { option: String },

    // Internal events
    /// Resolves an entry state (donate, volunteer, contact)
    Advance,
    /// The pause after the donation link is over
    LinkPauseElapsed,

    // Completion bridge events
    CompletionFinished { text: String },
    CompletionFailed { message: String },
}

impl Event {
    /// Short name for logging and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Event::Mount => "mount",
            Event::UserInput { .. } => "user_input",
            Event::OptionSelected { .. } => "option_selected",
            Event::Advance => "advance",
            Event::LinkPauseElapsed => "link_pause_elapsed",
            Event::CompletionFinished { .. } => "completion_finished",
            Event::CompletionFailed { .. } => "completion_failed",
        }
    }
}
