//! Chat transcript rendered by the widget

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One rendered chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub is_from_user: bool,
    pub is_selectable_option: bool,
    pub is_hyperlink: bool,
    pub is_confirm_button: bool,
}

impl Message {
    fn plain(text: impl Into<String>, is_from_user: bool) -> Self {
        Self {
            text: text.into(),
            is_from_user,
            is_selectable_option: false,
            is_hyperlink: false,
            is_confirm_button: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(text, true)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain(text, false)
    }

    pub fn option(label: impl Into<String>) -> Self {
        Self {
            is_selectable_option: true,
            ..Self::plain(label, false)
        }
    }

    pub fn link(url: impl Into<String>) -> Self {
        Self {
            is_hyperlink: true,
            ..Self::plain(url, false)
        }
    }

    pub fn confirm_button(label: impl Into<String>) -> Self {
        Self {
            is_confirm_button: true,
            ..Self::plain(label, false)
        }
    }

    /// Interactive controls rather than conversation content
    pub fn is_control(&self) -> bool {
        self.is_selectable_option || self.is_confirm_button
    }
}

/// A message as stored in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Sequence number, unique within the session
    pub id: u64,
    #[serde(flatten)]
    pub message: Message,
    pub sent_at: DateTime<Utc>,
    /// Carries donor data; kept out of completion history
    #[serde(skip)]
    pub confidential: bool,
}

/// Ordered transcript for one session
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) -> &TranscriptEntry {
        self.push(message, false)
    }

    /// Append a message that must never be forwarded to the completion model
    pub fn append_confidential(&mut self, message: Message) -> &TranscriptEntry {
        self.push(message, true)
    }

    fn push(&mut self, message: Message, confidential: bool) -> &TranscriptEntry {
        self.next_id += 1;
        self.entries.push(TranscriptEntry {
            id: self.next_id,
            message,
            sent_at: Utc::now(),
            confidential,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Remove every option message; returns the ids that were removed
    pub fn withdraw_options(&mut self) -> Vec<u64> {
        let removed = self
            .entries
            .iter()
            .filter(|e| e.message.is_selectable_option)
            .map(|e| e.id)
            .collect();
        self.entries.retain(|e| !e.message.is_selectable_option);
        removed
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
