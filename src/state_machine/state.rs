//! Dialogue state types

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Dialogue Step
// ============================================================================

/// Position in the scripted conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    /// Freshly mounted, nothing emitted yet
    #[default]
    Intro,
    /// Option menu is on screen
    Options,
    /// Free-text conversation forwarded to the completion bridge
    Chat,
    /// Entry state for the donation flow, resolved by `Event::Advance`
    Donate,
    /// Entry state for the volunteer flow, resolved by `Event::Advance`
    Volunteer,
    /// Entry state for the contact flow, resolved by `Event::Advance`
    Contact,
    AskFirstName,
    AskLastName,
    AskEmail,
    AskAddress,
    AskCity,
    AskState,
    AskZip,
    /// Summary shown, waiting for the visitor to confirm it
    ConfirmInfo,
    /// Donation link shown, waiting out the link pause
    ProvideLink,
}

impl DialogueState {
    /// The donor field this step is collecting, if any
    pub fn asked_field(self) -> Option<DonorField> {
        match self {
            DialogueState::AskFirstName => Some(DonorField::FirstName),
            DialogueState::AskLastName => Some(DonorField::LastName),
            DialogueState::AskEmail => Some(DonorField::Email),
            DialogueState::AskAddress => Some(DonorField::Address),
            DialogueState::AskCity => Some(DonorField::City),
            DialogueState::AskState => Some(DonorField::State),
            DialogueState::AskZip => Some(DonorField::Zip),
            DialogueState::Intro
            | DialogueState::Options
            | DialogueState::Chat
            | DialogueState::Donate
            | DialogueState::Volunteer
            | DialogueState::Contact
            | DialogueState::ConfirmInfo
            | DialogueState::ProvideLink => None,
        }
    }

    /// Entry states resolve on their own and never wait for the visitor
    #[allow(dead_code)] // Used by property tests
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            DialogueState::Intro
                | DialogueState::Donate
                | DialogueState::Volunteer
                | DialogueState::Contact
                | DialogueState::ProvideLink
        )
    }

    /// Steps whose messages echo or display donor data
    pub fn handles_donor_data(self) -> bool {
        self.asked_field().is_some()
            || matches!(self, DialogueState::ConfirmInfo | DialogueState::ProvideLink)
    }

    /// Wire name, matching the serde tag
    pub fn as_str(self) -> &'static str {
        match self {
            DialogueState::Intro => "intro",
            DialogueState::Options => "options",
            DialogueState::Chat => "chat",
            DialogueState::Donate => "donate",
            DialogueState::Volunteer => "volunteer",
            DialogueState::Contact => "contact",
            DialogueState::AskFirstName => "ask_first_name",
            DialogueState::AskLastName => "ask_last_name",
            DialogueState::AskEmail => "ask_email",
            DialogueState::AskAddress => "ask_address",
            DialogueState::AskCity => "ask_city",
            DialogueState::AskState => "ask_state",
            DialogueState::AskZip => "ask_zip",
            DialogueState::ConfirmInfo => "confirm_info",
            DialogueState::ProvideLink => "provide_link",
        }
    }
}

// ============================================================================
// Donor Record
// ============================================================================

/// One field of the donor record, in collection order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DonorField {
    FirstName,
    LastName,
    Email,
    Address,
    City,
    State,
    Zip,
}

impl DonorField {
    pub const ALL: [DonorField; 7] = [
        DonorField::FirstName,
        DonorField::LastName,
        DonorField::Email,
        DonorField::Address,
        DonorField::City,
        DonorField::State,
        DonorField::Zip,
    ];

    /// Field collected after this one; `None` after the zip code
    pub fn next(self) -> Option<DonorField> {
        match self {
            DonorField::FirstName => Some(DonorField::LastName),
            DonorField::LastName => Some(DonorField::Email),
            DonorField::Email => Some(DonorField::Address),
            DonorField::Address => Some(DonorField::City),
            DonorField::City => Some(DonorField::State),
            DonorField::State => Some(DonorField::Zip),
            DonorField::Zip => None,
        }
    }

    /// Dialogue step that asks for this field
    pub fn step(self) -> DialogueState {
        match self {
            DonorField::FirstName => DialogueState::AskFirstName,
            DonorField::LastName => DialogueState::AskLastName,
            DonorField::Email => DialogueState::AskEmail,
            DonorField::Address => DialogueState::AskAddress,
            DonorField::City => DialogueState::AskCity,
            DonorField::State => DialogueState::AskState,
            DonorField::Zip => DialogueState::AskZip,
        }
    }

    /// Label used in the confirmation summary
    pub fn label(self) -> &'static str {
        match self {
            DonorField::FirstName => "First Name",
            DonorField::LastName => "Last Name",
            DonorField::Email => "Email",
            DonorField::Address => "Address",
            DonorField::City => "City",
            DonorField::State => "State",
            DonorField::Zip => "ZIP",
        }
    }

    /// Query parameter name in the donation link
    pub fn query_key(self) -> &'static str {
        match self {
            DonorField::FirstName => "first_name",
            DonorField::LastName => "last_name",
            DonorField::Email => "email",
            DonorField::Address => "address",
            DonorField::City => "city",
            DonorField::State => "state",
            DonorField::Zip => "zip",
        }
    }
}

/// Donor contact details collected during the donation flow.
///
/// Values are stored verbatim; nothing here checks their format.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DonorRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl DonorRecord {
    pub fn get(&self, field: DonorField) -> &str {
        match field {
            DonorField::FirstName => &self.first_name,
            DonorField::LastName => &self.last_name,
            DonorField::Email => &self.email,
            DonorField::Address => &self.address,
            DonorField::City => &self.city,
            DonorField::State => &self.state,
            DonorField::Zip => &self.zip,
        }
    }

    pub fn set(&mut self, field: DonorField, value: impl Into<String>) {
        let slot = match field {
            DonorField::FirstName => &mut self.first_name,
            DonorField::LastName => &mut self.last_name,
            DonorField::Email => &mut self.email,
            DonorField::Address => &mut self.address,
            DonorField::City => &mut self.city,
            DonorField::State => &mut self.state,
            DonorField::Zip => &mut self.zip,
        };
        *slot = value.into();
    }

    #[allow(dead_code)] // Used by tests
    pub fn is_empty(&self) -> bool {
        DonorField::ALL.iter().all(|f| self.get(*f).is_empty())
    }

    /// Multi-line "Label: value" summary shown before confirmation
    pub fn summary(&self) -> String {
        DonorField::ALL
            .iter()
            .map(|f| format!("{}: {}", f.label(), self.get(*f)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Dialogue + Context
// ============================================================================

/// Mutable dialogue data owned by one session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dialogue {
    pub step: DialogueState,
    pub donor: DonorRecord,
}

impl Dialogue {
    pub fn new(step: DialogueState, donor: DonorRecord) -> Self {
        Self { step, donor }
    }

    /// Same donor record, different step
    pub fn at(&self, step: DialogueState) -> Self {
        Self {
            step,
            donor: self.donor.clone(),
        }
    }
}

/// Default pause between showing the donation link and restoring the menu
pub const DEFAULT_LINK_PAUSE: Duration = Duration::from_secs(5);

/// Immutable per-session configuration consulted by transitions
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub link_pause: Duration,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            link_pause: DEFAULT_LINK_PAUSE,
        }
    }

    pub fn with_link_pause(mut self, link_pause: Duration) -> Self {
        self.link_pause = link_pause;
        self
    }
}
