//! Pure dialogue transition function
//!
//! Given the same dialogue, context and event, `transition` always returns
//! the same result. Timing, transcript storage and network calls belong to
//! the session runtime that executes the returned effects.

use super::script::{self, MenuOption};
use super::state::{Dialogue, DialogueState, DonorRecord, SessionContext};
use super::{Effect, Event};
use crate::donation::donation_link;
use thiserror::Error;

/// Result of a dialogue transition
#[derive(Debug)]
pub struct TransitionResult {
    pub next: Dialogue,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(next: Dialogue) -> Self {
        Self {
            next,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Session is already running")]
    AlreadyMounted,
    #[error("No options are on offer right now")]
    NoOptionsOffered,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    dialogue: &Dialogue,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (dialogue.step, event) {
        // ============================================================
        // Session start
        // ============================================================
        (DialogueState::Intro, Event::Mount) => {
            Ok(TransitionResult::new(dialogue.at(DialogueState::Options))
                .with_effect(Effect::say(script::WELCOME))
                .with_effects(option_menu()))
        }

        (_, Event::Mount) => Err(TransitionError::AlreadyMounted),

        // ============================================================
        // Option menu
        // ============================================================
        (DialogueState::Options, Event::OptionSelected { option }) => {
            Ok(select_option(dialogue, &option))
        }

        (DialogueState::Options, Event::UserInput { text }) => {
            let result = select_option(dialogue, &text);
            let mut effects = vec![Effect::echo(text)];
            effects.extend(result.effects);
            Ok(TransitionResult::new(result.next).with_effects(effects))
        }

        (_, Event::OptionSelected { .. }) => Err(TransitionError::NoOptionsOffered),

        // ============================================================
        // Entry states
        // ============================================================
        (DialogueState::Donate, Event::Advance) => Ok(TransitionResult::new(
            dialogue.at(DialogueState::AskFirstName),
        )
        .with_effect(Effect::say(script::DONATE_START))),

        (DialogueState::Volunteer, Event::Advance) => {
            Ok(TransitionResult::new(dialogue.at(DialogueState::Chat))
                .with_effect(Effect::say(script::VOLUNTEER_INSTRUCTIONS)))
        }

        (DialogueState::Contact, Event::Advance) => {
            Ok(TransitionResult::new(dialogue.at(DialogueState::Chat))
                .with_effect(Effect::say(script::CONTACT_INSTRUCTIONS)))
        }

        (state, Event::Advance) => Err(unexpected(state, "advance")),

        // ============================================================
        // Donation questions
        // ============================================================
        (
            DialogueState::AskFirstName
            | DialogueState::AskLastName
            | DialogueState::AskEmail
            | DialogueState::AskAddress
            | DialogueState::AskCity
            | DialogueState::AskState
            | DialogueState::AskZip,
            Event::UserInput { text },
        ) => record_answer(dialogue, text),

        (DialogueState::ConfirmInfo, Event::UserInput { text }) => {
            if text.trim().eq_ignore_ascii_case(script::CONFIRM_YES) {
                let link = donation_link(&dialogue.donor);
                Ok(TransitionResult::new(dialogue.at(DialogueState::ProvideLink))
                    .with_effect(Effect::echo(text))
                    .with_effect(Effect::SetConfirmButtons { visible: false })
                    .with_effect(Effect::say(script::LINK_INTRO))
                    .with_effect(Effect::show_link(link))
                    .with_effect(Effect::say(script::LINK_THANKS))
                    .with_effect(Effect::ScheduleEvent {
                        delay: context.link_pause,
                        event: Event::LinkPauseElapsed,
                    }))
            } else {
                Ok(TransitionResult::new(Dialogue::new(
                    DialogueState::AskFirstName,
                    DonorRecord::default(),
                ))
                .with_effect(Effect::echo(text))
                .with_effect(Effect::SetConfirmButtons { visible: false })
                .with_effect(Effect::say(script::RESTART_DONATION)))
            }
        }

        (DialogueState::ProvideLink, Event::LinkPauseElapsed) => {
            Ok(TransitionResult::new(dialogue.at(DialogueState::Options))
                .with_effects(option_menu()))
        }

        (state, Event::LinkPauseElapsed) => Err(unexpected(state, "link pause")),

        // ============================================================
        // General inquiries
        // ============================================================
        (DialogueState::Chat, Event::UserInput { text }) => {
            Ok(TransitionResult::new(dialogue.at(DialogueState::Chat))
                .with_effect(Effect::echo(text))
                .with_effect(Effect::RequestCompletion))
        }

        (DialogueState::Chat, Event::CompletionFinished { text }) => {
            Ok(TransitionResult::new(dialogue.at(DialogueState::Chat))
                .with_effect(Effect::say_now(text)))
        }

        (DialogueState::Chat, Event::CompletionFailed { .. }) => {
            Ok(TransitionResult::new(dialogue.at(DialogueState::Chat))
                .with_effect(Effect::say_now(script::COMPLETION_FAILED)))
        }

        (state, Event::CompletionFinished { .. } | Event::CompletionFailed { .. }) => {
            Err(unexpected(state, "completion"))
        }

        // ============================================================
        // Input while an entry state is still resolving
        // ============================================================
        (
            DialogueState::Intro
            | DialogueState::Donate
            | DialogueState::Volunteer
            | DialogueState::Contact
            | DialogueState::ProvideLink,
            Event::UserInput { text },
        ) => Ok(TransitionResult::new(dialogue.at(DialogueState::Options))
            .with_effect(Effect::echo(text))
            .with_effect(Effect::say(script::UNHANDLED_INPUT))
            .with_effects(option_menu())),
    }
}

/// Prompt followed by one option message per menu entry
pub fn option_menu() -> Vec<Effect> {
    std::iter::once(Effect::say(script::MENU_PROMPT))
        .chain(
            MenuOption::ALL
                .into_iter()
                .map(|option| Effect::offer_option(option.label())),
        )
        .collect()
}

fn select_option(dialogue: &Dialogue, input: &str) -> TransitionResult {
    let withdrawn = TransitionResult::new(dialogue.clone()).with_effect(Effect::WithdrawOptions);

    match MenuOption::parse(input) {
        Some(MenuOption::Donate) => TransitionResult {
            next: dialogue.at(DialogueState::Donate),
            ..withdrawn
        }
        .with_effect(Effect::dispatch(Event::Advance)),
        Some(MenuOption::Volunteer) => TransitionResult {
            next: dialogue.at(DialogueState::Volunteer),
            ..withdrawn
        }
        .with_effect(Effect::dispatch(Event::Advance)),
        Some(MenuOption::Contact) => TransitionResult {
            next: dialogue.at(DialogueState::Contact),
            ..withdrawn
        }
        .with_effect(Effect::dispatch(Event::Advance)),
        Some(MenuOption::GeneralInquiries) => TransitionResult {
            next: dialogue.at(DialogueState::Chat),
            ..withdrawn
        }
        .with_effect(Effect::say(script::INQUIRY_INVITATION)),
        None => withdrawn
            .with_effect(Effect::say(script::UNKNOWN_OPTION))
            .with_effects(option_menu()),
    }
}

fn record_answer(dialogue: &Dialogue, text: String) -> Result<TransitionResult, TransitionError> {
    let Some(field) = dialogue.step.asked_field() else {
        return Err(unexpected(dialogue.step, "donor answer"));
    };

    let mut donor = dialogue.donor.clone();
    donor.set(field, text.clone());

    match (field.next(), script::prompt_after(field)) {
        (Some(next_field), Some(prompt)) => {
            Ok(TransitionResult::new(Dialogue::new(next_field.step(), donor))
                .with_effect(Effect::echo(text))
                .with_effect(Effect::say(prompt)))
        }
        _ => {
            let summary = donor.summary();
            Ok(
                TransitionResult::new(Dialogue::new(DialogueState::ConfirmInfo, donor))
                    .with_effect(Effect::echo(text))
                    .with_effect(Effect::say(script::SUMMARY_INTRO))
                    .with_effect(Effect::say(summary))
                    .with_effect(Effect::SetConfirmButtons { visible: true })
                    .with_effect(Effect::offer_confirm(script::CONFIRM_YES))
                    .with_effect(Effect::offer_confirm(script::CONFIRM_NO)),
            )
        }
    }
}

fn unexpected(state: DialogueState, what: &str) -> TransitionError {
    TransitionError::InvalidTransition(format!("{what} while in {}", state.as_str()))
}
