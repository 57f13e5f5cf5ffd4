//! Scripted dialogue state machine
//!
//! Pure transitions in the Elm style: `(dialogue, event) -> (dialogue, effects)`.

mod effect;
pub mod event;
pub mod script;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, Pacing};
pub use event::Event;
pub use state::{Dialogue, DialogueState, DonorField, DonorRecord, SessionContext};
pub use transition::transition;
