//! HTTP API for the campaign chat widget

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::completion::CompletionBridge;
use crate::session::{SessionManager, SessionTiming};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub bridge: CompletionBridge,
}

impl AppState {
    pub fn new(bridge: CompletionBridge, timing: SessionTiming) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(bridge.clone(), timing)),
            bridge,
        }
    }
}
