//! API request and response types

use crate::completion::ChatMessage;
use serde::{Deserialize, Serialize};

/// Stateless completion request from the widget
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// Typed visitor input
#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub text: String,
}

/// Click on an offered option
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub option: String,
}

/// Response for a newly mounted session
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Response for queued session events
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
