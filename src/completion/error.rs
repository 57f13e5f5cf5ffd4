//! Completion error types

use thiserror::Error;

/// Completion error with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
}

impl CompletionError {
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::Timeout, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::InvalidRequest, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::Unknown, message)
    }

    /// Classify a non-success HTTP status from the provider
    pub fn from_status(status: u16, message: &str) -> Self {
        match status {
            401 | 403 => Self::auth(format!("Authentication failed: {message}")),
            408 => Self::timeout(format!("Provider timed out: {message}")),
            429 => Self::rate_limit(format!("Rate limit exceeded: {message}")),
            400 | 404 | 422 => Self::invalid_request(format!("Invalid request: {message}")),
            500..=599 => Self::server_error(format!("Server error: {message}")),
            _ => Self::unknown(format!("HTTP {status}: {message}")),
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// Connection or transport failure
    Network,
    /// Response budget exceeded
    Timeout,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Missing or rejected credentials (401, 403)
    Auth,
    /// Bad request (400)
    InvalidRequest,
    Unknown,
}

impl CompletionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::ServerError => "server_error",
            Self::Auth => "auth",
            Self::InvalidRequest => "invalid_request",
            Self::Unknown => "unknown",
        }
    }
}
