//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ChatRequest, CreateSessionResponse, ErrorResponse, InputRequest, QueuedResponse,
    SelectRequest, SuccessResponse,
};
use super::AppState;
use crate::completion::{CompletionError, CompletionErrorKind};
use crate::session::{SessionError, SessionView, SseEvent};
use crate::state_machine::Event;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use std::convert::Infallible;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Stateless completion relay
        .route("/api/chat", post(chat))
        // Widget lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/stream", get(stream_session))
        .route("/api/sessions/:id/close", post(close_session))
        // Visitor actions
        .route("/api/sessions/:id/input", post(send_input))
        .route("/api/sessions/:id/select", post(select_option))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Completion Relay
// ============================================================

/// Stream a completion for caller-supplied history as plain text
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    if req.messages.is_empty() {
        return Err(AppError::BadRequest("messages must not be empty".to_string()));
    }

    let stream = state
        .bridge
        .send_conversation(req.messages)
        .await
        .map_err(AppError::Completion)?;

    // The bridge ends its stream after the first error, so dropping the
    // error here closes the body cleanly
    let body = stream.filter_map(|item| async move {
        match item {
            Ok(text) => Some(Ok::<_, Infallible>(text)),
            Err(e) => {
                tracing::warn!(kind = e.kind.as_str(), error = %e, "Completion stream cut short");
                None
            }
        }
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let handle = state.sessions.open().await;
    Json(CreateSessionResponse {
        session_id: handle.session_id,
    })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.get(&id).await?;
    Ok(Json(handle.view()))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.sessions.get(&id).await?;

    // Subscribe before taking the snapshot so nothing falls in between
    let broadcast_rx = handle.subscribe();
    let init_event = SseEvent::Init {
        view: handle.view(),
    };

    Ok(sse_stream(init_event, broadcast_rx))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.close(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn send_input(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InputRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }

    let handle = state.sessions.get(&id).await?;
    handle
        .send(Event::UserInput {
            text: text.to_string(),
        })
        .await?;

    Ok(Json(QueuedResponse { queued: true }))
}

async fn select_option(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    let handle = state.sessions.get(&id).await?;
    handle
        .send(Event::OptionSelected { option: req.option })
        .await?;

    Ok(Json(QueuedResponse { queued: true }))
}

async fn get_version() -> &'static str {
    concat!("campaign-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Completion(CompletionError),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::Closed => AppError::BadRequest(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Completion(e) => {
                let status = match e.kind {
                    CompletionErrorKind::Auth => StatusCode::UNAUTHORIZED,
                    CompletionErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
                    CompletionErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    CompletionErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                    CompletionErrorKind::Network
                    | CompletionErrorKind::ServerError
                    | CompletionErrorKind::Unknown => StatusCode::BAD_GATEWAY,
                };
                (status, e.message)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
