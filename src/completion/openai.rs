//! `OpenAI`-compatible chat completions provider (streaming)

use super::types::{ChatMessage, CompletionRequest};
use super::{CompletionConfig, CompletionError, CompletionService, TextStream};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;

/// Chat completions service over any `OpenAI`-compatible endpoint
pub struct OpenAiService {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl OpenAiService {
    pub fn new(api_key: String, config: &CompletionConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    fn translate_request<'a>(&'a self, request: &'a CompletionRequest) -> OpenAiRequest<'a> {
        OpenAiRequest {
            model: &self.model,
            messages: &request.messages,
            stream: true,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiService {
    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, CompletionError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.translate_request(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::timeout(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    CompletionError::network(format!("Connection failed: {e}"))
                } else {
                    CompletionError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| CompletionError::network(format!("Failed to read response: {e}")))?;
            let message = serde_json::from_str::<OpenAiErrorResponse>(&body)
                .map_or(body, |resp| resp.error.message);
            return Err(CompletionError::from_status(status.as_u16(), &message));
        }

        Ok(decode_event_stream(response.bytes_stream()))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Server-sent event decoding
// ============================================================================

/// One decoded `data:` frame
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Delta(String),
    Done,
    Skip,
}

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    failure: Option<CompletionError>,
    done: bool,
}

/// Turn a provider's SSE body into a stream of content fragments.
///
/// Frames may be split across network chunks; a line is only parsed once its
/// newline has arrived (or the body has ended).
pub(crate) fn decode_event_stream<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        failure: None,
        done: false,
    };

    let fragments = stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                return Ok(Some((text, state)));
            }
            if let Some(failure) = state.failure.take() {
                return Err(failure);
            }
            if state.done {
                return Ok(None);
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    while let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                        if state.absorb(&line) {
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    return Err(CompletionError::network(format!("Stream interrupted: {e}")));
                }
                None => {
                    let rest = std::mem::take(&mut state.buffer);
                    state.absorb(&rest);
                    state.done = true;
                }
            }
        }
    });

    Box::pin(fragments)
}

impl<S> DecodeState<S> {
    /// Parse one line into the pending queue; returns true once nothing more
    /// should be read
    fn absorb(&mut self, line: &[u8]) -> bool {
        match parse_line(&String::from_utf8_lossy(line)) {
            Ok(Frame::Delta(text)) => {
                self.pending.push_back(text);
                false
            }
            Ok(Frame::Skip) => false,
            Ok(Frame::Done) => {
                self.finish();
                true
            }
            Err(e) => {
                self.failure = Some(e);
                self.finish();
                true
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.buffer.clear();
    }
}

fn parse_line(line: &str) -> Result<Frame, CompletionError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(payload) = line.strip_prefix("data:") else {
        // Blank separators, comments and `event:`/`id:` fields
        return Ok(Frame::Skip);
    };
    let payload = payload.trim_start();

    if payload == "[DONE]" {
        return Ok(Frame::Done);
    }

    let chunk: OpenAiChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(error = %e, payload = %payload, "Skipping unparseable stream frame");
            return Ok(Frame::Skip);
        }
    };

    if let Some(error) = chunk.error {
        return Err(CompletionError::server_error(format!(
            "Provider error mid-stream: {}",
            error.message
        )));
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();

    Ok(if text.is_empty() {
        Frame::Skip
    } else {
        Frame::Delta(text)
    })
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChunkChoice>,
    #[serde(default)]
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChunkChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
