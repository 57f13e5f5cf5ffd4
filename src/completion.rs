//! Completion provider abstraction
//!
//! The bridge prepends the campaign preamble and forwards conversation
//! history to a hosted chat-completion model, relaying its streamed reply.

mod bridge;
mod error;
mod openai;
pub mod preamble;
mod types;

pub use bridge::CompletionBridge;
pub use error::{CompletionError, CompletionErrorKind};
pub use openai::OpenAiService;
pub use types::*;

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Finite stream of reply fragments; ends after the first error
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// Default ceiling on a whole completion exchange
pub const DEFAULT_RESPONSE_BUDGET: Duration = Duration::from_secs(30);

/// Common interface for completion providers
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Open a streaming completion for `request`
    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, CompletionError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: CompletionService + ?Sized> CompletionService for Arc<T> {
    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, CompletionError> {
        (**self).stream(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Configuration for the completion provider
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: Option<String>,
    /// `OpenAI`-compatible API root, without the `/chat/completions` suffix
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            timeout: DEFAULT_RESPONSE_BUDGET,
        }
    }
}

impl CompletionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("CAMPAIGN_CHAT_MODEL").unwrap_or(defaults.model),
            timeout: std::env::var("CAMPAIGN_CHAT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.timeout, Duration::from_secs),
        }
    }

    /// Build the production service, or `None` when no API key is set
    pub fn build_service(&self) -> Result<Option<Arc<dyn CompletionService>>, CompletionError> {
        let Some(api_key) = self.api_key.clone() else {
            return Ok(None);
        };
        let service: Arc<dyn CompletionService> = Arc::new(OpenAiService::new(api_key, self)?);
        let logged: Arc<dyn CompletionService> = Arc::new(LoggingService::new(service));
        Ok(Some(logged))
    }
}

/// Logging wrapper for completion services
pub struct LoggingService {
    inner: Arc<dyn CompletionService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn CompletionService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl CompletionService for LoggingService {
    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, CompletionError> {
        let start = std::time::Instant::now();
        let result = self.inner.stream(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    "Completion stream opened"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "Completion request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
