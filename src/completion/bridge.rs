//! Bridge between chat history and the completion provider

use super::preamble::build_system_prompt;
use super::types::{ChatMessage, CompletionRequest, Role};
use super::{CompletionError, CompletionService, TextStream, DEFAULT_RESPONSE_BUDGET};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Sends conversation history, preceded by the campaign preamble, to the
/// configured completion service.
#[derive(Clone)]
pub struct CompletionBridge {
    service: Option<Arc<dyn CompletionService>>,
    system_prompt: String,
    budget: Duration,
}

impl CompletionBridge {
    pub fn new(service: Option<Arc<dyn CompletionService>>) -> Self {
        Self {
            service,
            system_prompt: build_system_prompt(),
            budget: DEFAULT_RESPONSE_BUDGET,
        }
    }

    /// Ceiling on the whole exchange: connecting, headers and every chunk
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    #[allow(dead_code)] // Tests swap in a short prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Preamble first, then the caller's history minus any system messages
    pub fn build_request(&self, history: Vec<ChatMessage>) -> CompletionRequest {
        let dropped = history.iter().filter(|m| m.role == Role::System).count();
        if dropped > 0 {
            tracing::debug!(dropped, "Ignoring caller-supplied system messages");
        }

        let messages = std::iter::once(ChatMessage::system(self.system_prompt.clone()))
            .chain(history.into_iter().filter(|m| m.role != Role::System))
            .collect();

        CompletionRequest { messages }
    }

    /// Open a reply stream for `history`.
    ///
    /// The returned stream yields a `Timeout` error and ends once the budget
    /// runs out, whatever the provider is doing.
    pub async fn send_conversation(
        &self,
        history: Vec<ChatMessage>,
    ) -> Result<TextStream, CompletionError> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| CompletionError::auth("No completion provider configured"))?;

        let request = self.build_request(history);
        let deadline = Instant::now() + self.budget;
        let budget = self.budget;

        let inner = timeout_at(deadline, service.stream(&request))
            .await
            .map_err(|_| over_budget(budget))??;

        let bounded = stream::unfold(Some(inner), move |inner| async move {
            let mut inner = inner?;
            match timeout_at(deadline, inner.next()).await {
                Ok(Some(Ok(text))) => Some((Ok(text), Some(inner))),
                Ok(Some(Err(e))) => Some((Err(e), None)),
                Ok(None) => None,
                Err(_) => Some((Err(over_budget(budget)), None)),
            }
        });

        Ok(Box::pin(bounded))
    }
}

fn over_budget(budget: Duration) -> CompletionError {
    CompletionError::timeout(format!(
        "Completion exceeded the {}s response budget",
        budget.as_secs_f32()
    ))
}
