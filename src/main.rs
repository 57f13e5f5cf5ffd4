//! Campaign chat - scripted campaign chatbot with an LLM fallback
//!
//! A Rust backend driving the widget's dialogue state machine and relaying
//! general inquiries to a hosted chat-completion model.

mod api;
mod completion;
mod donation;
mod session;
mod state_machine;
mod transcript;

use api::{create_router, AppState};
use completion::{CompletionBridge, CompletionConfig, CompletionService};
use session::SessionTiming;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let port: u16 = std::env::var("CAMPAIGN_CHAT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let completion_config = CompletionConfig::from_env();
    let service = completion_config.build_service()?;
    match &service {
        Some(service) => tracing::info!(
            model = %service.model_id(),
            base_url = %completion_config.base_url,
            budget_secs = completion_config.timeout.as_secs(),
            "Completion provider configured"
        ),
        None => tracing::warn!(
            "No completion provider configured. Set OPENAI_API_KEY to enable general inquiries."
        ),
    }
    let bridge = CompletionBridge::new(service).with_budget(completion_config.timeout);

    let timing = SessionTiming::from_env();
    tracing::info!(
        typing_delay_ms = %timing.typing_delay.as_millis(),
        link_pause_ms = %timing.link_pause.as_millis(),
        idle_timeout_secs = timing.idle_timeout.as_secs(),
        "Session pacing"
    );

    // Create application state
    let state = AppState::new(bridge, timing);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Campaign chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
