//! LLM integration for model-assisted estimation.
//!
//! Only OpenAI-compatible chat completions are supported. Without an API key
//! no provider is created and estimation runs on the heuristic alone.

mod openai_chat;
mod provider;

pub use openai_chat::OpenAiChatProvider;
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

use std::sync::Arc;

use crate::config::OpenAiConfig;

/// Create the model provider if a credential is configured.
pub fn create_llm_provider(config: &OpenAiConfig) -> Option<Arc<dyn LlmProvider>> {
    if config.api_key.is_none() {
        tracing::info!("OPENAI_API_KEY not set, model-assisted estimation disabled");
        return None;
    }

    match OpenAiChatProvider::new(config.clone()) {
        Ok(provider) => {
            tracing::info!(model = %config.model, "Using OpenAI chat completions for estimation");
            Some(Arc::new(provider))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create OpenAI provider, using heuristic only");
            None
        }
    }
}
