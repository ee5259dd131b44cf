//! Adapter from an `edgequake_llm` provider to [`InferenceClient`].
//!
//! The provider is bound to one model when it is created, so
//! `InferenceRequest::model` is only used for logging here.

use super::{Completion, InferenceClient, InferenceRequest, PromptContent};
use crate::error::{InferenceError, UnderwriteError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Inference through any provider supported by edgequake-llm.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderClient {
    /// Wrap a pre-built provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Create a provider by name (`openai`, `anthropic`, `gemini`, `ollama`, …).
    ///
    /// The provider reads its own API key from the environment.
    pub fn from_name(provider_name: &str, model: &str) -> Result<Self, UnderwriteError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            UnderwriteError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, provider_name))
    }
}

fn build_messages(content: &PromptContent) -> Vec<ChatMessage> {
    let images: Vec<ImageData> = content
        .images()
        .map(|img| ImageData::new(img.data.clone(), img.mime_type.as_str()))
        .collect();
    let text = content.text();
    vec![ChatMessage::user_with_images(text.as_str(), images)]
}

#[async_trait]
impl InferenceClient for ProviderClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete_chat(&self, request: &InferenceRequest) -> Result<Completion, InferenceError> {
        let messages = build_messages(&request.content);
        let options = CompletionOptions {
            temperature: request.temperature,
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        debug!(provider = %self.label, model = %request.model, "Sending provider chat request");

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| InferenceError::Provider(format!("{e}")))?;

        if response.content.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }

        Ok(Completion {
            content: response.content,
            prompt_tokens: Some(response.prompt_tokens as usize),
            completion_tokens: Some(response.completion_tokens as usize),
        })
    }
}
