//! Inference client: one multimodal or text-only chat call per invocation.
//!
//! [`InferenceClient`] is the seam between the orchestrator and the remote
//! model. The orchestrator owns an `Arc<dyn InferenceClient>` handed to it at
//! construction; nothing here is global.
//!
//! Two implementations ship with the crate:
//!
//! * [`ChatCompletionsClient`] — OpenAI-compatible `/chat/completions` over
//!   HTTPS with a static bearer key (Groq by default).
//! * [`ProviderClient`] — any `edgequake_llm` provider (OpenAI, Anthropic,
//!   Gemini, Ollama, …) selected by name.
//!
//! Neither retries: a failed call is reported once and the caller decides
//! whether it is fatal.

mod http;
mod provider;

pub use http::{ChatCompletionsClient, DEFAULT_BASE_URL};
pub use provider::ProviderClient;

use crate::error::InferenceError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;

/// One element of a multimodal prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(EncodedImage),
}

/// Message content: plain text, or an ordered mix of text and images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl PromptContent {
    /// Images carried by this prompt, in order.
    pub fn images(&self) -> impl Iterator<Item = &EncodedImage> {
        let parts: &[ContentPart] = match self {
            PromptContent::Text(_) => &[],
            PromptContent::Parts(parts) => parts,
        };
        parts.iter().filter_map(|p| match p {
            ContentPart::Image(img) => Some(img),
            ContentPart::Text(_) => None,
        })
    }

    /// Text segments joined by a blank line.
    pub fn text(&self) -> String {
        match self {
            PromptContent::Text(t) => t.clone(),
            PromptContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text(t) => Some(t.as_str()),
                    ContentPart::Image(_) => None,
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// A single user-turn chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub model: String,
    pub content: PromptContent,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

/// Text returned by the model plus usage when the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: Option<usize>,
    pub completion_tokens: Option<usize>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Send a chat request to a remote model and return its completion.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    async fn complete_chat(&self, request: &InferenceRequest) -> Result<Completion, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(name: &str) -> EncodedImage {
        EncodedImage {
            name: name.into(),
            mime_type: "image/jpeg".into(),
            data: "AAAA".into(),
        }
    }

    #[test]
    fn text_prompt_has_no_images() {
        let c = PromptContent::Text("hello".into());
        assert_eq!(c.images().count(), 0);
        assert_eq!(c.text(), "hello");
    }

    #[test]
    fn parts_prompt_separates_text_and_images() {
        let c = PromptContent::Parts(vec![
            ContentPart::Text("look".into()),
            ContentPart::Image(img("a.jpg")),
            ContentPart::Text("closely".into()),
        ]);
        let names: Vec<_> = c.images().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg"]);
        assert_eq!(c.text(), "look\n\nclosely");
    }
}
