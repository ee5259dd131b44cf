//! OpenAI-compatible chat-completions client over reqwest.
//!
//! Request body:
//!
//! ```json
//! {"model": "...", "max_tokens": 512,
//!  "messages": [{"role": "user", "content": [
//!     {"type": "text", "text": "..."},
//!     {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,..."}}]}]}
//! ```
//!
//! Text-only prompts send `content` as a plain string. The completion is read
//! from `choices[0].message.content`.

use super::{Completion, ContentPart, InferenceClient, InferenceRequest, PromptContent};
use crate::error::{InferenceError, UnderwriteError};
use crate::secrets::ApiKey;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Groq's OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Cap on how much of an error body is kept in [`InferenceError::Api`].
const MAX_ERROR_BODY: usize = 500;

/// Chat-completions client authenticated with a static bearer key.
pub struct ChatCompletionsClient {
    client: Client,
    api_key: ApiKey,
    base_url: String,
}

impl ChatCompletionsClient {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the transport-default timeout with an explicit one.
    pub fn with_timeout(mut self, secs: u64) -> Result<Self, UnderwriteError> {
        self.client = Client::builder()
            .timeout(Duration::from_secs(secs))
            .build()
            .map_err(|e| UnderwriteError::Internal(format!("HTTP client: {e}")))?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: WireImageUrl },
}

#[derive(Serialize)]
struct WireImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: Option<usize>,
    completion_tokens: Option<usize>,
}

fn build_body(request: &InferenceRequest) -> WireRequest<'_> {
    let content = match &request.content {
        PromptContent::Text(text) => WireContent::Text(text),
        PromptContent::Parts(parts) => WireContent::Parts(
            parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text(text) => WirePart::Text { text },
                    ContentPart::Image(img) => WirePart::ImageUrl {
                        image_url: WireImageUrl { url: img.data_url() },
                    },
                })
                .collect(),
        ),
    };

    WireRequest {
        model: &request.model,
        messages: vec![WireMessage {
            role: "user",
            content,
        }],
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

fn parse_body(body: &str) -> Result<Completion, InferenceError> {
    let parsed: WireResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(InferenceError::EmptyResponse)?;

    Ok(Completion {
        content,
        prompt_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
        completion_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
    })
}

fn classify_status(status: StatusCode, retry_after: Option<u64>, body: String) -> InferenceError {
    let body = truncate_body(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => InferenceError::Auth {
            status: status.as_u16(),
            detail: body,
        },
        StatusCode::TOO_MANY_REQUESTS => InferenceError::RateLimited {
            retry_after_secs: retry_after,
        },
        _ => InferenceError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

fn truncate_body(body: String) -> String {
    if body.chars().count() > MAX_ERROR_BODY {
        let mut cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        cut.push('\u{2026}');
        cut
    } else {
        body
    }
}

#[async_trait]
impl InferenceClient for ChatCompletionsClient {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn complete_chat(&self, request: &InferenceRequest) -> Result<Completion, InferenceError> {
        let start = Instant::now();
        let body = build_body(request);

        debug!(
            model = %request.model,
            images = request.content.images().count(),
            max_tokens = request.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, error_body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;
        let completion = parse_body(&text)?;

        debug!(
            "Completion: {} chars, {:?} in / {:?} out tokens, {:?}",
            completion.content.len(),
            completion.prompt_tokens,
            completion.completion_tokens,
            start.elapsed()
        );
        Ok(completion)
    }
}
