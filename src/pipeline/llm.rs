//! VLM interaction: build the two kinds of request and call the client.
//!
//! Prompt text lives in [`crate::prompts`]; this module only decides what
//! goes into each request and records timing. There is no retry here: a
//! failed image call is returned as data so sibling calls are unaffected, and
//! a failed synthesis call is returned to the orchestrator unchanged.

use crate::config::AssessmentConfig;
use crate::error::InferenceError;
use crate::inference::{Completion, ContentPart, InferenceClient, InferenceRequest, PromptContent};
use crate::pipeline::encode::EncodedImage;
use crate::prompts::IMAGE_INSPECTION_PROMPT;
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of one per-image call, tagged with its upload position.
#[derive(Debug, Clone)]
pub struct ImageResult {
    /// 0-based position among all uploaded images.
    pub index: usize,
    pub name: String,
    pub outcome: Result<Completion, InferenceError>,
    pub duration_ms: u64,
}

/// Build the multimodal request for one image: inspection prompt, then image.
pub fn image_request(image: &EncodedImage, config: &AssessmentConfig) -> InferenceRequest {
    let prompt = config
        .image_prompt
        .as_deref()
        .unwrap_or(IMAGE_INSPECTION_PROMPT);

    InferenceRequest {
        model: config.model.clone(),
        content: PromptContent::Parts(vec![
            ContentPart::Text(prompt.to_string()),
            ContentPart::Image(image.clone()),
        ]),
        max_tokens: config.image_max_tokens,
        temperature: config.temperature,
    }
}

/// Build the text-only synthesis request.
pub fn synthesis_request(prompt: String, config: &AssessmentConfig) -> InferenceRequest {
    InferenceRequest {
        model: config.model.clone(),
        content: PromptContent::Text(prompt),
        max_tokens: config.synthesis_max_tokens,
        temperature: config.temperature,
    }
}

/// Describe one image. Never fails; the error is carried in the result.
pub async fn analyze_image(
    client: &dyn InferenceClient,
    index: usize,
    image: &EncodedImage,
    config: &AssessmentConfig,
) -> ImageResult {
    let start = Instant::now();
    let request = image_request(image, config);
    let outcome = client.complete_chat(&request).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match &outcome {
        Ok(c) => debug!(
            "Image '{}': {} chars, {:?} out tokens, {}ms",
            image.name,
            c.content.len(),
            c.completion_tokens,
            duration_ms
        ),
        Err(e) => warn!("Image '{}': call failed — {}", image.name, e),
    }

    ImageResult {
        index,
        name: image.name.clone(),
        outcome,
        duration_ms,
    }
}

/// Run the final risk-assessment call.
pub async fn synthesize(
    client: &dyn InferenceClient,
    prompt: String,
    config: &AssessmentConfig,
) -> Result<Completion, InferenceError> {
    let request = synthesis_request(prompt, config);
    client.complete_chat(&request).await
}
