//! Shared fakes for the integration tests: a scripted inference client and a
//! canned text extractor.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_underwrite::pipeline::extract::TextExtractor;
use edgequake_underwrite::{
    Completion, ExtractionError, ImageAsset, InferenceClient, InferenceError, InferenceRequest,
    ReportDocument,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// What the client does for one image (keyed by image name) or for synthesis.
#[derive(Clone)]
pub struct Scripted {
    pub reply: Result<String, InferenceError>,
    pub delay: Duration,
}

impl Scripted {
    pub fn ok(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn err(e: InferenceError) -> Self {
        Self {
            reply: Err(e),
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }
}

/// Replays scripted answers and records every request it receives.
pub struct ScriptedClient {
    images: HashMap<String, Scripted>,
    synthesis: Scripted,
    /// Returned for every call when set, whatever the script says.
    always: Option<InferenceError>,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedClient {
    pub fn new(synthesis: &str) -> Self {
        Self {
            images: HashMap::new(),
            synthesis: Scripted::ok(synthesis),
            always: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: InferenceError) -> Self {
        Self {
            always: Some(error),
            ..Self::new("")
        }
    }

    pub fn image(mut self, name: &str, script: Scripted) -> Self {
        self.images.insert(name.to_string(), script);
        self
    }

    pub fn synthesis(mut self, script: Scripted) -> Self {
        self.synthesis = script;
        self
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Names of the images sent, in call order.
    pub fn image_calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .flat_map(|r| r.content.images().map(|i| i.name.clone()).collect::<Vec<_>>())
            .collect()
    }

    /// Requests with no image attached.
    pub fn text_calls(&self) -> Vec<InferenceRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.content.images().next().is_none())
            .collect()
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete_chat(&self, request: &InferenceRequest) -> Result<Completion, InferenceError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(e) = &self.always {
            return Err(e.clone());
        }

        let script = match request.content.images().next() {
            Some(img) => self
                .images
                .get(&img.name)
                .cloned()
                .unwrap_or_else(|| Scripted::ok(&format!("Nothing notable in {}.", img.name))),
            None => self.synthesis.clone(),
        };
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        script.reply.map(|content| Completion {
            content,
            prompt_tokens: Some(10),
            completion_tokens: Some(5),
        })
    }
}

/// Returns the same text (or error) for every report.
pub struct CannedExtractor(pub Result<String, ExtractionError>);

impl CannedExtractor {
    pub fn text(s: impl Into<String>) -> Self {
        Self(Ok(s.into()))
    }
}

#[async_trait]
impl TextExtractor for CannedExtractor {
    async fn extract(&self, _document: &ReportDocument) -> Result<String, ExtractionError> {
        self.0.clone()
    }
}

pub fn report() -> ReportDocument {
    ReportDocument::new("appraisal.pdf", b"%PDF-1.7\n".to_vec())
}

pub fn photo(name: &str) -> ImageAsset {
    ImageAsset::new(name, format!("jpeg bytes of {name}").into_bytes())
}
