//! Configuration types for a property risk assessment run.
//!
//! Every knob the orchestrator reads lives in [`AssessmentConfig`], built via
//! [`AssessmentConfigBuilder`]. The inference client and the text extractor
//! are passed to [`crate::assess::Assessor`] separately; this struct only
//! holds plain values so it can be cloned and logged freely.

use crate::error::UnderwriteError;
use std::fmt;

/// Remote model used for both the per-image and the synthesis calls.
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Largest image payload accepted by the endpoint (4 MiB of raw bytes).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

/// Number of report characters kept in the evidence block.
pub const DEFAULT_REPORT_CHAR_LIMIT: usize = 2000;

/// Configuration for an assessment run.
///
/// Built via [`AssessmentConfig::builder()`] or using
/// [`AssessmentConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_underwrite::AssessmentConfig;
///
/// let config = AssessmentConfig::builder()
///     .concurrency(4)
///     .model("meta-llama/llama-4-scout-17b-16e-instruct")
///     .build()
///     .unwrap();
/// assert_eq!(config.image_max_tokens, 512);
/// ```
#[derive(Clone, PartialEq)]
pub struct AssessmentConfig {
    /// Model identifier sent with every request.
    pub model: String,

    /// Output token cap for each per-image description. Default: 512.
    pub image_max_tokens: usize,

    /// Output token cap for the final verdict. Default: 1024.
    pub synthesis_max_tokens: usize,

    /// Sampling temperature. `None` leaves the endpoint default in place.
    pub temperature: Option<f32>,

    /// Number of image calls in flight at once. Default: 1 (sequential).
    ///
    /// Image calls are independent, so raising this only changes wall-clock
    /// time; evidence is always reassembled in upload order.
    pub concurrency: usize,

    /// Images larger than this many raw bytes are skipped. Default: 4 MiB.
    pub max_image_bytes: usize,

    /// Report characters kept before the `...` marker. Default: 2000.
    pub report_char_limit: usize,

    /// Custom inspection prompt for image calls. If None, uses the built-in one.
    pub image_prompt: Option<String>,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            image_max_tokens: 512,
            synthesis_max_tokens: 1024,
            temperature: None,
            concurrency: 1,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            report_char_limit: DEFAULT_REPORT_CHAR_LIMIT,
            image_prompt: None,
        }
    }
}

impl fmt::Debug for AssessmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentConfig")
            .field("model", &self.model)
            .field("image_max_tokens", &self.image_max_tokens)
            .field("synthesis_max_tokens", &self.synthesis_max_tokens)
            .field("temperature", &self.temperature)
            .field("concurrency", &self.concurrency)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("report_char_limit", &self.report_char_limit)
            .field("image_prompt", &self.image_prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

impl AssessmentConfig {
    /// Create a new builder for `AssessmentConfig`.
    pub fn builder() -> AssessmentConfigBuilder {
        AssessmentConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AssessmentConfig`].
#[derive(Debug)]
pub struct AssessmentConfigBuilder {
    config: AssessmentConfig,
}

impl AssessmentConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn image_max_tokens(mut self, n: usize) -> Self {
        self.config.image_max_tokens = n;
        self
    }

    pub fn synthesis_max_tokens(mut self, n: usize) -> Self {
        self.config.synthesis_max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_image_bytes(mut self, n: usize) -> Self {
        self.config.max_image_bytes = n;
        self
    }

    pub fn report_char_limit(mut self, n: usize) -> Self {
        self.config.report_char_limit = n;
        self
    }

    pub fn image_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.image_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssessmentConfig, UnderwriteError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(UnderwriteError::InvalidConfig(
                "Model identifier must not be empty".into(),
            ));
        }
        if c.image_max_tokens == 0 || c.synthesis_max_tokens == 0 {
            return Err(UnderwriteError::InvalidConfig(
                "Max tokens must be ≥ 1".into(),
            ));
        }
        if c.max_image_bytes == 0 {
            return Err(UnderwriteError::InvalidConfig(
                "Max image size must be ≥ 1 byte".into(),
            ));
        }
        if c.report_char_limit == 0 {
            return Err(UnderwriteError::InvalidConfig(
                "Report character limit must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
