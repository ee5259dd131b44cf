//! # edgequake-underwrite
//!
//! Property risk triage from an appraisal report and property photos using
//! Vision Language Models (VLMs).
//!
//! The crate does not judge anything itself. It extracts the report text,
//! asks a vision model to describe each photo, assembles the results into an
//! evidence block, and asks the same model for a verdict constrained by
//! user-editable underwriting guidelines. The verdict is returned exactly as
//! the model wrote it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! report.pdf + photos + guidelines
//!  │
//!  ├─ 1. Guard     one report and ≥ 1 image, else Aborted (no calls made)
//!  ├─ 2. Extract   report text via pdfium, first 2000 chars kept
//!  ├─ 3. Encode    photos ≤ 4 MiB → base64 data URLs, larger ones skipped
//!  ├─ 4. Describe  one VLM call per photo (optionally concurrent)
//!  ├─ 5. Evidence  labelled sections, report first, photos in upload order
//!  └─ 6. Verdict   one text call: guidelines + evidence → risk level + justification
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_underwrite::{
//!     ApiKey, AssessmentConfig, AssessmentInput, Assessor, ChatCompletionsClient, EventLog,
//!     ImageAsset, ReportDocument, RuleText,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = ApiKey::load("GROQ_API_KEY", &edgequake_underwrite::secrets::default_secrets_path())?;
//!     let assessor = Assessor::new(
//!         Arc::new(ChatCompletionsClient::new(key)),
//!         AssessmentConfig::default(),
//!     );
//!
//!     let input = AssessmentInput::new(
//!         Some(ReportDocument::from_path("appraisal.pdf").await?),
//!         vec![ImageAsset::from_path("roof.jpg").await?],
//!     );
//!     let events = EventLog::new();
//!     let report = assessor.assess(input, &RuleText::default(), &events).await?;
//!     println!("{}", report.verdict);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `underwrite` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assess;
pub mod config;
pub mod error;
pub mod inference;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod secrets;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assess::{build_synthesis_prompt, Assessor};
pub use config::{AssessmentConfig, AssessmentConfigBuilder, DEFAULT_MODEL};
pub use error::{ExtractionError, InferenceError, ItemError, MissingInput, UnderwriteError};
pub use inference::{
    ChatCompletionsClient, Completion, ContentPart, InferenceClient, InferenceRequest,
    PromptContent, ProviderClient,
};
pub use output::{AssessmentReport, AssessmentStats, RiskLevel};
pub use pipeline::encode::EncodedImage;
pub use pipeline::evidence::{EvidenceItem, EvidenceSource};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::input::{AssessmentInput, ImageAsset, ReportDocument, ValidatedInput};
pub use progress::{
    AssessmentEvent, AssessmentObserver, AssessmentPhase, EventLog, NoopObserver, Severity,
};
pub use prompts::RuleText;
pub use secrets::ApiKey;
