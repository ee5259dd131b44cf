//! Assessment orchestrator.
//!
//! [`Assessor::assess`] drives one run through the state machine
//!
//! ```text
//! Idle ─▶ ExtractingReport ─▶ AnalyzingImages ─▶ Synthesizing ─▶ Done
//!   │                                                  │
//!   └─▶ Aborted (missing input)                        └─▶ Failed
//! ```
//!
//! Only two outcomes are fatal: missing input (before any inference call)
//! and a failed synthesis call. Everything else, an unreadable report, an
//! oversized photo, a failed image call, is reported as an event, kept in
//! [`AssessmentReport::item_errors`], and the run carries on without that
//! piece of evidence.

use crate::config::AssessmentConfig;
use crate::error::{ItemError, UnderwriteError};
use crate::inference::InferenceClient;
use crate::output::{AssessmentReport, AssessmentStats, RiskLevel};
use crate::pipeline::encode::{self, EncodedImage};
use crate::pipeline::evidence::{render_evidence, summarise_report, EvidenceItem};
use crate::pipeline::extract::{PdfiumExtractor, TextExtractor};
use crate::pipeline::input::{AssessmentInput, ValidatedInput};
use crate::pipeline::llm::{self, ImageResult};
use crate::progress::{AssessmentEvent, AssessmentObserver, AssessmentPhase};
use crate::prompts::{synthesis_prompt, RuleText};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs assessments against one inference client.
///
/// The client and extractor are supplied by the caller; the assessor holds no
/// other state, so one instance can serve any number of sequential runs.
pub struct Assessor {
    client: Arc<dyn InferenceClient>,
    extractor: Arc<dyn TextExtractor>,
    config: AssessmentConfig,
}

impl Assessor {
    /// Create an assessor that extracts report text with pdfium
    /// (`PDFIUM_LIB_PATH` or the system library).
    pub fn new(client: Arc<dyn InferenceClient>, config: AssessmentConfig) -> Self {
        Self {
            client,
            extractor: Arc::new(PdfiumExtractor::from_env()),
            config,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    /// Assess one report and its images against `rules`.
    ///
    /// # Errors
    /// - [`UnderwriteError::InputMissing`] — no report or no images; no
    ///   inference call is made.
    /// - [`UnderwriteError::SynthesisFailed`] — the final call failed.
    pub async fn assess(
        &self,
        input: AssessmentInput,
        rules: &RuleText,
        observer: &dyn AssessmentObserver,
    ) -> Result<AssessmentReport, UnderwriteError> {
        let total_start = Instant::now();
        let mut phase = PhaseTracker::new(observer);

        // ── Step 1: Guard ────────────────────────────────────────────────────
        let input = match input.validate() {
            Ok(input) => input,
            Err(e) => {
                warn!("Assessment aborted: {}", e);
                phase.terminate(&e);
                return Err(e);
            }
        };
        info!(
            "Starting assessment via {}: report '{}', {} images",
            self.client.name(),
            input.report().name,
            input.images().len()
        );

        let mut evidence: Vec<EvidenceItem> = Vec::with_capacity(input.images().len() + 1);
        let mut item_errors: Vec<ItemError> = Vec::new();
        let mut stats = AssessmentStats {
            total_images: input.images().len(),
            ..Default::default()
        };

        // ── Step 2: Report text ──────────────────────────────────────────────
        phase.advance(AssessmentPhase::ExtractingReport);
        let extract_start = Instant::now();
        if let Some(item) = self.extract_report(&input, observer, &mut item_errors).await {
            evidence.push(item);
            stats.report_included = true;
        }
        stats.extraction_duration_ms = extract_start.elapsed().as_millis() as u64;

        // ── Step 3: Images ───────────────────────────────────────────────────
        phase.advance(AssessmentPhase::AnalyzingImages);
        let image_start = Instant::now();

        let mut eligible: Vec<(usize, EncodedImage)> = Vec::with_capacity(input.images().len());
        for (idx, asset) in input.images().iter().enumerate() {
            match encode::encode_image(asset, self.config.max_image_bytes) {
                Ok(img) => eligible.push((idx, img)),
                Err(e) => {
                    observer.on_event(&AssessmentEvent::ItemFailed(e.clone()));
                    item_errors.push(e);
                    stats.rejected_images += 1;
                }
            }
        }
        stats.submitted_images = eligible.len();

        let mut results = self
            .analyze_images(&eligible, input.images().len(), observer)
            .await;
        // Completion order is arbitrary; evidence follows upload order.
        results.sort_by_key(|r| r.index);

        for result in results {
            stats.image_call_duration_ms += result.duration_ms;
            match result.outcome {
                Ok(completion) => {
                    stats.total_input_tokens += completion.prompt_tokens.unwrap_or(0) as u64;
                    stats.total_output_tokens += completion.completion_tokens.unwrap_or(0) as u64;
                    stats.analyzed_images += 1;
                    evidence.push(EvidenceItem::image(result.name, completion.content));
                }
                Err(source) => {
                    stats.failed_images += 1;
                    item_errors.push(ItemError::ImageInference {
                        name: result.name,
                        source,
                    });
                }
            }
        }
        stats.image_duration_ms = image_start.elapsed().as_millis() as u64;
        info!(
            "Images: {}/{} analyzed, {} failed, {} rejected",
            stats.analyzed_images, stats.total_images, stats.failed_images, stats.rejected_images
        );

        // ── Step 4: Synthesis ────────────────────────────────────────────────
        phase.advance(AssessmentPhase::Synthesizing);
        if evidence.is_empty() {
            warn!("No evidence collected; synthesising on guidelines alone");
            observer.on_event(&AssessmentEvent::NoEvidence);
        }

        let prompt = build_synthesis_prompt(rules, &evidence);
        debug!("Synthesis prompt: {} chars", prompt.len());

        let synthesis_start = Instant::now();
        let completion = match llm::synthesize(self.client.as_ref(), prompt.clone(), &self.config).await
        {
            Ok(c) => c,
            Err(source) => {
                let e = UnderwriteError::SynthesisFailed { source };
                warn!("{}", e);
                phase.terminate(&e);
                return Err(e);
            }
        };
        stats.synthesis_duration_ms = synthesis_start.elapsed().as_millis() as u64;
        stats.total_input_tokens += completion.prompt_tokens.unwrap_or(0) as u64;
        stats.total_output_tokens += completion.completion_tokens.unwrap_or(0) as u64;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        let risk_level = RiskLevel::detect(&completion.content);
        info!(
            "Assessment complete: {} evidence items, level {:?}, {}ms",
            evidence.len(),
            risk_level,
            stats.total_duration_ms
        );
        phase.advance(AssessmentPhase::Done);

        Ok(AssessmentReport {
            verdict: completion.content,
            risk_level,
            evidence,
            synthesis_prompt: prompt,
            item_errors,
            stats,
        })
    }

    /// Load the report and images from disk, then [`assess`](Self::assess).
    ///
    /// A missing report path or an empty image list ends in `Aborted` like
    /// any other incomplete input; an unreadable file is a
    /// [`UnderwriteError::FileRead`].
    pub async fn assess_files<P: AsRef<Path>>(
        &self,
        report: Option<P>,
        images: &[P],
        rules: &RuleText,
        observer: &dyn AssessmentObserver,
    ) -> Result<AssessmentReport, UnderwriteError> {
        let input = AssessmentInput::from_paths(report, images).await?;
        self.assess(input, rules, observer).await
    }

    /// Synchronous wrapper around [`assess`](Self::assess).
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn assess_sync(
        &self,
        input: AssessmentInput,
        rules: &RuleText,
        observer: &dyn AssessmentObserver,
    ) -> Result<AssessmentReport, UnderwriteError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| UnderwriteError::Internal(format!("Failed to create tokio runtime: {e}")))?
            .block_on(self.assess(input, rules, observer))
    }

    /// Extract, truncate and label the report. `None` when it adds no evidence.
    async fn extract_report(
        &self,
        input: &ValidatedInput,
        observer: &dyn AssessmentObserver,
        item_errors: &mut Vec<ItemError>,
    ) -> Option<EvidenceItem> {
        match self.extractor.extract(input.report()).await {
            Ok(text) if text.trim().is_empty() => {
                warn!("Report '{}' has no extractable text", input.report().name);
                observer.on_event(&AssessmentEvent::ReportEmpty);
                None
            }
            Ok(text) => {
                let summary = summarise_report(&text, self.config.report_char_limit);
                observer.on_event(&AssessmentEvent::ReportExtracted {
                    chars: text.chars().count(),
                    truncated: summary.truncated,
                });
                Some(EvidenceItem::report(summary.text))
            }
            Err(e) => {
                warn!("Report extraction failed: {}", e);
                let item = ItemError::from(e);
                observer.on_event(&AssessmentEvent::ItemFailed(item.clone()));
                item_errors.push(item);
                None
            }
        }
    }

    /// Describe every eligible image, at most `concurrency` at a time.
    ///
    /// Results come back in completion order; each carries its upload index.
    async fn analyze_images(
        &self,
        images: &[(usize, EncodedImage)],
        total: usize,
        observer: &dyn AssessmentObserver,
    ) -> Vec<ImageResult> {
        let client = self.client.as_ref();
        let config = &self.config;

        stream::iter(images.iter().map(|(idx, img)| async move {
            observer.on_event(&AssessmentEvent::ImageStarted {
                index: idx + 1,
                total,
                name: img.name.clone(),
            });
            let result = llm::analyze_image(client, *idx, img, config).await;
            match &result.outcome {
                Ok(c) => observer.on_event(&AssessmentEvent::ImageAnalyzed {
                    index: idx + 1,
                    total,
                    name: result.name.clone(),
                    chars: c.content.chars().count(),
                }),
                Err(e) => observer.on_event(&AssessmentEvent::ItemFailed(
                    ItemError::ImageInference {
                        name: result.name.clone(),
                        source: e.clone(),
                    },
                )),
            }
            result
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await
    }
}

/// Render `evidence` and embed it with `rules` in the synthesis prompt.
///
/// Pure function of its inputs: identical rules and evidence always give a
/// byte-identical prompt.
pub fn build_synthesis_prompt(rules: &RuleText, evidence: &[EvidenceItem]) -> String {
    synthesis_prompt(rules, &render_evidence(evidence))
}

/// Tracks the current phase and reports every transition.
struct PhaseTracker<'a> {
    current: AssessmentPhase,
    observer: &'a dyn AssessmentObserver,
}

impl<'a> PhaseTracker<'a> {
    fn new(observer: &'a dyn AssessmentObserver) -> Self {
        Self {
            current: AssessmentPhase::Idle,
            observer,
        }
    }

    fn advance(&mut self, to: AssessmentPhase) {
        debug!("Phase {:?} → {:?}", self.current, to);
        self.observer.on_event(&AssessmentEvent::PhaseChanged {
            from: self.current,
            to,
        });
        self.current = to;
    }

    /// Report a fatal error, then move to its terminal phase.
    fn terminate(&mut self, error: &UnderwriteError) {
        let to = error.terminal_phase();
        self.observer.on_event(&AssessmentEvent::RunFailed {
            phase: to,
            message: error.to_string(),
        });
        self.advance(to);
    }
}
