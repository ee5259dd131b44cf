//! Result types returned by a completed assessment.

use crate::error::ItemError;
use crate::pipeline::evidence::EvidenceItem;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// The closed set of overall risk levels the synthesis prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unacceptable,
}

static OVERALL_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)overall\s+risk\s+level\W*(low|medium|high|unacceptable)\s+risk")
        .expect("valid regex")
});

static ANY_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(low|medium|high|unacceptable)\s+risk\b").expect("valid regex")
});

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Unacceptable,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::High => "High Risk",
            RiskLevel::Unacceptable => "Unacceptable Risk",
        }
    }

    /// Best-effort read of the level stated in a verdict, for display only.
    ///
    /// Prefers the value after "Overall Risk Level"; otherwise takes the first
    /// level mentioned anywhere. The verdict itself is never modified.
    pub fn detect(verdict: &str) -> Option<RiskLevel> {
        let caps = OVERALL_LEVEL
            .captures(verdict)
            .or_else(|| ANY_LEVEL.captures(verdict))?;
        match caps.get(1)?.as_str().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "unacceptable" => Some(RiskLevel::Unacceptable),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssessmentStats {
    /// Images uploaded.
    pub total_images: usize,
    /// Images sent to the model (under the size limit).
    pub submitted_images: usize,
    /// Images that produced a description.
    pub analyzed_images: usize,
    /// Image calls that failed.
    pub failed_images: usize,
    /// Images skipped for size.
    pub rejected_images: usize,
    /// Whether the report contributed evidence.
    pub report_included: bool,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extraction_duration_ms: u64,
    /// Wall time of the image phase.
    pub image_duration_ms: u64,
    /// Sum of individual image call times; exceeds the wall time when calls overlap.
    pub image_call_duration_ms: u64,
    pub synthesis_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A completed assessment.
#[derive(Debug, Clone)]
pub struct AssessmentReport {
    /// Synthesis output, exactly as returned by the model.
    pub verdict: String,
    /// Level read from the verdict, if one was recognisable.
    pub risk_level: Option<RiskLevel>,
    /// Evidence in the order it was given to the model.
    pub evidence: Vec<EvidenceItem>,
    /// The full synthesis prompt that produced `verdict`.
    pub synthesis_prompt: String,
    /// Non-fatal problems absorbed during the run.
    pub item_errors: Vec<ItemError>,
    pub stats: AssessmentStats,
}
