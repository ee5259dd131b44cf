//! Evidence items and the evidence block fed into synthesis.
//!
//! Order is fixed: the report summary first (when there is one), then image
//! descriptions in upload order. Each item is rendered as a labelled section
//! and sections are separated by a blank line.

use std::fmt;

/// Appended to report text that was cut at the character limit.
pub const TRUNCATION_MARKER: &str = "...";

/// Where a piece of evidence came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceSource {
    ReportSummary,
    Image { name: String },
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidenceSource::ReportSummary => f.write_str("--- APPRAISAL REPORT SUMMARY ---"),
            EvidenceSource::Image { name } => write!(f, "--- IMAGE ANALYSIS: {name} ---"),
        }
    }
}

/// One labelled text fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceItem {
    pub source: EvidenceSource,
    pub body: String,
}

impl EvidenceItem {
    pub fn image(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            source: EvidenceSource::Image { name: name.into() },
            body: body.into(),
        }
    }

    pub fn report(body: impl Into<String>) -> Self {
        Self {
            source: EvidenceSource::ReportSummary,
            body: body.into(),
        }
    }
}

impl fmt::Display for EvidenceItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.source, self.body)
    }
}

/// Report text cut to `limit` characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub text: String,
    pub truncated: bool,
}

/// Keep the first `limit` characters of the report, adding the marker only
/// when something was cut.
///
/// Counting is by `char`, so a multi-byte character is never split.
pub fn summarise_report(text: &str, limit: usize) -> ReportSummary {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => ReportSummary {
            text: format!("{}{}", &text[..cut], TRUNCATION_MARKER),
            truncated: true,
        },
        None => ReportSummary {
            text: text.to_string(),
            truncated: false,
        },
    }
}

/// Render items as the evidence block: labelled sections joined by a blank line.
pub fn render_evidence(items: &[EvidenceItem]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}
