//! Prompts and rule text for VLM-based property risk assessment.
//!
//! Every string sent to the model is built here so the orchestrator never
//! concatenates prompt text itself, and so tests can inspect prompts without
//! a live endpoint.
//!
//! The image prompt can be overridden via
//! [`crate::config::AssessmentConfig::image_prompt`]; the synthesis template
//! is fixed because the verdict format depends on it.

use crate::error::UnderwriteError;
use std::fmt;
use std::path::Path;

/// Default underwriting guidelines shown to the user for editing.
pub const DEFAULT_RULES: &str = r#"=== ROOFING RULES ===
- Any roof with visible sagging, significant curling, or more than 10% of shingles missing is a high risk.
- Roofs older than 20 years are a high risk.
- Metal roofs in good condition are a low risk.

=== ELECTRICAL RULES ===
- Properties with knob-and-tube wiring are an unacceptable risk.
- Electrical panels must be at least 100 amps. Panels below this are a medium risk.
- Visible frayed wires or scorch marks are a high risk.

=== PLUMBING & WATER RULES ===
- Any visible signs of active water leaks or significant water damage stains are a high risk.
"#;

/// Instruction sent alongside every property photo.
pub const IMAGE_INSPECTION_PROMPT: &str = r#"You are an expert insurance inspector. Analyze this image of a house.
Describe its condition in detail, focusing on any potential hazards, damage, or areas of concern relevant to property insurance.
List any visible issues related to roofing, electrical, plumbing, foundation, or general safety."#;

/// User-editable underwriting guidelines, embedded verbatim in the synthesis prompt.
#[derive(Clone, PartialEq, Eq)]
pub struct RuleText(String);

impl RuleText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Read guidelines from a UTF-8 text file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, UnderwriteError> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .map(Self)
            .map_err(|source| UnderwriteError::FileRead {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RuleText {
    fn default() -> Self {
        Self(DEFAULT_RULES.to_string())
    }
}

impl From<String> for RuleText {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RuleText {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Debug for RuleText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RuleText")
            .field(&format_args!("{} chars", self.0.chars().count()))
            .finish()
    }
}

/// Build the final risk-assessment prompt.
///
/// `rules` and `evidence` are inserted unchanged; the surrounding instruction
/// asks for exactly two labelled parts, an overall risk level from the closed
/// set and a point-by-point justification.
pub fn synthesis_prompt(rules: &RuleText, evidence: &str) -> String {
    format!(
        "You are a senior insurance underwriter. Your task is to provide a final risk assessment for a property.

You have been provided with two sources of information:
1. The UNDERWRITING GUIDELINES which you must strictly follow.
2. The EVIDENCE gathered from an appraisal report and photos of the property.

**UNDERWRITING GUIDELINES:**
---
{rules}
---

**EVIDENCE:**
---
{evidence}
---

**YOUR TASK:**
Based *only* on the evidence and adhering strictly to the guidelines, provide a final risk assessment. Your response should include:
1.  **Overall Risk Level:** (Low Risk, Medium Risk, High Risk, or Unacceptable Risk).
2.  **Justification:** A brief, point-by-point explanation for your decision, referencing specific evidence and the rules it violates or adheres to.",
        rules = rules.as_str(),
        evidence = evidence,
    )
}
