//! Error types for the edgequake-underwrite library.
//!
//! Two tiers of failure exist, mirroring how an assessment run behaves:
//!
//! * [`UnderwriteError`] — **Fatal**: the run (or the whole process) cannot
//!   produce a verdict. Missing inputs, a missing credential, or a failed
//!   synthesis call. Returned as `Err(UnderwriteError)` from
//!   [`crate::assess::Assessor::assess`].
//!
//! * [`ItemError`] — **Non-fatal**: one piece of evidence could not be
//!   produced (unreadable report, oversized photo, failed image call). The run
//!   continues without it and the error is kept in
//!   [`crate::output::AssessmentReport::item_errors`].
//!
//! [`ExtractionError`] and [`InferenceError`] are the leaf errors raised by the
//! text extractor and the inference client respectively.

use crate::progress::AssessmentPhase;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the required inputs was absent when the run started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInput {
    Report,
    Images,
    Both,
}

impl fmt::Display for MissingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingInput::Report => f.write_str("no report uploaded"),
            MissingInput::Images => f.write_str("no images uploaded"),
            MissingInput::Both => f.write_str("no report and no images uploaded"),
        }
    }
}

/// All fatal errors returned by the edgequake-underwrite library.
///
/// Per-item failures use [`ItemError`] and are collected rather than
/// propagated here.
#[derive(Debug, Error)]
pub enum UnderwriteError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The run needs exactly one report and at least one image.
    #[error("Please upload both a PDF report and at least one image ({missing}).")]
    InputMissing { missing: MissingInput },

    /// An input file could not be read from disk.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Credential / provider errors ──────────────────────────────────────
    /// No API key in the environment or the secrets file.
    #[error(
        "{var} not found!\nSet it in the environment or add it to {secrets_path:?}."
    )]
    CredentialMissing { var: String, secrets_path: PathBuf },

    /// The secrets file exists but is not valid TOML.
    #[error("Secrets file '{path}' is invalid: {detail}")]
    SecretsFileInvalid { path: PathBuf, detail: String },

    /// A named edgequake-llm provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Synthesis ─────────────────────────────────────────────────────────
    /// The final risk-assessment call failed. No verdict is produced.
    #[error("Failed to generate final assessment: {source}")]
    SynthesisFailed {
        #[source]
        source: InferenceError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UnderwriteError {
    /// Terminal state a run ends in when this error is returned.
    ///
    /// Input problems stop the run before any inference call (`Aborted`);
    /// everything else happens after work has started (`Failed`).
    pub fn terminal_phase(&self) -> AssessmentPhase {
        match self {
            UnderwriteError::InputMissing { .. } => AssessmentPhase::Aborted,
            _ => AssessmentPhase::Failed,
        }
    }
}

/// The report could not be parsed as a paginated text document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The bytes do not start with the `%PDF` signature.
    #[error("Error reading PDF file '{name}': not a PDF (first bytes: {magic:?})")]
    NotAPdf { name: String, magic: Vec<u8> },

    /// The PDF header, trailer or xref table is unreadable.
    #[error("Error reading PDF file '{name}': {detail}")]
    Corrupt { name: String, detail: String },

    /// The PDF is encrypted.
    #[error("Error reading PDF file '{name}': document is password protected")]
    PasswordRequired { name: String },

    /// The pdfium shared library could not be loaded.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    Binding(String),

    /// The blocking extraction task did not complete.
    #[error("Extraction task failed: {0}")]
    Internal(String),
}

/// A single remote chat-completion call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    /// Connection, TLS or timeout failure before a response arrived.
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP 401/403.
    #[error("Authentication error ({status}): {detail}")]
    Auth { status: u16, detail: String },

    /// HTTP 429.
    #[error("Rate limit exceeded{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-success status.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The body did not match the expected `choices[].message.content` shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// No choices, or the first choice carried no text.
    #[error("Empty response from model")]
    EmptyResponse,

    /// Error raised by an edgequake-llm provider.
    #[error("Provider error: {0}")]
    Provider(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

/// A non-fatal failure affecting one evidence source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemError {
    /// The report could not be read; the run continues without it.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The image exceeds the transport size limit and was skipped.
    #[error("Image '{name}' is too large ({size} bytes > {limit} bytes) and will be skipped.")]
    AssetTooLarge {
        name: String,
        size: usize,
        limit: usize,
    },

    /// The per-image inference call failed.
    #[error("Failed to analyze image {name}: {source}")]
    ImageInference {
        name: String,
        #[source]
        source: InferenceError,
    },
}
