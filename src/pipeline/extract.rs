//! Report text extraction.
//!
//! [`TextExtractor`] turns a [`ReportDocument`] into its concatenated page
//! text. A page whose text layer cannot be read contributes an empty string;
//! only a document that cannot be opened at all is an error.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and no async API.
//! [`PdfiumExtractor`] runs it on the blocking pool so a large report does not
//! stall the runtime while image calls are in flight.

use crate::error::ExtractionError;
use crate::pipeline::input::ReportDocument;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable pointing at a pdfium library file or its directory.
pub const PDFIUM_LIB_PATH_VAR: &str = "PDFIUM_LIB_PATH";

/// Extract the text of a paginated report.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, document: &ReportDocument) -> Result<String, ExtractionError>;
}

/// Extracts text with pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    library_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    /// Bind to the library at `path` (a file, or a directory containing it).
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    /// Use `PDFIUM_LIB_PATH` when set, else the system library.
    pub fn from_env() -> Self {
        Self {
            library_path: std::env::var_os(PDFIUM_LIB_PATH_VAR)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        }
    }
}

#[async_trait]
impl TextExtractor for PdfiumExtractor {
    async fn extract(&self, document: &ReportDocument) -> Result<String, ExtractionError> {
        check_pdf_magic(document)?;

        let name = document.name.clone();
        let bytes = document.bytes.clone();
        let library_path = self.library_path.clone();

        tokio::task::spawn_blocking(move || {
            extract_blocking(&name, &bytes, library_path.as_deref())
        })
        .await
        .map_err(|e| ExtractionError::Internal(format!("Extraction task panicked: {e}")))?
    }
}

/// Reject anything that does not start with `%PDF` before touching pdfium.
pub fn check_pdf_magic(document: &ReportDocument) -> Result<(), ExtractionError> {
    if document.bytes.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(ExtractionError::NotAPdf {
            name: document.name.clone(),
            magic: document.bytes.iter().take(4).copied().collect(),
        })
    }
}

fn bind(library_path: Option<&Path>) -> Result<Pdfium, ExtractionError> {
    let bindings = match library_path {
        Some(p) if p.is_dir() => {
            Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path(p))
        }
        Some(p) => Pdfium::bind_to_library(p),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractionError::Binding(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of text extraction.
fn extract_blocking(
    name: &str,
    bytes: &[u8],
    library_path: Option<&Path>,
) -> Result<String, ExtractionError> {
    let pdfium = bind(library_path)?;

    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.contains("Password") || err_str.contains("password") {
            ExtractionError::PasswordRequired {
                name: name.to_string(),
            }
        } else {
            ExtractionError::Corrupt {
                name: name.to_string(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    info!("Report '{}' loaded: {} pages", name, pages.len());

    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        match page.text() {
            Ok(page_text) => text.push_str(&page_text.all()),
            Err(e) => debug!("Page {} of '{}' has no text layer: {:?}", idx + 1, name, e),
        }
    }

    debug!("Extracted {} chars from '{}'", text.chars().count(), name);
    Ok(text)
}
