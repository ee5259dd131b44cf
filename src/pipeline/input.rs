//! Input artefacts and the pre-flight guard.
//!
//! A run needs one report and at least one image. [`AssessmentInput::validate`]
//! enforces that before any side-effecting call, returning a
//! [`ValidatedInput`] that the orchestrator can consume without re-checking.
//!
//! Files are read whole into memory: the report is handed to pdfium as a byte
//! slice and images are base64-encoded verbatim, so there is nothing to gain
//! from streaming.

use crate::error::{MissingInput, UnderwriteError};
use std::path::Path;
use tracing::debug;

/// The uploaded appraisal report (expected to be a PDF).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ReportDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UnderwriteError> {
        let (name, bytes) = read_file(path.as_ref()).await?;
        Ok(Self { name, bytes })
    }
}

/// One uploaded property photo.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageAsset {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UnderwriteError> {
        let (name, bytes) = read_file(path.as_ref()).await?;
        Ok(Self { name, bytes })
    }
}

impl std::fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAsset")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Everything the user supplied for one run, possibly incomplete.
#[derive(Debug, Clone, Default)]
pub struct AssessmentInput {
    pub report: Option<ReportDocument>,
    /// Upload order is preserved through to the evidence block.
    pub images: Vec<ImageAsset>,
}

impl AssessmentInput {
    pub fn new(report: Option<ReportDocument>, images: Vec<ImageAsset>) -> Self {
        Self { report, images }
    }

    /// Load a report and images from disk, in the given order.
    pub async fn from_paths<P: AsRef<Path>>(
        report: Option<P>,
        images: &[P],
    ) -> Result<Self, UnderwriteError> {
        let report = match report {
            Some(p) => Some(ReportDocument::from_path(p).await?),
            None => None,
        };
        let mut assets = Vec::with_capacity(images.len());
        for p in images {
            assets.push(ImageAsset::from_path(p).await?);
        }
        Ok(Self {
            report,
            images: assets,
        })
    }

    /// Require exactly one report and at least one image.
    pub fn validate(self) -> Result<ValidatedInput, UnderwriteError> {
        match (self.report, self.images.is_empty()) {
            (Some(report), false) => Ok(ValidatedInput {
                report,
                images: self.images,
            }),
            (Some(_), true) => Err(UnderwriteError::InputMissing {
                missing: MissingInput::Images,
            }),
            (None, false) => Err(UnderwriteError::InputMissing {
                missing: MissingInput::Report,
            }),
            (None, true) => Err(UnderwriteError::InputMissing {
                missing: MissingInput::Both,
            }),
        }
    }
}

/// Input that passed [`AssessmentInput::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedInput {
    report: ReportDocument,
    images: Vec<ImageAsset>,
}

impl ValidatedInput {
    pub fn report(&self) -> &ReportDocument {
        &self.report
    }

    /// Never empty.
    pub fn images(&self) -> &[ImageAsset] {
        &self.images
    }
}

async fn read_file(path: &Path) -> Result<(String, Vec<u8>), UnderwriteError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| UnderwriteError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!("Loaded '{}' ({} bytes)", name, bytes.len());
    Ok((name, bytes))
}
