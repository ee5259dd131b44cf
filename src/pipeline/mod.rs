//! Pipeline stages for a property risk assessment.
//!
//! Each submodule implements one step so it can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ encode ──▶ llm ──▶ evidence ──▶ llm (synthesis)
//! (guard)   (pdfium)    (base64)   (VLM)   (labelled)    (text-only)
//! ```
//!
//! 1. [`input`]    — load uploads and reject runs missing a report or images
//! 2. [`extract`]  — report text via pdfium, in `spawn_blocking`
//! 3. [`encode`]   — size gate and base64 for each photo
//! 4. [`llm`]      — build per-image and synthesis requests; the only stage
//!    with network I/O
//! 5. [`evidence`] — report truncation and the ordered evidence block

pub mod encode;
pub mod evidence;
pub mod extract;
pub mod input;
pub mod llm;
