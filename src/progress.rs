//! Structured progress events emitted by an assessment run.
//!
//! The orchestrator never renders anything. It reports each phase change,
//! warning and error as an [`AssessmentEvent`] to an [`AssessmentObserver`],
//! and the presentation layer decides how to show it: a terminal spinner, a
//! web socket, or a test that just records what happened.
//!
//! Three observers ship with the crate:
//!
//! * [`NoopObserver`] — discard everything.
//! * [`EventLog`] — accumulate events in memory, in emission order.
//! * `tokio::sync::mpsc::UnboundedSender<AssessmentEvent>` — forward to a
//!   channel consumed elsewhere.

use crate::error::ItemError;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// The orchestrator's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssessmentPhase {
    Idle,
    ExtractingReport,
    AnalyzingImages,
    Synthesizing,
    /// Verdict produced.
    Done,
    /// Inputs were missing; no inference call was made.
    Aborted,
    /// Synthesis failed; no verdict.
    Failed,
}

impl AssessmentPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AssessmentPhase::Done | AssessmentPhase::Aborted | AssessmentPhase::Failed
        )
    }
}

impl fmt::Display for AssessmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssessmentPhase::Idle => "idle",
            AssessmentPhase::ExtractingReport => "analyzing PDF report",
            AssessmentPhase::AnalyzingImages => "analyzing property images",
            AssessmentPhase::Synthesizing => "performing final risk assessment",
            AssessmentPhase::Done => "done",
            AssessmentPhase::Aborted => "aborted",
            AssessmentPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How the presentation layer should treat an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One thing that happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum AssessmentEvent {
    /// The state machine moved to `to`.
    PhaseChanged {
        from: AssessmentPhase,
        to: AssessmentPhase,
    },

    /// Report text was extracted and added to the evidence.
    ReportExtracted { chars: usize, truncated: bool },

    /// Report text was extracted but empty, so no report evidence is added.
    ReportEmpty,

    /// A per-item failure that the run absorbs.
    ItemFailed(ItemError),

    /// An image call is about to be sent. `index` is 1-based upload position.
    ImageStarted {
        index: usize,
        total: usize,
        name: String,
    },

    /// An image call returned a description.
    ImageAnalyzed {
        index: usize,
        total: usize,
        name: String,
        chars: usize,
    },

    /// No evidence at all reached synthesis.
    NoEvidence,

    /// The run stopped with a fatal error; the message is user-facing.
    RunFailed { phase: AssessmentPhase, message: String },
}

impl AssessmentEvent {
    pub fn severity(&self) -> Severity {
        match self {
            AssessmentEvent::ItemFailed(ItemError::AssetTooLarge { .. })
            | AssessmentEvent::ReportEmpty
            | AssessmentEvent::NoEvidence => Severity::Warning,
            AssessmentEvent::ItemFailed(_) => Severity::Error,
            AssessmentEvent::RunFailed { phase, .. } => match phase {
                AssessmentPhase::Aborted => Severity::Warning,
                _ => Severity::Error,
            },
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for AssessmentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssessmentEvent::PhaseChanged { to, .. } => write!(f, "{}", capitalise(&to.to_string())),
            AssessmentEvent::ReportExtracted { chars, truncated } => {
                if *truncated {
                    write!(f, "Report text extracted ({chars} chars, truncated)")
                } else {
                    write!(f, "Report text extracted ({chars} chars)")
                }
            }
            AssessmentEvent::ReportEmpty => f.write_str("Report contains no extractable text"),
            AssessmentEvent::ItemFailed(e) => write!(f, "{e}"),
            AssessmentEvent::ImageStarted { index, total, name } => {
                write!(f, "Image {index}/{total}: {name}")
            }
            AssessmentEvent::ImageAnalyzed {
                index,
                total,
                name,
                chars,
            } => write!(f, "Image {index}/{total}: {name} analyzed ({chars} chars)"),
            AssessmentEvent::NoEvidence => {
                f.write_str("No evidence could be collected; assessing on guidelines alone")
            }
            AssessmentEvent::RunFailed { message, .. } => f.write_str(message),
        }
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Receives events from the orchestrator.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` image
/// events arrive from concurrently polled futures.
pub trait AssessmentObserver: Send + Sync {
    fn on_event(&self, event: &AssessmentEvent);
}

/// Discards every event.
pub struct NoopObserver;

impl AssessmentObserver for NoopObserver {
    fn on_event(&self, _event: &AssessmentEvent) {}
}

/// Records events in emission order.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<AssessmentEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AssessmentEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Phases visited, in order, starting from the first transition target.
    pub fn phases(&self) -> Vec<AssessmentPhase> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AssessmentEvent::PhaseChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events()
            .iter()
            .filter(|e| e.severity() == severity)
            .count()
    }
}

impl AssessmentObserver for EventLog {
    fn on_event(&self, event: &AssessmentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

impl AssessmentObserver for UnboundedSender<AssessmentEvent> {
    fn on_event(&self, event: &AssessmentEvent) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.send(event.clone());
    }
}
