//! Orchestrator behaviour against a scripted inference client.
//!
//! No network and no pdfium: report text comes from a canned extractor and
//! every model answer is scripted per image name.

mod common;

use common::{photo, report, CannedExtractor, Scripted, ScriptedClient};
use edgequake_underwrite::pipeline::evidence::TRUNCATION_MARKER;
use edgequake_underwrite::{
    AssessmentConfig, AssessmentEvent, AssessmentInput, AssessmentPhase, Assessor, EventLog,
    EvidenceItem, EvidenceSource, ExtractionError, ImageAsset, InferenceError, ItemError,
    MissingInput, RiskLevel, RuleText, Severity, UnderwriteError,
};
use std::sync::Arc;

fn assessor(client: Arc<ScriptedClient>, extractor: CannedExtractor) -> Assessor {
    Assessor::new(client, AssessmentConfig::default()).with_extractor(Arc::new(extractor))
}

fn image_names(evidence: &[EvidenceItem]) -> Vec<String> {
    evidence
        .iter()
        .filter_map(|e| match &e.source {
            EvidenceSource::Image { name } => Some(name.clone()),
            EvidenceSource::ReportSummary => None,
        })
        .collect()
}

// ── Guard ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn no_images_aborts_without_any_call() {
    let client = Arc::new(ScriptedClient::new("unused"));
    let a = assessor(client.clone(), CannedExtractor::text("report"));
    let log = EventLog::new();

    let err = a
        .assess(AssessmentInput::new(Some(report()), vec![]), &RuleText::default(), &log)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        UnderwriteError::InputMissing {
            missing: MissingInput::Images
        }
    ));
    assert_eq!(client.call_count(), 0);
    assert_eq!(log.phases(), vec![AssessmentPhase::Aborted]);
}

#[tokio::test]
async fn no_report_aborts_without_any_call() {
    let client = Arc::new(ScriptedClient::new("unused"));
    let a = assessor(client.clone(), CannedExtractor::text("report"));
    let log = EventLog::new();

    let err = a
        .assess(
            AssessmentInput::new(None, vec![photo("roof.jpg")]),
            &RuleText::default(),
            &log,
        )
        .await
        .unwrap_err();

    assert_eq!(err.terminal_phase(), AssessmentPhase::Aborted);
    assert!(err.to_string().contains("Please upload both"));
    assert_eq!(client.call_count(), 0);
    assert_eq!(log.count(Severity::Warning), 1);
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn roof_scenario_passes_verdict_through_unchanged() {
    let verdict = "1. **Overall Risk Level:** High Risk\n2. **Justification:** Roof is 25 years old.";
    let client = Arc::new(
        ScriptedClient::new(verdict).image("roof.jpg", Scripted::ok("Roof shows curling shingles.")),
    );
    let a = assessor(client.clone(), CannedExtractor::text("Roof is 25 years old."));
    let log = EventLog::new();

    let out = a
        .assess(
            AssessmentInput::new(Some(report()), vec![photo("roof.jpg")]),
            &RuleText::default(),
            &log,
        )
        .await
        .unwrap();

    assert_eq!(out.verdict, verdict);
    assert_eq!(out.risk_level, Some(RiskLevel::High));
    assert_eq!(
        out.evidence,
        vec![
            EvidenceItem::report("Roof is 25 years old."),
            EvidenceItem::image("roof.jpg", "Roof shows curling shingles."),
        ]
    );

    // Exactly one image call and one synthesis call.
    assert_eq!(client.call_count(), 2);
    let synthesis = client.text_calls();
    assert_eq!(synthesis.len(), 1);
    let prompt = synthesis[0].content.text();
    assert_eq!(prompt, out.synthesis_prompt);

    let report_at = prompt.find("--- APPRAISAL REPORT SUMMARY ---\nRoof is 25 years old.").unwrap();
    let image_at = prompt
        .find("--- IMAGE ANALYSIS: roof.jpg ---\nRoof shows curling shingles.")
        .unwrap();
    assert!(report_at < image_at);
    assert!(prompt.contains("=== ROOFING RULES ==="));

    assert_eq!(out.stats.analyzed_images, 1);
    assert!(out.stats.report_included);
    assert_eq!(out.stats.total_input_tokens, 20);
    assert_eq!(out.stats.total_output_tokens, 10);
    assert!(out.item_errors.is_empty());
}

#[tokio::test]
async fn phases_follow_the_state_machine() {
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Low Risk"));
    let a = assessor(client, CannedExtractor::text("Fine house."));
    let log = EventLog::new();

    a.assess(
        AssessmentInput::new(Some(report()), vec![photo("a.jpg"), photo("b.jpg")]),
        &RuleText::default(),
        &log,
    )
    .await
    .unwrap();

    assert_eq!(
        log.phases(),
        vec![
            AssessmentPhase::ExtractingReport,
            AssessmentPhase::AnalyzingImages,
            AssessmentPhase::Synthesizing,
            AssessmentPhase::Done,
        ]
    );
    let analyzed = log
        .events()
        .into_iter()
        .filter(|e| matches!(e, AssessmentEvent::ImageAnalyzed { .. }))
        .count();
    assert_eq!(analyzed, 2);
    assert_eq!(log.count(Severity::Error), 0);
}

#[tokio::test]
async fn custom_rules_reach_the_synthesis_prompt() {
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Medium Risk"));
    let a = assessor(client.clone(), CannedExtractor::text("Two storey house."));
    let rules = RuleText::new("=== POOL RULES ===\n- Unfenced pool: High Risk.");

    a.assess(
        AssessmentInput::new(Some(report()), vec![photo("yard.jpg")]),
        &rules,
        &EventLog::new(),
    )
    .await
    .unwrap();

    let prompt = client.text_calls()[0].content.text();
    assert!(prompt.contains("=== POOL RULES ===\n- Unfenced pool: High Risk."));
    assert!(!prompt.contains("=== ROOFING RULES ==="));
}

// ── Ordering and concurrency ─────────────────────────────────────────────────

#[tokio::test]
async fn evidence_keeps_upload_order_when_calls_finish_out_of_order() {
    let client = Arc::new(
        ScriptedClient::new("Overall Risk Level: Medium Risk")
            .image("A.jpg", Scripted::ok("Description of A.").after(80))
            .image(
                "B.jpg",
                Scripted::err(InferenceError::Api {
                    status: 500,
                    body: "upstream".into(),
                })
                .after(10),
            )
            .image("C.jpg", Scripted::ok("Description of C.")),
    );
    let config = AssessmentConfig::builder().concurrency(3).build().unwrap();
    let a = Assessor::new(client.clone(), config)
        .with_extractor(Arc::new(CannedExtractor::text("Report.")));
    let log = EventLog::new();

    let out = a
        .assess(
            AssessmentInput::new(
                Some(report()),
                vec![photo("A.jpg"), photo("B.jpg"), photo("C.jpg")],
            ),
            &RuleText::default(),
            &log,
        )
        .await
        .unwrap();

    assert_eq!(image_names(&out.evidence), vec!["A.jpg", "C.jpg"]);
    assert_eq!(out.item_errors.len(), 1);
    assert!(matches!(
        &out.item_errors[0],
        ItemError::ImageInference { name, .. } if name == "B.jpg"
    ));

    let prompt = client.text_calls()[0].content.text();
    let a_at = prompt.find("--- IMAGE ANALYSIS: A.jpg ---").unwrap();
    let c_at = prompt.find("--- IMAGE ANALYSIS: C.jpg ---").unwrap();
    assert!(a_at < c_at);
    assert!(!prompt.contains("B.jpg"));

    // C finished before A, and the run still reached Done.
    let finished: Vec<String> = log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AssessmentEvent::ImageAnalyzed { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec!["C.jpg", "A.jpg"]);
    assert_eq!(log.phases().last(), Some(&AssessmentPhase::Done));

    // Per-call times are summed, failed calls included.
    assert!(out.stats.image_call_duration_ms >= 90);
}

// ── Per-item failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn oversized_image_is_never_sent() {
    let big = ImageAsset::new("huge.jpg", vec![0u8; 4 * 1024 * 1024 + 1]);
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Low Risk"));
    let a = assessor(client.clone(), CannedExtractor::text("Report."));
    let log = EventLog::new();

    let out = a
        .assess(
            AssessmentInput::new(Some(report()), vec![photo("small.jpg"), big]),
            &RuleText::default(),
            &log,
        )
        .await
        .unwrap();

    assert_eq!(client.image_calls(), vec!["small.jpg"]);
    assert_eq!(image_names(&out.evidence), vec!["small.jpg"]);
    assert!(!out.synthesis_prompt.contains("huge.jpg"));
    assert_eq!(out.stats.rejected_images, 1);
    assert!(matches!(
        &out.item_errors[0],
        ItemError::AssetTooLarge { name, .. } if name == "huge.jpg"
    ));
    assert_eq!(log.count(Severity::Warning), 1);
}

#[tokio::test]
async fn image_at_exact_limit_is_sent() {
    let exact = ImageAsset::new("exact.jpg", vec![0u8; 4 * 1024 * 1024]);
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Low Risk"));
    let a = assessor(client.clone(), CannedExtractor::text("Report."));

    let out = a
        .assess(
            AssessmentInput::new(Some(report()), vec![exact]),
            &RuleText::default(),
            &EventLog::new(),
        )
        .await
        .unwrap();

    assert_eq!(client.image_calls(), vec!["exact.jpg"]);
    assert_eq!(out.stats.rejected_images, 0);
}

#[tokio::test]
async fn extraction_failure_is_not_fatal() {
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Medium Risk"));
    let a = assessor(
        client.clone(),
        CannedExtractor(Err(ExtractionError::Corrupt {
            name: "appraisal.pdf".into(),
            detail: "bad xref".into(),
        })),
    );
    let log = EventLog::new();

    let out = a
        .assess(
            AssessmentInput::new(Some(report()), vec![photo("roof.jpg")]),
            &RuleText::default(),
            &log,
        )
        .await
        .unwrap();

    assert!(!out.stats.report_included);
    assert!(!out.synthesis_prompt.contains("APPRAISAL REPORT SUMMARY"));
    assert_eq!(image_names(&out.evidence), vec!["roof.jpg"]);
    assert!(matches!(out.item_errors[0], ItemError::Extraction(_)));
    assert_eq!(log.count(Severity::Error), 1);
}

#[tokio::test]
async fn empty_report_text_adds_no_evidence() {
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Low Risk"));
    let a = assessor(client, CannedExtractor::text("  \n "));
    let log = EventLog::new();

    let out = a
        .assess(
            AssessmentInput::new(Some(report()), vec![photo("roof.jpg")]),
            &RuleText::default(),
            &log,
        )
        .await
        .unwrap();

    assert_eq!(out.evidence.len(), 1);
    assert!(log.events().contains(&AssessmentEvent::ReportEmpty));
}

#[tokio::test]
async fn synthesis_runs_even_with_no_evidence() {
    let client = Arc::new(
        ScriptedClient::new("Overall Risk Level: Unacceptable Risk")
            .image("roof.jpg", Scripted::err(InferenceError::EmptyResponse)),
    );
    let a = assessor(
        client.clone(),
        CannedExtractor(Err(ExtractionError::PasswordRequired {
            name: "appraisal.pdf".into(),
        })),
    );
    let log = EventLog::new();

    let out = a
        .assess(
            AssessmentInput::new(Some(report()), vec![photo("roof.jpg")]),
            &RuleText::default(),
            &log,
        )
        .await
        .unwrap();

    assert!(out.evidence.is_empty());
    assert_eq!(client.text_calls().len(), 1);
    assert!(log.events().contains(&AssessmentEvent::NoEvidence));
    assert_eq!(out.risk_level, Some(RiskLevel::Unacceptable));
}

// ── Fatal synthesis failure ──────────────────────────────────────────────────

#[tokio::test]
async fn auth_failure_everywhere_ends_in_failed() {
    let auth = InferenceError::Auth {
        status: 401,
        detail: "invalid api key".into(),
    };
    let client = Arc::new(ScriptedClient::failing(auth.clone()));
    let a = assessor(client.clone(), CannedExtractor::text("Report."));
    let log = EventLog::new();

    let err = a
        .assess(
            AssessmentInput::new(Some(report()), vec![photo("a.jpg"), photo("b.jpg")]),
            &RuleText::default(),
            &log,
        )
        .await
        .unwrap_err();

    match err {
        UnderwriteError::SynthesisFailed { source } => assert_eq!(source, auth),
        other => panic!("expected SynthesisFailed, got {other:?}"),
    }
    // Both image calls were still attempted, then synthesis.
    assert_eq!(client.call_count(), 3);
    assert_eq!(client.text_calls().len(), 1);

    let item_failures = log
        .events()
        .into_iter()
        .filter(|e| matches!(e, AssessmentEvent::ItemFailed(ItemError::ImageInference { .. })))
        .count();
    assert_eq!(item_failures, 2);
    assert_eq!(
        log.phases(),
        vec![
            AssessmentPhase::ExtractingReport,
            AssessmentPhase::AnalyzingImages,
            AssessmentPhase::Synthesizing,
            AssessmentPhase::Failed,
        ]
    );
}

// ── Report truncation ────────────────────────────────────────────────────────

#[tokio::test]
async fn long_report_is_cut_with_marker() {
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Low Risk"));
    let a = assessor(client, CannedExtractor::text("x".repeat(2500)));

    let out = a
        .assess(
            AssessmentInput::new(Some(report()), vec![photo("roof.jpg")]),
            &RuleText::default(),
            &EventLog::new(),
        )
        .await
        .unwrap();

    let body = &out.evidence[0].body;
    assert!(body.ends_with(TRUNCATION_MARKER));
    assert_eq!(body.chars().count(), 2000 + TRUNCATION_MARKER.len());
}

#[tokio::test]
async fn short_report_is_kept_whole() {
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Low Risk"));
    let text = "y".repeat(2000);
    let a = assessor(client, CannedExtractor::text(text.clone()));

    let out = a
        .assess(
            AssessmentInput::new(Some(report()), vec![photo("roof.jpg")]),
            &RuleText::default(),
            &EventLog::new(),
        )
        .await
        .unwrap();

    assert_eq!(out.evidence[0].body, text);
}

// ── Determinism ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_inputs_give_identical_prompts() {
    let mut prompts = Vec::new();
    for _ in 0..2 {
        let client = Arc::new(
            ScriptedClient::new("Overall Risk Level: Low Risk")
                .image("a.jpg", Scripted::ok("Clean gutters."))
                .image("b.jpg", Scripted::ok("New panel.")),
        );
        let a = assessor(client.clone(), CannedExtractor::text("Built 2015."));
        a.assess(
            AssessmentInput::new(Some(report()), vec![photo("a.jpg"), photo("b.jpg")]),
            &RuleText::default(),
            &EventLog::new(),
        )
        .await
        .unwrap();
        prompts.push(client.text_calls()[0].content.text());
        // Image requests carry the same fixed inspection prompt every time.
        for req in client.requests().iter().filter(|r| r.content.images().next().is_some()) {
            assert_eq!(req.max_tokens, 512);
        }
    }
    assert_eq!(prompts[0], prompts[1]);
}

// ── Observers and sync entry points ──────────────────────────────────────────

#[tokio::test]
async fn channel_observer_receives_every_event() {
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Low Risk"));
    let a = assessor(client, CannedExtractor::text("Report."));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    a.assess(
        AssessmentInput::new(Some(report()), vec![photo("roof.jpg")]),
        &RuleText::default(),
        &tx,
    )
    .await
    .unwrap();
    drop(tx);

    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }
    assert_eq!(
        last,
        Some(AssessmentEvent::PhaseChanged {
            from: AssessmentPhase::Synthesizing,
            to: AssessmentPhase::Done,
        })
    );
}

#[test]
fn assess_sync_runs_outside_a_runtime() {
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Low Risk"));
    let a = assessor(client, CannedExtractor::text("Report."));

    let out = a
        .assess_sync(
            AssessmentInput::new(Some(report()), vec![photo("roof.jpg")]),
            &RuleText::default(),
            &EventLog::new(),
        )
        .unwrap();
    assert_eq!(out.risk_level, Some(RiskLevel::Low));
}

#[test]
fn block_on_drives_assess() {
    let client = Arc::new(ScriptedClient::new("Overall Risk Level: High Risk"));
    let a = assessor(client, CannedExtractor::text("Report."));

    let out = tokio_test::block_on(a.assess(
        AssessmentInput::new(Some(report()), vec![photo("roof.jpg")]),
        &RuleText::default(),
        &EventLog::new(),
    ))
    .unwrap();
    assert_eq!(out.verdict, "Overall Risk Level: High Risk");
}

#[tokio::test]
async fn assess_files_reads_inputs_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("appraisal.pdf");
    let image_path = dir.path().join("roof.jpg");
    std::fs::write(&report_path, b"%PDF-1.4\n").unwrap();
    std::fs::write(&image_path, b"not really a jpeg").unwrap();

    let client = Arc::new(ScriptedClient::new("Overall Risk Level: Low Risk"));
    let a = assessor(client.clone(), CannedExtractor::text("Report."));

    let out = a
        .assess_files(
            Some(&report_path),
            &[&image_path],
            &RuleText::default(),
            &EventLog::new(),
        )
        .await
        .unwrap();

    assert_eq!(client.image_calls(), vec!["roof.jpg"]);
    assert_eq!(out.stats.total_images, 1);
}

#[tokio::test]
async fn assess_files_missing_file_is_a_read_error() {
    let client = Arc::new(ScriptedClient::new("unused"));
    let a = assessor(client.clone(), CannedExtractor::text("Report."));

    let err = a
        .assess_files(
            Some("/nonexistent/appraisal.pdf"),
            &["/nonexistent/roof.jpg"],
            &RuleText::default(),
            &EventLog::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UnderwriteError::FileRead { .. }));
    assert_eq!(client.call_count(), 0);
}
