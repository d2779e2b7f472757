//! Quality remediation through the revise and polish phases.

use std::sync::Arc;

use coursegen_core::document::DocumentKind;
use coursegen_core::enhance::{EnhancementApplier, Remediation, RemediationOutcome};
use coursegen_core::phases::polish::{self, PolishStatus};
use coursegen_core::phases::{PhaseError, revise};
use coursegen_core::quality::{self, FindingKind, Strategy};
use coursegen_core::safety::RejectReason;
use coursegen_test_utils::{ScriptedGenerator, caller, sample_curriculum, temp_store};

const ELLIPSIS_DOC: &str = "# Quiz - Chapter 1\n# Intro\n\n## Question 1\n\nWhat does this print?\n\n\
```python\ndef total(items):\n    ...\n```\n\nA) 0\nB) the sum\n";

fn padded(len: usize) -> String {
    "word ".repeat(len / 5 + 1)[..len].to_string()
}

#[tokio::test]
async fn accepted_code_completion_clears_the_finding() {
    let generator = Arc::new(ScriptedGenerator::constant(
        "Completed block:\n\n```python\ndef total(items):\n    return sum(items)\n```\n",
    ));
    let applier = EnhancementApplier::new(caller(generator, 5.0));
    let curriculum = sample_curriculum();
    let chapter = curriculum.chapter(1).unwrap();

    let before = quality::analyze(DocumentKind::Quiz, ELLIPSIS_DOC, None);
    assert!(before.has(FindingKind::CodeEllipsis));
    let finding = &before.findings[0];
    assert_eq!(finding.strategy, Strategy::CodeCompletion);

    let remediation = applier
        .apply(ELLIPSIS_DOC, DocumentKind::Quiz, finding, chapter)
        .await
        .unwrap();
    let Remediation::Repaired { content, .. } = remediation else {
        panic!("expected a repair, got {remediation:?}");
    };
    assert!(content.contains("return sum(items)"));
    assert!(content.ends_with("A) 0\nB) the sum\n"));

    let after = quality::analyze(DocumentKind::Quiz, &content, None);
    assert!(!after.has(FindingKind::CodeEllipsis));
    assert_eq!(after.score, 100);
}

#[tokio::test]
async fn analysis_is_idempotent() {
    let a = quality::analyze(DocumentKind::Exercises, ELLIPSIS_DOC, Some(10_000));
    let b = quality::analyze(DocumentKind::Exercises, ELLIPSIS_DOC, Some(10_000));
    assert_eq!(a, b);
    assert_eq!(a.score, 70);
}

#[tokio::test]
async fn meta_commentary_repair_leaves_file_byte_identical() {
    let (_dir, store) = temp_store();
    store
        .write_document(1, DocumentKind::Quiz, ELLIPSIS_DOC)
        .await
        .unwrap();
    let generator = Arc::new(ScriptedGenerator::constant(
        "I'll provide the completed code below.\n\n```python\ndef total(items):\n    return sum(items)\n```\n",
    ));
    let applier = EnhancementApplier::new(caller(generator, 5.0));
    let curriculum = sample_curriculum();

    let report = revise::run(&applier, &store, curriculum.chapter(1).unwrap())
        .await
        .unwrap();

    let on_disk = std::fs::read(store.document_path(1, DocumentKind::Quiz)).unwrap();
    assert_eq!(on_disk, ELLIPSIS_DOC.as_bytes());
    let outcomes: Vec<_> = report.outcomes().collect();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        outcomes[0],
        RemediationOutcome::Rejected {
            reason: RejectReason::MetaCommentary { .. }
        }
    ));
    assert!(
        store
            .chapter_dir(1)
            .join(revise::REPORT_FILE)
            .exists()
    );
}

#[tokio::test]
async fn revise_extends_undersized_exercises_and_skips_missing_files() {
    let (_dir, store) = temp_store();
    let original = format!("# Hands-On Exercises - Chapter 1\n\n## Exercise 1: Basics\n\n{}\n", padded(3000));
    store
        .write_document(1, DocumentKind::Exercises, &original)
        .await
        .unwrap();
    let generator = Arc::new(ScriptedGenerator::constant(format!(
        "## Exercise 2: Going further\n\n{}\n\n## Success Criteria\n\n- Works\n",
        padded(2000)
    )));
    let generator_ref = generator.clone();
    let applier = EnhancementApplier::new(caller(generator, 5.0));
    let curriculum = sample_curriculum();

    let report = revise::run(&applier, &store, curriculum.chapter(1).unwrap())
        .await
        .unwrap();

    assert_eq!(
        report.skipped,
        vec![
            DocumentKind::BookChapter,
            DocumentKind::InstructorKeys,
            DocumentKind::Qa,
            DocumentKind::Quiz
        ]
    );
    assert_eq!(report.revisions.len(), 1);
    let revision = &report.revisions[0];
    assert_eq!(revision.document, DocumentKind::Exercises);
    assert!(revision.bytes_after > revision.bytes_before);
    assert!(matches!(
        revision.remediations[0].outcome,
        RemediationOutcome::Repaired { .. }
    ));

    let extended = store.read_document(1, DocumentKind::Exercises).await.unwrap();
    assert!(extended.starts_with(&original));
    assert!(extended.contains("\n\n---\n\n## Exercise 2: Going further"));

    let prompt = &generator_ref.requests()[0].prompt;
    assert!(prompt.contains("Success Criteria"), "missing sections are requested");
}

#[tokio::test]
async fn budget_during_revise_aborts_with_report() {
    let (_dir, store) = temp_store();
    store
        .write_document(1, DocumentKind::Quiz, ELLIPSIS_DOC)
        .await
        .unwrap();
    store
        .write_document(1, DocumentKind::Qa, ELLIPSIS_DOC)
        .await
        .unwrap();
    let generator = Arc::new(ScriptedGenerator::constant("```python\nx = 1\n```"));
    let generator_ref = generator.clone();
    let applier = EnhancementApplier::new(caller(generator, 0.0));

    let err = revise::run(&applier, &store, sample_curriculum().chapter(1).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, PhaseError::BudgetExceeded(_)));
    assert_eq!(generator_ref.calls(), 1, "no call after the ceiling is crossed");

    let report: revise::ReviseReport = store
        .read_chapter_json(1, revise::REPORT_FILE)
        .await
        .unwrap();
    assert!(report.aborted.is_some());
    assert_eq!(
        std::fs::read_to_string(store.document_path(1, DocumentKind::Qa)).unwrap(),
        ELLIPSIS_DOC
    );
}

#[tokio::test]
async fn polish_rejects_short_rewrites_and_skips_large_documents() {
    let (_dir, store) = temp_store();
    let quiz = format!("# Quiz\n\n{}\n", padded(2000));
    let slides = format!("# Slides\n\n{}\n", padded(4000));
    store
        .write_document(1, DocumentKind::Quiz, &quiz)
        .await
        .unwrap();
    store
        .write_document(1, DocumentKind::Slides, &slides)
        .await
        .unwrap();
    let generator = Arc::new(ScriptedGenerator::constant("# Quiz\n\nShort."));
    let generator_ref = generator.clone();
    let curriculum = sample_curriculum();

    let report = polish::run(&caller(generator, 5.0), &store, curriculum.chapter(1).unwrap())
        .await
        .unwrap();

    assert_eq!(report.polished, 0);
    assert_eq!(generator_ref.calls(), 1, "only the quiz is sent");
    let status = |kind| {
        report
            .entries
            .iter()
            .find(|e| e.document == kind)
            .map(|e| e.status.clone())
            .unwrap()
    };
    assert_eq!(status(DocumentKind::Slides), PolishStatus::SkippedAlreadyGood);
    assert_eq!(status(DocumentKind::BookChapter), PolishStatus::Missing);
    assert!(matches!(
        status(DocumentKind::Quiz),
        PolishStatus::Rejected {
            reason: RejectReason::TooShort { .. }
        }
    ));
    assert_eq!(store.read_document(1, DocumentKind::Quiz).await.unwrap(), quiz);
}

#[tokio::test]
async fn polish_writes_accepted_rewrite() {
    let (_dir, store) = temp_store();
    let topics = format!("# Topics\n\n{}\n", padded(1000));
    store
        .write_document(1, DocumentKind::Topics, &topics)
        .await
        .unwrap();
    let polished = format!("# Topics\n\n## Themes\n\n{}\n", padded(1000));
    let generator = Arc::new(ScriptedGenerator::constant(polished.clone()));

    let report = polish::run(
        &caller(generator, 5.0),
        &store,
        sample_curriculum().chapter(1).unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(report.polished, 1);
    assert_eq!(
        store.read_document(1, DocumentKind::Topics).await.unwrap(),
        polished
    );
}
