//! Revise-and-extend: analyse a fixed subset of documents, then repair each
//! finding in priority order. Not a retry: only the defective parts are
//! touched and rejected repairs leave the file as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::curriculum::Chapter;
use crate::document::DocumentKind;
use crate::enhance::{EnhancementApplier, Remediation, RemediationOutcome};
use crate::quality::{self, Finding, FindingKind, QualityReport, Strategy};
use crate::store::ChapterStore;

use super::PhaseError;

pub const REPORT_FILE: &str = "revise-extend-report.json";

/// Documents analysed, with their minimum expected size.
pub const TARGETS: [(DocumentKind, Option<usize>); 5] = [
    (DocumentKind::BookChapter, None),
    (DocumentKind::Exercises, Some(10_000)),
    (DocumentKind::InstructorKeys, Some(6_000)),
    (DocumentKind::Qa, None),
    (DocumentKind::Quiz, None),
];

pub fn min_size(kind: DocumentKind) -> Option<usize> {
    TARGETS
        .iter()
        .find(|(k, _)| *k == kind)
        .and_then(|(_, min)| *min)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationRecord {
    pub finding: FindingKind,
    pub strategy: Strategy,
    #[serde(flatten)]
    pub outcome: RemediationOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRevision {
    pub document: DocumentKind,
    pub score_before: u32,
    pub score_after: u32,
    pub bytes_before: usize,
    pub bytes_after: usize,
    pub findings: Vec<Finding>,
    pub remediations: Vec<RemediationRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviseReport {
    pub chapter: u32,
    pub analyzed: Vec<QualityReport>,
    /// Documents that were not present and were skipped.
    pub skipped: Vec<DocumentKind>,
    pub revisions: Vec<DocumentRevision>,
    /// Set when the run stopped early on the budget ceiling.
    pub aborted: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ReviseReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &RemediationOutcome> {
        self.revisions
            .iter()
            .flat_map(|r| r.remediations.iter().map(|m| &m.outcome))
    }
}

/// Analyse [`TARGETS`], apply remediations, write [`REPORT_FILE`].
pub async fn run(
    applier: &EnhancementApplier,
    store: &ChapterStore,
    chapter: &Chapter,
) -> Result<ReviseReport, PhaseError> {
    let mut report = ReviseReport {
        chapter: chapter.number,
        analyzed: Vec::new(),
        skipped: Vec::new(),
        revisions: Vec::new(),
        aborted: None,
        timestamp: Utc::now(),
    };

    let mut queue: Vec<(DocumentKind, String, QualityReport)> = Vec::new();
    for (kind, min) in TARGETS {
        let content = match store.read_document(chapter.number, kind).await {
            Ok(c) => c,
            Err(e) if e.is_not_found() => {
                tracing::info!(chapter = chapter.number, document = %kind, "not present, skipping analysis");
                report.skipped.push(kind);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let analysis = quality::analyze(kind, &content, min);
        tracing::info!(
            chapter = chapter.number,
            document = %kind,
            score = analysis.score,
            findings = analysis.findings.len(),
            "quality analysis"
        );
        if analysis.needs_enhancement {
            queue.push((kind, content, analysis.clone()));
        }
        report.analyzed.push(analysis);
    }

    for (kind, mut content, analysis) in queue {
        let bytes_before = content.len();
        let mut revision = DocumentRevision {
            document: kind,
            score_before: analysis.score,
            score_after: analysis.score,
            bytes_before,
            bytes_after: bytes_before,
            findings: analysis.findings.clone(),
            remediations: Vec::new(),
        };

        for finding in analysis.by_priority() {
            let result = applier.apply(&content, kind, &finding, chapter).await;
            let outcome = RemediationOutcome::from_result(&result);
            revision.remediations.push(RemediationRecord {
                finding: finding.kind,
                strategy: finding.strategy,
                outcome,
            });
            match result {
                Ok(Remediation::Repaired { content: repaired, .. }) => {
                    store
                        .write_document(chapter.number, kind, &repaired)
                        .await?;
                    content = repaired;
                }
                Ok(Remediation::Rejected(_) | Remediation::NoneNeeded(_)) => {}
                Err(e) if e.is_budget_exceeded() => {
                    report.aborted = Some(e.to_string());
                    finish_revision(&mut revision, kind, &content);
                    report.revisions.push(revision);
                    store
                        .write_chapter_json(chapter.number, REPORT_FILE, &report)
                        .await?;
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::warn!(
                        chapter = chapter.number,
                        document = %kind,
                        finding = %finding.kind,
                        error = %e,
                        "enhancement failed, continuing"
                    );
                }
            }
        }

        finish_revision(&mut revision, kind, &content);
        report.revisions.push(revision);
    }

    store
        .write_chapter_json(chapter.number, REPORT_FILE, &report)
        .await?;
    Ok(report)
}

fn finish_revision(revision: &mut DocumentRevision, kind: DocumentKind, content: &str) {
    revision.score_after = quality::analyze(kind, content, min_size(kind)).score;
    revision.bytes_after = content.len();
}
