//! Light editorial polish of student-facing documents.
//!
//! Every rewrite goes through [`crate::safety::check`]; a rejected rewrite
//! leaves the file untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::curriculum::Chapter;
use crate::document::DocumentKind;
use crate::llm::GenerationCaller;
use crate::safety::{self, RejectReason};
use crate::store::ChapterStore;

use super::PhaseError;

pub const REPORT_FILE: &str = "polish-format-report.json";

/// Documents polished, in order, with the size above which they are left
/// alone.
pub const TARGETS: [(DocumentKind, Option<usize>); 6] = [
    (DocumentKind::Slides, Some(3_500)),
    (DocumentKind::BookChapter, Some(15_000)),
    (DocumentKind::Exercises, None),
    (DocumentKind::Qa, None),
    (DocumentKind::Quiz, None),
    (DocumentKind::Topics, None),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PolishStatus {
    Polished,
    SkippedAlreadyGood,
    Rejected { reason: RejectReason },
    Missing,
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolishEntry {
    pub document: DocumentKind,
    pub original_length: usize,
    pub polished_length: usize,
    #[serde(flatten)]
    pub status: PolishStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolishReport {
    pub chapter: u32,
    pub polished: usize,
    pub entries: Vec<PolishEntry>,
    pub timestamp: DateTime<Utc>,
}

fn polish_prompt(kind: DocumentKind, chapter: &Chapter, content: &str) -> String {
    format!(
        "You are a professional technical editor. Apply a final, minimal polish to this {}.\n\n\
         Return ONLY the polished content. Do not add preambles, explanations or questions; \
         start immediately with the first line of the document.\n\n\
         # Content to Polish\n\n{content}\n\n\
         # Chapter\n\nChapter {}: {}\n\n\
         # Tasks\n\n\
         - Fix heading hierarchy and broken markdown.\n\
         - Give every code block a language tag.\n\
         - Make list formatting consistent.\n\
         - Fix obvious typos and terminology drift.\n\n\
         Do NOT rewrite, remove or truncate sections, and do NOT change technical content.",
        kind.title(),
        chapter.number,
        chapter.title
    )
}

/// Polish [`TARGETS`] and write [`REPORT_FILE`].
pub async fn run(
    caller: &GenerationCaller,
    store: &ChapterStore,
    chapter: &Chapter,
) -> Result<PolishReport, PhaseError> {
    let mut report = PolishReport {
        chapter: chapter.number,
        polished: 0,
        entries: Vec::new(),
        timestamp: Utc::now(),
    };

    for (kind, skip_above) in TARGETS {
        let content = match store.read_document(chapter.number, kind).await {
            Ok(c) => c,
            Err(e) if e.is_not_found() => {
                report.entries.push(PolishEntry {
                    document: kind,
                    original_length: 0,
                    polished_length: 0,
                    status: PolishStatus::Missing,
                });
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let original_length = content.len();

        if skip_above.is_some_and(|limit| original_length > limit) {
            tracing::info!(chapter = chapter.number, document = %kind, bytes = original_length, "already substantial, skipping polish");
            report.entries.push(PolishEntry {
                document: kind,
                original_length,
                polished_length: original_length,
                status: PolishStatus::SkippedAlreadyGood,
            });
            continue;
        }

        let polished = match caller
            .call(&polish_prompt(kind, chapter, &content), 8000, 0.3, None)
            .await
        {
            Ok(text) => text,
            Err(e) if e.is_budget_exceeded() => {
                store
                    .write_chapter_json(chapter.number, REPORT_FILE, &report)
                    .await?;
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!(chapter = chapter.number, document = %kind, error = %e, "polish failed");
                report.entries.push(PolishEntry {
                    document: kind,
                    original_length,
                    polished_length: original_length,
                    status: PolishStatus::Error {
                        error: e.to_string(),
                    },
                });
                continue;
            }
        };

        let status = match safety::check(&content, &polished, &polished) {
            Ok(()) => {
                store
                    .write_document(chapter.number, kind, &polished)
                    .await?;
                report.polished += 1;
                PolishStatus::Polished
            }
            Err(reason) => {
                tracing::warn!(chapter = chapter.number, document = %kind, %reason, "polish rejected, keeping original");
                PolishStatus::Rejected { reason }
            }
        };
        let polished_length = match status {
            PolishStatus::Polished => polished.len(),
            _ => original_length,
        };
        report.entries.push(PolishEntry {
            document: kind,
            original_length,
            polished_length,
            status,
        });
    }

    store
        .write_chapter_json(chapter.number, REPORT_FILE, &report)
        .await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_slides_and_book_have_skip_thresholds() {
        let with_limits: Vec<_> = TARGETS
            .iter()
            .filter(|(_, l)| l.is_some())
            .map(|(k, _)| *k)
            .collect();
        assert_eq!(
            with_limits,
            vec![DocumentKind::Slides, DocumentKind::BookChapter]
        );
        assert!(!TARGETS.iter().any(|(k, _)| *k == DocumentKind::InstructorKeys));
    }

    #[test]
    fn status_serializes_with_tag() {
        let entry = PolishEntry {
            document: DocumentKind::Quiz,
            original_length: 10,
            polished_length: 10,
            status: PolishStatus::SkippedAlreadyGood,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "skipped_already_good");
        assert_eq!(json["document"], "quiz");
    }
}
