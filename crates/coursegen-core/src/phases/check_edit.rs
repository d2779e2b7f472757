//! Review pass: one call that critiques every student-facing document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::curriculum::Chapter;
use crate::document::DocumentKind;
use crate::llm::GenerationCaller;
use crate::store::ChapterStore;
use crate::text::head_chars;

use super::PhaseError;

pub const REPORT_FILE: &str = "check-edit-report.json";

/// Characters of each document included in the review prompt.
pub const EXCERPT_CHARS: usize = 2000;

/// Documents reviewed; instructor keys are excluded.
pub const REVIEWED: [DocumentKind; 6] = [
    DocumentKind::Slides,
    DocumentKind::BookChapter,
    DocumentKind::Exercises,
    DocumentKind::Qa,
    DocumentKind::Quiz,
    DocumentKind::Topics,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewIssue {
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completeness {
    #[serde(default)]
    pub objectives_covered: Vec<String>,
    #[serde(default)]
    pub objectives_missing: Vec<String>,
}

/// Structured reply of the review call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default)]
    pub overall_quality: String,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub completeness: Completeness,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEditReport {
    pub chapter: u32,
    pub components_reviewed: usize,
    /// Missing documents followed by the reviewer's issues.
    pub issues: Vec<ReviewIssue>,
    pub review: Option<Review>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Parse the outermost JSON object embedded in `reply`.
pub fn parse_review(reply: &str) -> Result<Review, String> {
    let start = reply.find('{').ok_or("no JSON object in review reply")?;
    let end = reply.rfind('}').ok_or("no JSON object in review reply")?;
    if end < start {
        return Err("no JSON object in review reply".to_string());
    }
    serde_json::from_str(&reply[start..=end]).map_err(|e| format!("invalid review JSON: {e}"))
}

fn review_prompt(chapter: &Chapter, excerpts: &[(DocumentKind, String)]) -> String {
    let objectives: String = chapter
        .learning_objectives
        .iter()
        .map(|o| format!("- {o}\n"))
        .collect();
    let components: String = excerpts
        .iter()
        .map(|(kind, text)| format!("## {}\n{}...\n\n", kind.file_name(), text))
        .collect();
    format!(
        "You are a technical curriculum quality reviewer. Review the generated content for \
         Chapter {}: {}.\n\n\
         Check accuracy, completeness against the learning objectives, consistency of \
         terminology across components, clarity, and difficulty progression.\n\n\
         # Learning Objectives\n\n{objectives}\n\
         # Components\n\n{components}\
         # Output Format\n\n\
         Reply with a JSON object only:\n\
         {{\"overallQuality\": \"excellent|good|needsWork\", \"issues\": [{{\"component\": \
         \"file\", \"severity\": \"high|medium|low\", \"issue\": \"...\", \"location\": \"...\", \
         \"suggestedFix\": \"...\"}}], \"completeness\": {{\"objectivesCovered\": [], \
         \"objectivesMissing\": []}}, \"recommendations\": []}}\n\n\
         Report significant issues only.",
        chapter.number, chapter.title
    )
}

/// Run the review and write [`REPORT_FILE`].
pub async fn run(
    caller: &GenerationCaller,
    store: &ChapterStore,
    chapter: &Chapter,
) -> Result<CheckEditReport, PhaseError> {
    let mut issues = Vec::new();
    let mut excerpts = Vec::new();
    for kind in REVIEWED {
        match store.read_document(chapter.number, kind).await {
            Ok(text) => excerpts.push((kind, head_chars(&text, EXCERPT_CHARS).to_string())),
            Err(e) if e.is_not_found() => {
                tracing::warn!(chapter = chapter.number, document = %kind, "document missing from review");
                issues.push(ReviewIssue {
                    component: kind.file_name().to_string(),
                    severity: "high".to_string(),
                    issue: "File not found".to_string(),
                    ..ReviewIssue::default()
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    let mut report = CheckEditReport {
        chapter: chapter.number,
        components_reviewed: excerpts.len(),
        issues,
        review: None,
        error: None,
        timestamp: Utc::now(),
    };

    let reply = match caller
        .call(&review_prompt(chapter, &excerpts), 4000, 0.3, None)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            report.error = Some(e.to_string());
            store
                .write_chapter_json(chapter.number, REPORT_FILE, &report)
                .await?;
            return Err(e.into());
        }
    };

    match parse_review(&reply) {
        Ok(review) => {
            for issue in &review.issues {
                tracing::info!(
                    chapter = chapter.number,
                    component = %issue.component,
                    severity = %issue.severity,
                    "review issue: {}",
                    issue.issue
                );
            }
            report.issues.extend(review.issues.iter().cloned());
            report.review = Some(review);
        }
        Err(e) => {
            tracing::warn!(chapter = chapter.number, error = %e, "could not parse review");
            report.error = Some(e);
        }
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
    fn parses_embedded_json() {
        let reply = "Here is my review:\n```json\n{\"overallQuality\": \"good\", \"issues\": [{\"component\": \"quiz.txt\", \"severity\": \"low\", \"issue\": \"typo\", \"suggestedFix\": \"fix it\"}], \"recommendations\": [\"more examples\"]}\n```";
        let review = parse_review(reply).unwrap();
        assert_eq!(review.overall_quality, "good");
        assert_eq!(review.issues.len(), 1);
        assert_eq!(review.issues[0].suggested_fix.as_deref(), Some("fix it"));
        assert_eq!(review.recommendations, vec!["more examples"]);
        assert!(review.completeness.objectives_missing.is_empty());
    }

    #[test]
    fn rejects_reply_without_json() {
        assert!(parse_review("looks fine to me").is_err());
        assert!(parse_review("} backwards {").is_err());
        assert!(parse_review("{not json}").is_err());
    }

    #[test]
    fn prompt_lists_objectives_and_components() {
        let chapter = Chapter {
            number: 2,
            title: "Routing".into(),
            part: String::new(),
            learning_objectives: vec!["Define routes".into()],
            topics: vec![],
        };
        let prompt = review_prompt(&chapter, &[(DocumentKind::Quiz, "Q1".into())]);
        assert!(prompt.contains("- Define routes"));
        assert!(prompt.contains("## quiz.txt\nQ1..."));
        assert!(prompt.contains("\"overallQuality\""));
    }
}
