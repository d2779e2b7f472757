//! Offline structural validation of a generated chapter.
//!
//! Each expected file scores up to 10 points for presence and size, and a
//! further 10 for content checks when it exists. Pass mark is 70 %.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::curriculum::Chapter;
use crate::document::DocumentKind;
use crate::store::{ChapterStore, StoreError};

pub const REPORT_FILE: &str = "validation-report.json";

pub const PASS_PERCENT: u32 = 70;

/// Validated documents with their expected size range in bytes.
pub const EXPECTED: [(DocumentKind, usize, usize); 6] = [
    (DocumentKind::Slides, 10_000, 100_000),
    (DocumentKind::BookChapter, 20_000, 150_000),
    (DocumentKind::Exercises, 10_000, 80_000),
    (DocumentKind::Qa, 5_000, 50_000),
    (DocumentKind::Quiz, 5_000, 40_000),
    (DocumentKind::Topics, 2_000, 15_000),
];

const BOOK_REQUIRED_SECTIONS: [&str; 4] =
    ["Introduction", "Learning Objectives", "Summary", "What's Next"];

static SLIDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,3}\s*Slide\s+\d+").expect("valid regex"));
static QUIZ_QUESTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{2,4}\s*Question\s+\d+").expect("valid regex"));
static QA_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{2,4}\s*Q\d+:").expect("valid regex"));
static EXERCISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#{1,3}\s*(?:Hands-On\s+)?Exercise\s+\d+:").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub file: String,
    pub issue: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub exists: bool,
    pub size: usize,
    pub lines: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    F,
}

impl Grade {
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            90.. => Grade::A,
            80..=89 => Grade::B,
            70..=79 => Grade::C,
            _ => Grade::F,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::F => "F",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub chapter: u32,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub files: BTreeMap<String, FileStats>,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub score: u32,
    pub max_score: u32,
    pub percentage: u32,
    pub grade: Grade,
    pub passed: bool,
}

impl ValidationReport {
    /// `"105/120 (88%)"`.
    pub fn overall(&self) -> String {
        format!("{}/{} ({}%)", self.score, self.max_score, self.percentage)
    }
}

struct Checker<'a> {
    file: &'static str,
    warnings: &'a mut Vec<ValidationIssue>,
    score: i32,
}

impl Checker<'_> {
    fn warn(&mut self, issue: String, severity: Severity, penalty: i32) {
        self.warnings.push(ValidationIssue {
            file: self.file.to_string(),
            issue,
            severity,
        });
        self.score -= penalty;
    }

    fn require(&mut self, content: &str, needle: &str, issue: &str, severity: Severity, penalty: i32) {
        if !content.contains(needle) {
            self.warn(issue.to_string(), severity, penalty);
        }
    }
}

/// Validate documents already in memory; `None` marks a missing file.
pub fn validate_documents(
    chapter: &Chapter,
    documents: &[(DocumentKind, Option<String>)],
) -> ValidationReport {
    let mut files = BTreeMap::new();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut score: u32 = 0;
    let mut max_score: u32 = 0;

    for (kind, min, max) in EXPECTED {
        let file = kind.file_name();
        max_score += 10;
        let Some(content) = documents
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, c)| c.as_deref())
        else {
            errors.push(ValidationIssue {
                file: file.to_string(),
                issue: "File not found".to_string(),
                severity: Severity::High,
            });
            files.insert(
                file.to_string(),
                FileStats {
                    exists: false,
                    size: 0,
                    lines: 0,
                    word_count: 0,
                },
            );
            continue;
        };

        let size = content.len();
        files.insert(
            file.to_string(),
            FileStats {
                exists: true,
                size,
                lines: content.split('\n').count(),
                word_count: content.split_whitespace().count(),
            },
        );

        if size < min {
            warnings.push(ValidationIssue {
                file: file.to_string(),
                issue: format!("File size {size} is below minimum {min}"),
                severity: Severity::Medium,
            });
            score += 5;
        } else if size > max {
            warnings.push(ValidationIssue {
                file: file.to_string(),
                issue: format!("File size {size} exceeds maximum {max}"),
                severity: Severity::Low,
            });
            score += 8;
        } else {
            score += 10;
        }

        max_score += 10;
        let mut checker = Checker {
            file,
            warnings: &mut warnings,
            score: 10,
        };
        check_content(kind, content, chapter, &mut checker);
        score += checker.score.max(0) as u32;
    }

    let percentage = if max_score == 0 {
        0
    } else {
        (f64::from(score) * 100.0 / f64::from(max_score)).round() as u32
    };
    ValidationReport {
        chapter: chapter.number,
        title: chapter.title.clone(),
        timestamp: Utc::now(),
        files,
        errors,
        warnings,
        score,
        max_score,
        percentage,
        grade: Grade::from_percentage(percentage),
        passed: percentage >= PASS_PERCENT,
    }
}

fn check_content(kind: DocumentKind, content: &str, chapter: &Chapter, c: &mut Checker<'_>) {
    match kind {
        DocumentKind::Slides => {
            let slides = SLIDE_RE.find_iter(content).count();
            if slides < 30 {
                c.warn(format!("Only {slides} slides found, expected 30-50"), Severity::Medium, 3);
            } else if slides > 50 {
                c.warn(format!("{slides} slides found, expected 30-50"), Severity::Low, 2);
            }
            c.require(content, "Speaker Notes", "No speaker notes found", Severity::Medium, 3);
        }
        DocumentKind::BookChapter => {
            let words = content.split_whitespace().count();
            if words < 5000 {
                c.warn(format!("Only {words} words, expected 5,000-8,000"), Severity::High, 5);
            } else if words > 8000 {
                c.warn(format!("{words} words, expected 5,000-8,000"), Severity::Low, 2);
            }
            for section in BOOK_REQUIRED_SECTIONS {
                c.require(
                    content,
                    section,
                    &format!("Missing required section: {section}"),
                    Severity::High,
                    3,
                );
            }
            c.require(content, "```", "No code blocks found", Severity::High, 3);
        }
        DocumentKind::Quiz => {
            let questions = QUIZ_QUESTION_RE.find_iter(content).count();
            if questions < 10 {
                c.warn(format!("Only {questions} questions, expected 10-15"), Severity::Medium, 3);
            }
            c.require(content, "Answer Key", "No answer key found", Severity::High, 4);
            c.require(content, "Explanation:", "No explanations found", Severity::High, 4);
        }
        DocumentKind::Qa => {
            let pairs = QA_PAIR_RE.find_iter(content).count();
            if pairs < 10 {
                c.warn(format!("Only {pairs} Q&A pairs, expected 10-15"), Severity::Medium, 3);
            }
        }
        DocumentKind::Exercises => {
            let exercises = EXERCISE_RE.find_iter(content).count();
            if exercises < 3 {
                c.warn(format!("Only {exercises} exercises, expected 3-5"), Severity::Medium, 3);
            }
            c.require(content, "Success Criteria", "No success criteria found", Severity::Medium, 3);
            c.require(content, "Troubleshooting", "No troubleshooting section found", Severity::Low, 2);
        }
        DocumentKind::Topics | DocumentKind::InstructorKeys => {}
    }

    for objective in uncovered_objectives(chapter, content) {
        c.warn(
            format!("Learning objective may not be covered: \"{objective}\""),
            Severity::Low,
            0,
        );
    }
}

/// Objectives none of whose longer words (over four characters) appear in
/// `content`.
pub fn uncovered_objectives<'a>(chapter: &'a Chapter, content: &str) -> Vec<&'a str> {
    let haystack = content.to_lowercase();
    chapter
        .learning_objectives
        .iter()
        .filter(|objective| {
            !objective
                .to_lowercase()
                .split(' ')
                .filter(|w| w.chars().count() > 4)
                .any(|w| haystack.contains(w))
        })
        .map(String::as_str)
        .collect()
}

/// Read the chapter's documents, validate them and write [`REPORT_FILE`].
pub async fn validate_chapter(
    store: &ChapterStore,
    chapter: &Chapter,
) -> Result<ValidationReport, StoreError> {
    let mut documents = Vec::with_capacity(EXPECTED.len());
    for (kind, _, _) in EXPECTED {
        let content = match store.read_document(chapter.number, kind).await {
            Ok(c) => Some(c),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        documents.push((kind, content));
    }
    let report = validate_documents(chapter, &documents);
    tracing::info!(
        chapter = chapter.number,
        score = %report.overall(),
        grade = %report.grade,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validation complete"
    );
    store
        .write_chapter_json(chapter.number, REPORT_FILE, &report)
        .await?;
    Ok(report)
}
