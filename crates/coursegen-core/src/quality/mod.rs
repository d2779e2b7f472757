//! Quality analysis of generated documents.
//!
//! Each detector is a pure function over a text snapshot returning at most
//! one [`Finding`]. [`analyze`] runs them all in a fixed order and derives
//! the 0-100 score. No I/O happens here.

pub mod fences;

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::DocumentKind;

pub use fences::{FencedBlock, scan as scan_fences};

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)//\s*\.\.\.|/\*\s*\.\.\.\s*\*/|\.\.\.\s*implementation").expect("valid regex")
});

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+\S.*$").expect("valid regex"));

static STEP_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*Step\s+\d+:\*\*").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    CodeEllipsis,
    Placeholders,
    Size,
    Truncation,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FindingKind::CodeEllipsis => "code_ellipsis",
            FindingKind::Placeholders => "placeholders",
            FindingKind::Size => "size",
            FindingKind::Truncation => "truncation",
        };
        f.write_str(s)
    }
}

/// Ordered so that sorting ascending puts `High` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn penalty(self) -> u32 {
        match self {
            Priority::High => 20,
            Priority::Medium => 10,
            Priority::Low => 5,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CodeCompletion,
    ContentExtension,
    SectionCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FindingDetail {
    Count { count: usize },
    Size { current: usize, target: usize, deficit: usize },
    Pattern { pattern: String },
}

/// One detected defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub priority: Priority,
    pub strategy: Strategy,
    pub detail: FindingDetail,
    pub message: String,
}

impl Finding {
    pub fn count(&self) -> Option<usize> {
        match self.detail {
            FindingDetail::Count { count } => Some(count),
            _ => None,
        }
    }

    pub fn deficit(&self) -> Option<usize> {
        match self.detail {
            FindingDetail::Size { deficit, .. } => Some(deficit),
            _ => None,
        }
    }
}

/// Findings for one document plus the derived score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub kind: DocumentKind,
    pub size: usize,
    pub findings: Vec<Finding>,
    pub score: u32,
    pub needs_enhancement: bool,
}

impl QualityReport {
    /// Findings sorted high before medium before low; detector order is
    /// kept within a priority.
    pub fn by_priority(&self) -> Vec<Finding> {
        let mut findings = self.findings.clone();
        findings.sort_by_key(|f| f.priority);
        findings
    }

    pub fn has(&self, kind: FindingKind) -> bool {
        self.findings.iter().any(|f| f.kind == kind)
    }
}

/// `max(0, 100 - sum of priority penalties)`.
pub fn score(findings: &[Finding]) -> u32 {
    let penalty: u32 = findings.iter().map(|f| f.priority.penalty()).sum();
    100u32.saturating_sub(penalty)
}

/// Run every detector over `content`.
pub fn analyze(kind: DocumentKind, content: &str, min_size: Option<usize>) -> QualityReport {
    let findings: Vec<Finding> = [
        detect_code_ellipsis(content),
        detect_placeholders(content),
        detect_undersize(content, min_size),
        detect_truncation(content),
    ]
    .into_iter()
    .flatten()
    .collect();

    QualityReport {
        kind,
        size: content.len(),
        score: score(&findings),
        needs_enhancement: !findings.is_empty(),
        findings,
    }
}

/// Fenced regions whose body contains a literal `...`.
pub fn code_ellipsis_blocks(content: &str) -> Vec<FencedBlock> {
    fences::scan(content)
        .into_iter()
        .filter(|b| b.body(content).contains("..."))
        .collect()
}

pub fn detect_code_ellipsis(content: &str) -> Option<Finding> {
    let count = code_ellipsis_blocks(content).len();
    (count > 0).then(|| Finding {
        kind: FindingKind::CodeEllipsis,
        priority: Priority::High,
        strategy: Strategy::CodeCompletion,
        detail: FindingDetail::Count { count },
        message: format!("{count} code block(s) with ellipsis"),
    })
}

pub fn has_placeholder(text: &str) -> bool {
    PLACEHOLDER_RE.is_match(text)
}

pub fn detect_placeholders(content: &str) -> Option<Finding> {
    let count = PLACEHOLDER_RE.find_iter(content).count();
    (count > 0).then(|| Finding {
        kind: FindingKind::Placeholders,
        priority: Priority::High,
        strategy: Strategy::CodeCompletion,
        detail: FindingDetail::Count { count },
        message: format!("{count} implementation placeholder(s)"),
    })
}

pub fn detect_undersize(content: &str, min_size: Option<usize>) -> Option<Finding> {
    let target = min_size?;
    let current = content.len();
    (current < target).then(|| Finding {
        kind: FindingKind::Size,
        priority: Priority::Medium,
        strategy: Strategy::ContentExtension,
        detail: FindingDetail::Size {
            current,
            target,
            deficit: target - current,
        },
        message: format!(
            "only {:.1}KB (expected {:.1}KB+)",
            current as f64 / 1024.0,
            target as f64 / 1024.0
        ),
    })
}

/// Structural cut-off patterns, reported once.
pub fn detect_truncation(content: &str) -> Option<Finding> {
    let pattern = if dangling_final_heading(content) {
        "heading with no body at end of document"
    } else if empty_step(content) {
        "step label with no instructions"
    } else if empty_code_block(content) {
        "empty code block"
    } else {
        return None;
    };
    Some(Finding {
        kind: FindingKind::Truncation,
        priority: Priority::High,
        strategy: Strategy::SectionCompletion,
        detail: FindingDetail::Pattern {
            pattern: pattern.to_string(),
        },
        message: format!("document appears truncated: {pattern}"),
    })
}

fn dangling_final_heading(content: &str) -> bool {
    HEADING_RE
        .find_iter(content)
        .last()
        .is_some_and(|m| content[m.end()..].trim().is_empty())
}

fn empty_step(content: &str) -> bool {
    STEP_LABEL_RE.find_iter(content).any(|m| {
        let rest = content[m.end()..].trim_start();
        rest.is_empty()
            || rest.starts_with('#')
            || STEP_LABEL_RE.find(rest).is_some_and(|n| n.start() == 0)
    })
}

fn empty_code_block(content: &str) -> bool {
    fences::scan(content)
        .iter()
        .any(|b| b.body(content).trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(len: usize) -> String {
        "word ".repeat(len / 5 + 1)[..len].to_string()
    }

    #[test]
    fn fenced_ellipsis_is_one_high_finding() {
        let text = "# Setup\n\nIntro.\n\n```ts\nconst items = [first, ...rest];\n```\n\nDone.\n";
        let report = analyze(DocumentKind::BookChapter, text, None);
        assert_eq!(report.findings.len(), 1);
        let f = &report.findings[0];
        assert_eq!(f.kind, FindingKind::CodeEllipsis);
        assert_eq!(f.priority, Priority::High);
        assert_eq!(f.strategy, Strategy::CodeCompletion);
        assert!(f.count().unwrap() >= 1);
        assert_eq!(report.score, 80);
        assert!(report.needs_enhancement);
    }

    #[test]
    fn undersize_reports_byte_deficit() {
        let text = padded(4000);
        let report = analyze(DocumentKind::Exercises, &text, Some(10_000));
        assert_eq!(report.findings.len(), 1);
        let f = &report.findings[0];
        assert_eq!(f.kind, FindingKind::Size);
        assert_eq!(f.priority, Priority::Medium);
        assert_eq!(f.deficit(), Some(6000));
        assert_eq!(report.score, 90);
    }

    #[test]
    fn clean_document_scores_100() {
        let text = "# Title\n\nBody text.\n\n```rust\nfn main() {}\n```\n\nMore text.\n";
        let report = analyze(DocumentKind::Topics, text, Some(10));
        assert!(report.findings.is_empty());
        assert_eq!(report.score, 100);
        assert!(!report.needs_enhancement);
    }

    #[test]
    fn placeholder_patterns() {
        for text in [
            "code // ... more",
            "/* ... */",
            "... implementation goes here",
            "... Implementation",
        ] {
            assert!(detect_placeholders(text).is_some(), "{text}");
        }
        assert!(detect_placeholders("a...b spread").is_none());
        assert_eq!(
            detect_placeholders("// ...\n// ...").unwrap().count(),
            Some(2)
        );
    }

    #[test]
    fn dangling_heading_is_truncation() {
        assert!(detect_truncation("# A\n\nbody\n\n## Next Section\n  \n").is_some());
        assert!(detect_truncation("# A\n\nbody\n\n## Next Section\ntext").is_none());
    }

    #[test]
    fn empty_step_is_truncation() {
        assert!(detect_truncation("**Step 1:** do it\n**Step 2:**\n\n").is_some());
        assert!(detect_truncation("**Step 1:**\n**Step 2:** do it").is_some());
        assert!(detect_truncation("**Step 1:**\n\n## Next\nbody").is_some());
        assert!(detect_truncation("**Step 1:** a\n**Step 2:** b").is_none());
    }

    #[test]
    fn empty_fence_is_truncation() {
        assert!(detect_truncation("text\n```js\n\n```\nmore").is_some());
        assert!(detect_truncation("text\n```js\n").is_some());
    }

    #[test]
    fn truncation_reported_once_when_patterns_overlap() {
        let text = "**Step 1:**\n```\n```\n## Dangling\n";
        let report = analyze(DocumentKind::Exercises, text, None);
        let truncations = report
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::Truncation)
            .count();
        assert_eq!(truncations, 1);
    }

    #[test]
    fn score_floors_at_zero() {
        let text = "```\n// ... implementation\n```\n**Step 1:**\n";
        let report = analyze(DocumentKind::Exercises, text, Some(100_000));
        // code_ellipsis, placeholders, truncation (high) + size (medium)
        assert_eq!(report.findings.len(), 4);
        assert_eq!(report.score, 30);

        let many: Vec<Finding> = (0..6).map(|_| report.findings[0].clone()).collect();
        assert_eq!(score(&many), 0);
    }

    #[test]
    fn analysis_is_idempotent() {
        let text = "```\nlet x = ...;\n```\n// ... rest\n## End\n";
        let a = analyze(DocumentKind::Quiz, text, Some(500));
        let b = analyze(DocumentKind::Quiz, text, Some(500));
        assert_eq!(a, b);
    }

    #[test]
    fn by_priority_puts_medium_after_high() {
        let text = "## Dangling\n";
        let report = analyze(DocumentKind::Quiz, text, Some(1000));
        let kinds: Vec<_> = report.by_priority().iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FindingKind::Truncation, FindingKind::Size]);
    }
}
