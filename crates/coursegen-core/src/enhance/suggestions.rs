//! Missing-section suggestions for the content-extension strategy.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::DocumentKind;

static EXERCISE_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"## Exercise \d+:").expect("valid regex"));

/// Minimum number of `## Exercise N:` sections an exercise set should have.
pub const MIN_EXERCISES: usize = 3;

const GENERIC: &str = "Additional worked examples and practice scenarios that deepen the \
existing material";

/// Concrete sections `content` lacks for its kind. Never empty.
pub fn missing_sections(kind: DocumentKind, content: &str) -> Vec<String> {
    let mut out = Vec::new();
    match kind {
        DocumentKind::InstructorKeys => {
            if !content.contains("Common Student Mistakes") && !content.contains("Common Mistakes")
            {
                out.push("Common Student Mistakes section (5-7 items with examples)".to_string());
            }
            if !content.contains("Extension Challenges") && !content.contains("Bonus Activities") {
                out.push(
                    "Extension Challenges section (3-5 bonus activities for advanced students)"
                        .to_string(),
                );
            }
            if content.contains("Grading") && !content.contains("Grading Checklist") {
                out.push("Detailed Grading Checklist (10-15 specific items to verify)".to_string());
            }
            if !content.contains("Troubleshooting") {
                out.push("Troubleshooting Guide (5-7 common issues with solutions)".to_string());
            }
        }
        DocumentKind::Exercises => {
            let count = EXERCISE_HEADING_RE.find_iter(content).count();
            if count < MIN_EXERCISES {
                out.push(format!(
                    "{} more exercise(s) under `## Exercise N:` headings with complete instructions",
                    MIN_EXERCISES - count
                ));
            }
            if !content.contains("Success Criteria") {
                out.push("Success Criteria section for each exercise".to_string());
            }
        }
        _ => {}
    }
    if out.is_empty() {
        out.push(GENERIC.to_string());
    }
    out
}
