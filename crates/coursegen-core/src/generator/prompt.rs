//! Prompt construction for outline and content passes.

use std::ops::RangeInclusive;

use crate::curriculum::{Chapter, Curriculum};
use crate::document::DocumentKind;
use crate::text::head_chars;

use super::Outline;
use super::plans::{DocumentPlan, PassScope, PassSpec};

/// Included in every content prompt.
pub const NO_TRUNCATION: &str = "Write every section in full. Do NOT use ellipsis (...) in \
code, do NOT leave placeholder comments such as `// ...` or `/* ... */`, and do NOT stop \
before the assigned scope is complete.";

/// Companion documents are cut to this many characters in the outline prompt.
const COMPANION_CHARS: usize = 6000;

/// Chapter identity, objectives, topics and neighbouring-chapter context.
pub fn chapter_brief(chapter: &Chapter, curriculum: &Curriculum) -> String {
    let mut brief = format!("**Chapter {}: {}**\n", chapter.number, chapter.title);
    if !chapter.part.is_empty() {
        brief.push_str(&format!("Part: {}\n", chapter.part));
    }
    if !curriculum.title.is_empty() {
        brief.push_str(&format!("Course: {}\n", curriculum.title));
    }
    brief.push_str("\n## Learning Objectives\n\n");
    brief.push_str(&bullets(&chapter.learning_objectives));
    brief.push_str("\n## Topics\n\n");
    brief.push_str(&bullets(&chapter.topics));
    brief.push_str("\n## Context\n\n");
    brief.push_str(&curriculum.previous_context(chapter.number));
    brief.push('\n');
    brief.push_str(&curriculum.next_preview(chapter.number));
    brief.push('\n');
    brief
}

fn bullets(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none listed)\n".to_string();
    }
    items.iter().map(|i| format!("- {i}\n")).collect()
}

pub fn outline_prompt(
    plan: &DocumentPlan,
    brief: &str,
    domain: &str,
    companions: &[(DocumentKind, String)],
) -> String {
    let mut prompt = format!(
        "You are an expert curriculum developer planning the {} for a training course.\n\n{brief}\n",
        plan.kind.title()
    );
    if !domain.is_empty() {
        prompt.push_str(domain);
        prompt.push('\n');
    }
    for (kind, text) in companions {
        prompt.push_str(&format!(
            "\n## Existing {}\n\n{}\n",
            kind.title(),
            head_chars(text, COMPANION_CHARS)
        ));
    }
    prompt.push_str("\n# Your Task\n\nProduce a detailed structural outline only. ");
    prompt.push_str(plan.outline.instructions);
    if let Some(units) = plan.outline.units {
        prompt.push_str(&format!(
            "\n\nPlan between {min} and {max} {label}. State the exact count on its own line \
             as `Total {label}: N`.",
            min = units.min,
            max = units.max,
            label = units.label
        ));
    }
    prompt.push_str("\n\nOutput the outline as structured markdown.");
    prompt
}

/// Text telling a pass which part of the outline it owns.
pub fn scope_directive(pass: &PassSpec, outline: &Outline) -> String {
    match pass.scope {
        PassScope::Directive(text) => text.to_string(),
        PassScope::Units { part, of } => match outline.unit_range(part, of) {
            Some(range) => units_directive(outline, range),
            None => format!("Write part {} of {of} of the outline.", part + 1),
        },
    }
}

fn units_directive(outline: &Outline, range: RangeInclusive<u32>) -> String {
    let (label, total) = match &outline.units {
        Some(u) => (u.label, u.total),
        None => ("items", *range.end()),
    };
    if range.is_empty() {
        return format!("All {total} {label} are already covered; write nothing new.");
    }
    format!(
        "Write ONLY {label} {} through {} (of {total} total) from the outline, numbered \
         exactly as in the outline. Do not write any other {label}.",
        range.start(),
        range.end()
    )
}

pub fn content_prompt(
    kind: DocumentKind,
    brief: &str,
    domain: &str,
    outline: &Outline,
    directive: &str,
) -> String {
    let mut prompt = format!(
        "You are an expert curriculum developer writing the {} for a training course.\n\n{brief}\n",
        kind.title()
    );
    if !domain.is_empty() {
        prompt.push_str(domain);
        prompt.push('\n');
    }
    prompt.push_str(&format!("\n## Outline to Expand\n\n{}\n", outline.text));
    if let Some(units) = &outline.units {
        prompt.push_str(&format!(
            "\nThe outline defines {} {} in total.\n",
            units.total, units.label
        ));
    }
    prompt.push_str(&format!(
        "\n# Your Task\n\n{directive}\n\n## Requirements\n\n{}\n{NO_TRUNCATION}\n",
        format_rules(kind)
    ));
    prompt
}

/// Heading conventions the validator and analyser rely on.
pub fn format_rules(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Slides => {
            "Start each slide with `## Slide N: Title` and end it with a `Speaker Notes:` paragraph."
        }
        DocumentKind::BookChapter => {
            "Use `##` headings, including Introduction, Learning Objectives, Summary and \
             What's Next sections, with fenced code examples."
        }
        DocumentKind::Exercises => {
            "Start each exercise with `## Exercise N: Title` and include Success Criteria and \
             Troubleshooting subsections."
        }
        DocumentKind::Qa => "Start each entry with `### QN: question` followed by the answer.",
        DocumentKind::Quiz => {
            "Start each question with `### Question N`. In the answer key give every answer \
             an `Explanation:` line."
        }
        DocumentKind::Topics => "Group topics under `##` headings with short bullet summaries.",
        DocumentKind::InstructorKeys => {
            "Use `## Exercise N Solution` and `## Quiz Answers` headings with complete \
             reference code."
        }
    }
}

/// Request context for a pass that continues the previous one.
pub fn previous_pass_context(previous: &str, chars: usize) -> String {
    format!(
        "Already generated (for context only, DO NOT REPEAT):\n\n{}...",
        head_chars(previous, chars)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::UnitCount;
    use crate::generator::plans::DocumentPlan;

    fn curriculum() -> Curriculum {
        Curriculum::from_json(
            r#"{"chapters": [
                {"number": 1, "title": "Intro", "part": "Basics",
                 "learningObjectives": ["Explain X"], "topics": ["X basics"]},
                {"number": 2, "title": "Deeper"}
            ]}"#,
        )
        .unwrap()
    }

    fn quiz_outline(total: u32) -> Outline {
        Outline {
            text: "1. Q\n2. Q".into(),
            units: Some(UnitCount {
                label: "questions",
                total,
            }),
        }
    }

    #[test]
    fn brief_contains_objectives_topics_and_neighbours() {
        let c = curriculum();
        let brief = chapter_brief(c.chapter(1).unwrap(), &c);
        assert!(brief.contains("**Chapter 1: Intro**"));
        assert!(brief.contains("- Explain X"));
        assert!(brief.contains("- X basics"));
        assert!(brief.contains(crate::curriculum::FIRST_CHAPTER_CONTEXT));
        assert!(brief.contains("Next chapter: Deeper"));
    }

    #[test]
    fn countable_outline_asks_for_total_line() {
        let plan = DocumentPlan::for_kind(DocumentKind::Quiz);
        let prompt = outline_prompt(&plan, "brief", "", &[]);
        assert!(prompt.contains("`Total questions: N`"));
        assert!(prompt.contains("between 10 and 15 questions"));
    }

    #[test]
    fn companions_are_quoted_and_capped() {
        let plan = DocumentPlan::for_kind(DocumentKind::InstructorKeys);
        let long = "x".repeat(COMPANION_CHARS + 100);
        let prompt = outline_prompt(&plan, "brief", "", &[(DocumentKind::Quiz, long)]);
        assert!(prompt.contains("## Existing Quiz"));
        assert!(!prompt.contains(&"x".repeat(COMPANION_CHARS + 1)));
    }

    #[test]
    fn unit_directive_names_the_range() {
        let plan = DocumentPlan::for_kind(DocumentKind::Quiz);
        let outline = quiz_outline(12);
        assert_eq!(
            scope_directive(&plan.passes[0], &outline),
            "Write ONLY questions 1 through 6 (of 12 total) from the outline, numbered \
             exactly as in the outline. Do not write any other questions."
        );
        assert!(scope_directive(&plan.passes[1], &outline).contains("questions 7 through 12"));
        assert!(scope_directive(&plan.passes[2], &outline).starts_with("Write ONLY the Answer Key"));
    }

    #[test]
    fn content_prompt_carries_every_required_block() {
        let outline = quiz_outline(12);
        let prompt = content_prompt(
            DocumentKind::Quiz,
            "THE BRIEF",
            "THE DOMAIN",
            &outline,
            "THE DIRECTIVE",
        );
        for needle in ["THE BRIEF", "THE DOMAIN", "1. Q\n2. Q", "THE DIRECTIVE", NO_TRUNCATION] {
            assert!(prompt.contains(needle), "missing {needle}");
        }
        assert!(prompt.contains("12 questions in total"));
        assert!(prompt.contains("### Question N"));
    }

    #[test]
    fn previous_context_is_a_bounded_preview() {
        let ctx = previous_pass_context(&"a".repeat(900), 500);
        assert!(ctx.contains(&"a".repeat(500)));
        assert!(!ctx.contains(&"a".repeat(501)));
    }
}
