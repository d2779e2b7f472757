//! Multi-pass document generator.
//!
//! One document is produced by a typed three-stage pipeline:
//!
//! 1. [`DocumentGenerator::outline`] issues the structure pass and returns an
//!    [`Outline`] (text plus the parsed unit count for countable kinds).
//! 2. [`DocumentGenerator::content`] takes `&Outline` and runs the plan's
//!    content passes strictly in order, each prompt carrying the full outline
//!    and that pass's scope directive.
//! 3. [`assemble`] joins the pass outputs under a metadata header and runs
//!    the ellipsis post-check.
//!
//! Any pass failure aborts the document: nothing partial is returned.

pub mod plans;
pub mod prompt;

use std::ops::RangeInclusive;
use std::time::Instant;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::curriculum::{Chapter, Curriculum};
use crate::document::{Document, DocumentKind, count_ellipses};
use crate::llm::{GenerationCaller, GenerationError};

pub use plans::{DocumentPlan, OutlineSpec, PassScope, PassSpec, UnitSpec};

/// Characters of the previous pass sent as context to the next one.
pub const PREVIOUS_PASS_PREVIEW_CHARS: usize = 500;

/// Ellipsis count above which the assembled document carries a warning.
pub const ELLIPSIS_TOLERANCE: usize = 3;

static TOTAL_UNITS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\btotal\s+(slides|exercises|questions)\W{0,3}\s*:?\s*\**\s*(\d+)")
        .expect("valid regex")
});

/// Number of units an outline committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitCount {
    pub label: &'static str,
    pub total: u32,
}

/// Output of the structure pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub text: String,
    pub units: Option<UnitCount>,
}

impl Outline {
    /// Build an outline from model output, parsing the unit count when the
    /// plan expects one.
    pub fn parse(text: String, spec: Option<UnitSpec>) -> Self {
        let units = spec.map(|spec| {
            let total = parse_unit_count(&text, spec.label)
                .map(|n| spec.clamp(n))
                .unwrap_or_else(|| {
                    tracing::warn!(
                        label = spec.label,
                        default = spec.default,
                        "outline states no unit count, using default"
                    );
                    spec.default
                });
            UnitCount {
                label: spec.label,
                total,
            }
        });
        Self { text, units }
    }

    /// Contiguous share `part` of `of` covering `1..=total`.
    ///
    /// Earlier parts get the extra unit when the total does not divide
    /// evenly. `None` when the outline has no units or `part` is out of
    /// range.
    pub fn unit_range(&self, part: usize, of: usize) -> Option<RangeInclusive<u32>> {
        let total = self.units?.total;
        split_units(total, of).into_iter().nth(part)
    }
}

/// First `Total <label>: N` line in `text`.
pub fn parse_unit_count(text: &str, label: &str) -> Option<u32> {
    TOTAL_UNITS_RE
        .captures_iter(text)
        .filter(|c| c[1].eq_ignore_ascii_case(label))
        .find_map(|c| c[2].parse().ok())
}

/// Partition `1..=total` into `parts` contiguous, non-overlapping ranges.
pub fn split_units(total: u32, parts: usize) -> Vec<RangeInclusive<u32>> {
    if parts == 0 {
        return Vec::new();
    }
    let parts_u32 = parts as u32;
    let base = total / parts_u32;
    let extra = total % parts_u32;
    let mut start = 1;
    (0..parts_u32)
        .map(|i| {
            let size = base + u32::from(i < extra);
            let range = start..=start + size - 1;
            start += size;
            range
        })
        .collect()
}

/// Output of one content pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassOutput {
    pub name: &'static str,
    pub text: String,
}

/// A finished document plus generation metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDocument {
    pub kind: DocumentKind,
    pub content: String,
    pub passes: usize,
    pub units: Option<UnitCount>,
    pub warnings: Vec<String>,
}

/// Everything a pass prompt needs about the chapter.
#[derive(Debug, Clone)]
pub struct ChapterInputs<'a> {
    pub chapter: &'a Chapter,
    pub curriculum: &'a Curriculum,
    /// Sibling documents already generated for this chapter.
    pub companions: Vec<(DocumentKind, String)>,
}

impl<'a> ChapterInputs<'a> {
    pub fn new(chapter: &'a Chapter, curriculum: &'a Curriculum) -> Self {
        Self {
            chapter,
            curriculum,
            companions: Vec::new(),
        }
    }
}

/// Runs [`DocumentPlan`]s against the generation service.
#[derive(Debug, Clone)]
pub struct DocumentGenerator {
    caller: GenerationCaller,
}

impl DocumentGenerator {
    pub fn new(caller: GenerationCaller) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> &GenerationCaller {
        &self.caller
    }

    /// Produce one complete document.
    pub async fn generate(
        &self,
        kind: DocumentKind,
        inputs: &ChapterInputs<'_>,
    ) -> Result<GeneratedDocument, GenerationError> {
        let plan = DocumentPlan::for_kind(kind);
        let started = Instant::now();
        tracing::info!(
            chapter = inputs.chapter.number,
            document = %kind,
            passes = plan.passes.len() + 1,
            "generating document"
        );

        let outline = self.outline(&plan, inputs).await?;
        let outputs = self.content(&plan, inputs, &outline).await?;
        let generated = assemble(&plan, inputs.chapter, &outline, outputs);

        tracing::info!(
            chapter = inputs.chapter.number,
            document = %kind,
            bytes = generated.content.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document generated"
        );
        Ok(generated)
    }

    /// Stage 1: the structure pass.
    pub async fn outline(
        &self,
        plan: &DocumentPlan,
        inputs: &ChapterInputs<'_>,
    ) -> Result<Outline, GenerationError> {
        let brief = prompt::chapter_brief(inputs.chapter, inputs.curriculum);
        let domain = inputs.curriculum.domain.grounding_block();
        let companions: Vec<(DocumentKind, String)> = inputs
            .companions
            .iter()
            .filter(|(k, _)| plan.companions.contains(k))
            .cloned()
            .collect();
        let text = self
            .caller
            .call(
                &prompt::outline_prompt(plan, &brief, &domain, &companions),
                plan.outline.max_tokens,
                plan.outline.temperature,
                None,
            )
            .await?;
        let outline = Outline::parse(text, plan.outline.units);
        tracing::debug!(
            chapter = inputs.chapter.number,
            document = %plan.kind,
            units = outline.units.map(|u| u.total),
            "outline ready"
        );
        Ok(outline)
    }

    /// Stage 2: content passes, in order.
    pub async fn content(
        &self,
        plan: &DocumentPlan,
        inputs: &ChapterInputs<'_>,
        outline: &Outline,
    ) -> Result<Vec<PassOutput>, GenerationError> {
        let brief = prompt::chapter_brief(inputs.chapter, inputs.curriculum);
        let domain = inputs.curriculum.domain.grounding_block();
        let mut outputs: Vec<PassOutput> = Vec::with_capacity(plan.passes.len());

        for (i, pass) in plan.passes.iter().enumerate() {
            tracing::debug!(
                chapter = inputs.chapter.number,
                document = %plan.kind,
                pass = pass.name,
                step = i + 1,
                of = plan.passes.len(),
                "content pass"
            );
            let directive = prompt::scope_directive(pass, outline);
            let prompt = prompt::content_prompt(plan.kind, &brief, &domain, outline, &directive);
            let context = match outputs.last() {
                Some(prev) if pass.include_previous => Some(prompt::previous_pass_context(
                    &prev.text,
                    PREVIOUS_PASS_PREVIEW_CHARS,
                )),
                _ => None,
            };
            let text = self
                .caller
                .call(&prompt, pass.max_tokens, pass.temperature, context.as_deref())
                .await?;
            outputs.push(PassOutput {
                name: pass.name,
                text,
            });
        }
        Ok(outputs)
    }
}

/// Stage 3: header, separator-joined passes and the ellipsis post-check.
pub fn assemble(
    plan: &DocumentPlan,
    chapter: &Chapter,
    outline: &Outline,
    outputs: Vec<PassOutput>,
) -> GeneratedDocument {
    let passes = outputs.len() + 1;
    let document = Document {
        kind: plan.kind,
        chapter_number: chapter.number,
        chapter_title: chapter.title.clone(),
        generated_at: Utc::now(),
        sections: outputs.into_iter().map(|o| o.text).collect(),
    };
    let content = document.render();

    let mut warnings = Vec::new();
    let ellipses = count_ellipses(&content);
    if ellipses > ELLIPSIS_TOLERANCE {
        tracing::warn!(
            chapter = chapter.number,
            document = %plan.kind,
            ellipses,
            "possible truncation in generated document"
        );
        warnings.push(format!(
            "{ellipses} ellipsis markers found (possible truncation)"
        ));
    }

    GeneratedDocument {
        kind: plan.kind,
        content,
        passes,
        units: outline.units,
        warnings,
    }
}
