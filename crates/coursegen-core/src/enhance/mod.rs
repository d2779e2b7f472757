//! Targeted repair of quality findings.
//!
//! Each finding is handled by the strategy it names. Every strategy issues
//! exactly one bounded generation call, builds a candidate document and
//! passes it through [`crate::safety::check`] before returning it. The
//! applier never writes to disk; callers persist only `Repaired` content.

pub mod suggestions;

use serde::{Deserialize, Serialize};

use crate::curriculum::Chapter;
use crate::document::{DocumentKind, SECTION_SEPARATOR};
use crate::llm::{GenerationCaller, GenerationError};
use crate::quality::{self, FencedBlock, Finding, Strategy};
use crate::safety::{self, RejectReason};
use crate::text::{head_chars, tail_chars};

/// Tail treated as the incomplete section by section completion.
pub const INCOMPLETE_TAIL_CHARS: usize = 600;
/// Prior context sent with the incomplete tail.
pub const PRIOR_CONTEXT_CHARS: usize = 6000;

const DEFAULT_DEFICIT: usize = 2048;

/// Result of one successful strategy call.
#[derive(Debug, Clone, PartialEq)]
pub enum Remediation {
    Repaired {
        content: String,
        description: String,
        bytes_added: i64,
    },
    Rejected(RejectReason),
    NoneNeeded(String),
}

/// Outcome of one finding as recorded in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemediationOutcome {
    Repaired { description: String, bytes_added: i64 },
    Rejected { reason: RejectReason },
    Failed { error: String },
    NoneNeeded { reason: String },
}

impl RemediationOutcome {
    pub fn from_result(result: &Result<Remediation, GenerationError>) -> Self {
        match result {
            Ok(Remediation::Repaired {
                description,
                bytes_added,
                ..
            }) => RemediationOutcome::Repaired {
                description: description.clone(),
                bytes_added: *bytes_added,
            },
            Ok(Remediation::Rejected(reason)) => RemediationOutcome::Rejected {
                reason: reason.clone(),
            },
            Ok(Remediation::NoneNeeded(reason)) => RemediationOutcome::NoneNeeded {
                reason: reason.clone(),
            },
            Err(e) => RemediationOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// Applies repair strategies through the budget-aware caller.
#[derive(Debug, Clone)]
pub struct EnhancementApplier {
    caller: GenerationCaller,
}

impl EnhancementApplier {
    pub fn new(caller: GenerationCaller) -> Self {
        Self { caller }
    }

    /// Run the strategy `finding` names against `document`.
    pub async fn apply(
        &self,
        document: &str,
        kind: DocumentKind,
        finding: &Finding,
        chapter: &Chapter,
    ) -> Result<Remediation, GenerationError> {
        tracing::info!(
            chapter = chapter.number,
            document = %kind,
            finding = %finding.kind,
            strategy = ?finding.strategy,
            "applying enhancement"
        );
        let remediation = match finding.strategy {
            Strategy::CodeCompletion => self.complete_code(document, kind, chapter).await?,
            Strategy::ContentExtension => {
                self.extend_content(document, kind, finding, chapter).await?
            }
            Strategy::SectionCompletion => self.complete_section(document, kind, chapter).await?,
        };
        match &remediation {
            Remediation::Repaired { bytes_added, .. } => {
                tracing::info!(chapter = chapter.number, document = %kind, bytes_added, "repair accepted")
            }
            Remediation::Rejected(reason) => {
                tracing::warn!(chapter = chapter.number, document = %kind, %reason, "repair rejected, keeping original")
            }
            Remediation::NoneNeeded(reason) => {
                tracing::debug!(chapter = chapter.number, document = %kind, reason = %reason, "nothing to repair")
            }
        }
        Ok(remediation)
    }

    async fn complete_code(
        &self,
        document: &str,
        kind: DocumentKind,
        chapter: &Chapter,
    ) -> Result<Remediation, GenerationError> {
        let regions = incomplete_code_blocks(document);
        if regions.is_empty() {
            return Ok(Remediation::NoneNeeded(
                "no incomplete code blocks found".to_string(),
            ));
        }

        let mut prompt = format!(
            "You are completing code examples in a technical tutorial.\n\n\
             RULES:\n\
             1. Replace every \"...\" or placeholder comment with a full implementation.\n\
             2. Keep all existing code exactly as it is.\n\
             3. Match the style and patterns shown.\n\
             4. Return ONLY the completed code blocks, in the same order, each in a fenced \
             block with its language.\n\n\
             Chapter {}: {}\nDocument: {}\n\nINCOMPLETE CODE BLOCKS:\n",
            chapter.number,
            chapter.title,
            kind.title()
        );
        for (i, block) in regions.iter().enumerate() {
            let lang = if block.info.is_empty() { "text" } else { &block.info };
            prompt.push_str(&format!(
                "\n### Block {} ({lang}):\n```{lang}\n{}```\n",
                i + 1,
                block.body(document)
            ));
        }

        let output = self.caller.call(&prompt, 4000, 0.5, None).await?;
        let returned: Vec<FencedBlock> = quality::scan_fences(&output)
            .into_iter()
            .filter(|b| b.terminated)
            .collect();
        let spliced = regions.len().min(returned.len());
        if spliced == 0 {
            return Ok(Remediation::Rejected(RejectReason::Unusable {
                detail: "no code blocks in completion".to_string(),
            }));
        }
        if regions.len() != returned.len() {
            tracing::warn!(
                extracted = regions.len(),
                returned = returned.len(),
                spliced,
                "code block count mismatch, splicing by position"
            );
        }

        let mut candidate = String::with_capacity(document.len() + output.len());
        let mut last = 0;
        for (region, replacement) in regions.iter().zip(&returned) {
            candidate.push_str(&document[last..region.span.start]);
            candidate.push_str(replacement.full(&output));
            last = region.span.end;
        }
        candidate.push_str(&document[last..]);

        Ok(accept(
            document,
            candidate,
            &output,
            format!("expanded {spliced} of {} incomplete code block(s)", regions.len()),
        ))
    }

    async fn extend_content(
        &self,
        document: &str,
        kind: DocumentKind,
        finding: &Finding,
        chapter: &Chapter,
    ) -> Result<Remediation, GenerationError> {
        let wanted = suggestions::missing_sections(kind, document);
        let deficit = finding.deficit().unwrap_or(DEFAULT_DEFICIT);
        let list: String = wanted.iter().map(|s| format!("- {s}\n")).collect();

        let prompt = format!(
            "You are extending course materials to make them more comprehensive.\n\n\
             EXISTING CONTENT ({:.1}KB) is complete and must not be modified. Its opening:\n\n\
             {}\n\n\
             YOUR TASK:\nWrite ONLY these new sections:\n{list}\n\
             REQUIREMENTS:\n\
             1. Complete sections with no placeholders.\n\
             2. Match the tone and style of the existing content.\n\
             3. Target about {:.1}KB of additional content.\n\n\
             Chapter {}: {}\nDocument: {}\n\n\
             Return ONLY the new sections as markdown. They will be appended.",
            document.len() as f64 / 1024.0,
            head_chars(document, 1500),
            deficit as f64 / 1024.0,
            chapter.number,
            chapter.title,
            kind.title()
        );

        let additions = self.caller.call(&prompt, 6000, 0.7, None).await?;
        let additions = additions.trim();
        let candidate = format!("{document}{SECTION_SEPARATOR}{additions}\n");
        Ok(accept(
            document,
            candidate,
            additions,
            format!("added {} section(s)", wanted.len()),
        ))
    }

    async fn complete_section(
        &self,
        document: &str,
        kind: DocumentKind,
        chapter: &Chapter,
    ) -> Result<Remediation, GenerationError> {
        let tail = tail_chars(document, INCOMPLETE_TAIL_CHARS);
        let prior = tail_chars(&document[..document.len() - tail.len()], PRIOR_CONTEXT_CHARS);

        let prompt = format!(
            "You are completing a tutorial section that was cut off.\n\n\
             COMPLETE PRIOR CONTENT:\n{prior}\n\n\
             INCOMPLETE SECTION (continue from here):\n{tail}\n\n\
             Chapter {}: {}\nDocument: {}\n\n\
             Continue exactly where the text stops and complete the section in the same \
             format and style. Return ONLY the continuation.",
            chapter.number,
            chapter.title,
            kind.title()
        );

        let continuation = self.caller.call(&prompt, 4000, 0.7, None).await?;
        let candidate = format!("{document}{continuation}");
        Ok(accept(
            document,
            candidate,
            &continuation,
            "completed truncated section".to_string(),
        ))
    }
}

/// Fenced regions the code-completion strategy repairs.
pub fn incomplete_code_blocks(document: &str) -> Vec<FencedBlock> {
    quality::scan_fences(document)
        .into_iter()
        .filter(|b| {
            let body = b.body(document);
            body.contains("...") || quality::has_placeholder(body)
        })
        .collect()
}

fn accept(original: &str, candidate: String, output: &str, description: String) -> Remediation {
    match safety::check(original, &candidate, output) {
        Ok(()) => Remediation::Repaired {
            bytes_added: candidate.len() as i64 - original.len() as i64,
            content: candidate,
            description,
        },
        Err(reason) => Remediation::Rejected(reason),
    }
}
