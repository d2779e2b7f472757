//! Final markdown normalisation and export.
//!
//! Normalisation is deterministic and idempotent. Packaging beyond the
//! manifest goes through the [`Exporter`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::curriculum::Chapter;
use crate::document::DocumentKind;
use crate::store::{ChapterStore, sha256_hex};

use super::PhaseError;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Longest run of blank lines kept outside code blocks.
pub const MAX_BLANK_RUN: usize = 2;

const FENCE: &str = "```";

/// Guess a language tag from the first non-empty line of a code block.
fn sniff_language(first_line: &str) -> &'static str {
    let line = first_line.trim_start();
    let word = line.split_whitespace().next().unwrap_or("");
    let upper = word.to_ascii_uppercase();
    if line.starts_with("#!") || line.starts_with("$ ") {
        "bash"
    } else if matches!(
        word,
        "function" | "const" | "let" | "var" | "class" | "export" | "import"
    ) {
        "javascript"
    } else if matches!(word, "def" | "from") {
        "python"
    } else if matches!(word, "public" | "private" | "namespace" | "using") {
        "csharp"
    } else if matches!(
        upper.as_str(),
        "SELECT" | "INSERT" | "UPDATE" | "DELETE" | "CREATE"
    ) {
        "sql"
    } else if line.starts_with("<?php") {
        "php"
    } else if line.to_ascii_lowercase().starts_with("<!doctype")
        || line.starts_with("<html")
        || line.starts_with("<div")
        || line.starts_with("<script")
    {
        "html"
    } else if line.starts_with('{') || line.starts_with('[') {
        "json"
    } else {
        "text"
    }
}

/// Normalise a markdown document: LF line endings, no trailing whitespace,
/// a language tag on every opening fence, blank runs capped outside code
/// and exactly one trailing newline.
pub fn normalize_markdown(input: &str) -> String {
    let text = input.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = text.split('\n').map(str::trim_end).collect();

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut in_fence = false;
    let mut blank_run = 0;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(FENCE) {
            blank_run = 0;
            if in_fence {
                in_fence = false;
                out.push(line.to_string());
                continue;
            }
            in_fence = true;
            let info = trimmed[FENCE.len()..].trim();
            if info.is_empty() {
                let indent = &line[..line.len() - trimmed.len()];
                let first = lines[i + 1..]
                    .iter()
                    .take_while(|l| !l.trim_start().starts_with(FENCE))
                    .find(|l| !l.trim().is_empty())
                    .copied()
                    .unwrap_or("");
                out.push(format!("{indent}{FENCE}{}", sniff_language(first)));
            } else {
                out.push(line.to_string());
            }
            continue;
        }

        if !in_fence && line.is_empty() {
            blank_run += 1;
            if blank_run > MAX_BLANK_RUN {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(line.to_string());
    }

    let mut result = out.join("\n");
    let kept = result.trim_end_matches('\n').len();
    result.truncate(kept);
    result.push('\n');
    result
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedDocument {
    pub kind: DocumentKind,
    pub file: String,
    pub bytes: usize,
    pub sha256: String,
}

/// Packaging seam run after normalisation.
#[async_trait]
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    async fn export(
        &self,
        store: &ChapterStore,
        chapter: &Chapter,
        documents: &[ExportedDocument],
    ) -> anyhow::Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Exporter) {}
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub chapter: u32,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub documents: Vec<ExportedDocument>,
}

/// Writes [`MANIFEST_FILE`] listing every exported document.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestExporter;

#[async_trait]
impl Exporter for ManifestExporter {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn export(
        &self,
        store: &ChapterStore,
        chapter: &Chapter,
        documents: &[ExportedDocument],
    ) -> anyhow::Result<()> {
        let manifest = Manifest {
            chapter: chapter.number,
            title: chapter.title.clone(),
            generated_at: Utc::now(),
            documents: documents.to_vec(),
        };
        store
            .write_chapter_json(chapter.number, MANIFEST_FILE, &manifest)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    pub chapter: u32,
    /// Documents whose content changed during normalisation.
    pub normalized: Vec<DocumentKind>,
    pub documents: Vec<ExportedDocument>,
    pub exporters: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Normalise every present document, then hand the set to each exporter.
pub async fn run(
    store: &ChapterStore,
    chapter: &Chapter,
    exporters: &[Arc<dyn Exporter>],
) -> Result<ExportReport, PhaseError> {
    let mut report = ExportReport {
        chapter: chapter.number,
        normalized: Vec::new(),
        documents: Vec::new(),
        exporters: Vec::new(),
        timestamp: Utc::now(),
    };

    for kind in DocumentKind::ALL {
        let content = match store.read_document(chapter.number, kind).await {
            Ok(c) => c,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.into()),
        };
        let normalized = normalize_markdown(&content);
        if normalized != content {
            store
                .write_document(chapter.number, kind, &normalized)
                .await?;
            report.normalized.push(kind);
        }
        report.documents.push(ExportedDocument {
            kind,
            file: kind.file_name().to_string(),
            bytes: normalized.len(),
            sha256: sha256_hex(&normalized),
        });
    }

    for exporter in exporters {
        exporter
            .export(store, chapter, &report.documents)
            .await
            .map_err(|e| e.context(format!("exporter {} failed", exporter.name())))?;
        report.exporters.push(exporter.name().to_string());
    }

    tracing::info!(
        chapter = chapter.number,
        documents = report.documents.len(),
        normalized = report.normalized.len(),
        "export complete"
    );
    Ok(report)
}
