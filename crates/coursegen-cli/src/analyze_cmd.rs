//! `coursegen analyze` command: quality findings for a generated chapter.

use anyhow::{Context, Result};

use coursegen_core::document::DocumentKind;
use coursegen_core::phases::revise;
use coursegen_core::quality::{self, QualityReport};
use coursegen_core::store::ChapterStore;

/// Analyze every document of `chapter`; `None` marks a missing file.
pub async fn analyze_chapter(
    store: &ChapterStore,
    chapter: u32,
) -> Result<Vec<(DocumentKind, Option<QualityReport>)>> {
    let mut rows = Vec::with_capacity(DocumentKind::ALL.len());
    for kind in DocumentKind::ALL {
        let report = match store.read_document(chapter, kind).await {
            Ok(content) => Some(quality::analyze(kind, &content, revise::min_size(kind))),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {kind} for chapter {chapter}"));
            }
        };
        rows.push((kind, report));
    }
    Ok(rows)
}

/// Run the analyze command.
pub async fn run_analyze(store: &ChapterStore, chapter: u32) -> Result<()> {
    let rows = analyze_chapter(store, chapter).await?;
    if rows.iter().all(|(_, r)| r.is_none()) {
        anyhow::bail!(
            "no documents found for chapter {chapter} under {}",
            store.chapter_dir(chapter).display()
        );
    }

    println!("Chapter {chapter} quality");
    println!();
    println!(
        "{:<22} {:>10} {:>6} {:>9}",
        "DOCUMENT", "BYTES", "SCORE", "FINDINGS"
    );
    println!("{}", "-".repeat(50));
    for (kind, report) in &rows {
        match report {
            Some(r) => println!(
                "{:<22} {:>10} {:>6} {:>9}",
                kind.file_name(),
                r.size,
                r.score,
                r.findings.len()
            ),
            None => println!("{:<22} {:>10} {:>6} {:>9}", kind.file_name(), "-", "-", "missing"),
        }
    }

    let flagged: Vec<&QualityReport> = rows
        .iter()
        .filter_map(|(_, r)| r.as_ref())
        .filter(|r| r.needs_enhancement)
        .collect();
    if flagged.is_empty() {
        println!();
        println!("No findings.");
        return Ok(());
    }
    for r in flagged {
        println!();
        println!("{}:", r.kind.file_name());
        for f in r.by_priority() {
            println!("  [{}] {} ({}): {}", f.priority, f.kind, strategy_name(&f), f.message);
        }
    }
    Ok(())
}

fn strategy_name(finding: &quality::Finding) -> &'static str {
    match finding.strategy {
        quality::Strategy::CodeCompletion => "code completion",
        quality::Strategy::ContentExtension => "content extension",
        quality::Strategy::SectionCompletion => "section completion",
    }
}

#[cfg(test)]
mod tests {
    use coursegen_core::quality::FindingKind;

    use super::*;

    #[tokio::test]
    async fn reports_missing_and_flagged_documents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = ChapterStore::new(tmp.path());
        store
            .write_document(
                2,
                DocumentKind::Quiz,
                "# Quiz\n\n```python\ndef f():\n    ...\n```\n",
            )
            .await
            .unwrap();
        store
            .write_document(2, DocumentKind::Topics, "# Topics\n\n- routing\n")
            .await
            .unwrap();

        let rows = analyze_chapter(&store, 2).await.unwrap();
        assert_eq!(rows.len(), 7);

        let find = |kind| rows.iter().find(|(k, _)| *k == kind).unwrap().1.as_ref();
        assert!(find(DocumentKind::Slides).is_none());
        let quiz = find(DocumentKind::Quiz).unwrap();
        assert!(quiz.has(FindingKind::CodeEllipsis));
        assert!(quiz.score < 100);
        let topics = find(DocumentKind::Topics).unwrap();
        assert!(!topics.needs_enhancement);
        assert_eq!(topics.score, 100);
    }
}
