//! `coursegen validate` command: offline structural checks of chapter output.

use anyhow::{Context, Result};

use coursegen_core::curriculum::Curriculum;
use coursegen_core::store::ChapterStore;
use coursegen_core::validate::{self, ValidationReport};

/// Run the validate command. Exits with status 1 when any chapter fails.
pub async fn run_validate(
    store: &ChapterStore,
    curriculum: &Curriculum,
    chapters: &[u32],
) -> Result<()> {
    let mut reports = Vec::with_capacity(chapters.len());
    for &number in chapters {
        let chapter = curriculum.chapter(number)?;
        let report = validate::validate_chapter(store, chapter)
            .await
            .with_context(|| format!("failed to validate chapter {number}"))?;
        reports.push(report);
    }

    print_reports(&reports);

    if reports.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

fn print_reports(reports: &[ValidationReport]) {
    println!(
        "{:<8} {:<30} {:>14} {:>6} {:>7}",
        "CHAPTER", "TITLE", "SCORE", "GRADE", "RESULT"
    );
    println!("{}", "-".repeat(69));
    for r in reports {
        println!(
            "{:<8} {:<30} {:>14} {:>6} {:>7}",
            r.chapter,
            truncate(&r.title, 28),
            r.overall(),
            r.grade,
            if r.passed { "pass" } else { "FAIL" }
        );
    }

    for r in reports {
        if r.errors.is_empty() && r.warnings.is_empty() {
            continue;
        }
        println!();
        println!("Chapter {}: {}", r.chapter, r.title);
        for issue in &r.errors {
            println!("  error   [{}] {}: {}", issue.severity, issue.file, issue.issue);
        }
        for issue in &r.warnings {
            println!("  warning [{}] {}: {}", issue.severity, issue.file, issue.issue);
        }
    }

    let passed = reports.iter().filter(|r| r.passed).count();
    println!();
    println!(
        "Passed: {passed}/{} (pass mark {}%)",
        reports.len(),
        validate::PASS_PERCENT
    );
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}
