//! `coursegen generate` command: run chapters through the full pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use coursegen_core::CostLedger;
use coursegen_core::curriculum::Curriculum;
use coursegen_core::llm::{AnthropicClient, AnthropicConfig, GenerationCaller};
use coursegen_core::orchestrator::{
    BatchOptions, BatchOrchestrator, BatchSummary, ChapterOrchestrator, ChapterStatus,
    PhaseOptions,
};
use coursegen_core::store::ChapterStore;

use crate::config::Settings;

pub struct GenerateArgs {
    pub chapters: Vec<u32>,
    pub parallel: Option<usize>,
    pub resume: bool,
    pub phases: PhaseOptions,
}

/// Run the generate command.
pub async fn run_generate(
    settings: &Settings,
    curriculum: Curriculum,
    args: GenerateArgs,
) -> Result<()> {
    let api_key = settings.require_api_key()?;

    let mut api = AnthropicConfig::new(api_key);
    api.base_url = settings.base_url.clone();
    api.timeout = settings.timeout;
    let client = AnthropicClient::new(api).context("failed to build HTTP client")?;

    let ledger = Arc::new(CostLedger::new(
        settings.prices.clone(),
        settings.ceiling_usd,
    ));
    let caller = GenerationCaller::new(Arc::new(client), ledger.clone(), settings.model.clone());
    let store = ChapterStore::new(settings.output_dir.clone());

    let mode = match args.parallel.filter(|&n| n > 1) {
        Some(n) => format!("batches of {n}"),
        None => "sequential".to_string(),
    };
    if args.resume && args.parallel.is_some_and(|n| n > 1) {
        println!("Note: --resume only applies to sequential runs; ignoring checkpoint.");
    }

    println!("Generating: {}", curriculum.title);
    println!("  Chapters: {}", args.chapters.len());
    println!("  Mode:     {mode}");
    println!("  Model:    {}", settings.model);
    println!("  Budget:   ${:.2}", settings.ceiling_usd);
    println!("  Output:   {}", settings.output_dir.display());

    let chapters = Arc::new(ChapterOrchestrator::new(
        Arc::new(curriculum),
        store.clone(),
        caller,
        args.phases,
    ));
    let batch = BatchOrchestrator::new(
        chapters,
        store,
        ledger.clone(),
        BatchOptions {
            parallel: args.parallel,
            resume: args.resume,
            ..BatchOptions::default()
        },
    );

    // Set up graceful shutdown: first signal stops new chapters, second force-exits.
    let cancel = batch.cancel_token();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    let got_first_clone = Arc::clone(&got_first_signal);

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_clone.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nStopping after in-flight chapters (Ctrl+C again to force)...");
            cancel.cancel();
        }
    });

    let summary = batch
        .run(&args.chapters)
        .await
        .context("failed to write generation summary")?;

    print_summary(&summary);
    println!();
    println!("Cost: {}", ledger.inline());
    println!(
        "  Tokens: {} in / {} out over {} calls",
        summary.cost.input_tokens, summary.cost.output_tokens, summary.cost.calls
    );

    if summary.budget_exceeded {
        println!("\nRun stopped: budget ceiling of ${:.2} exceeded.", summary.cost.ceiling);
        println!("Raise --budget and re-run the chapters marked not started.");
        std::process::exit(3);
    }
    if got_first_signal.load(Ordering::SeqCst) {
        println!("\nRun interrupted by signal. In-flight chapters finished.");
        std::process::exit(130);
    }
    if !summary.all_succeeded() {
        println!(
            "\nSee {} in each chapter directory for details.",
            coursegen_core::orchestrator::chapter::REPORT_FILE
        );
    }

    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!("{:<8} {:<22} {:>10}", "CHAPTER", "STATUS", "ELAPSED");
    println!("{}", "-".repeat(42));
    for outcome in &summary.chapters {
        println!(
            "{:<8} {:<22} {:>9.1}s",
            outcome.chapter,
            status_label(&outcome.status),
            outcome.elapsed_secs
        );
    }
    for outcome in &summary.chapters {
        match &outcome.status {
            ChapterStatus::CompletedWithErrors { errors } => {
                for e in errors {
                    println!("  chapter {}: {e}", outcome.chapter);
                }
            }
            ChapterStatus::Failed { error } | ChapterStatus::BudgetExceeded { error } => {
                println!("  chapter {}: {error}", outcome.chapter);
            }
            ChapterStatus::Succeeded | ChapterStatus::NotStarted => {}
        }
    }

    println!();
    println!(
        "Successful: {}/{}  Failed: {}  Not started: {}  ({:.0}s)",
        summary.successful,
        summary.total,
        summary.failed,
        summary.not_started,
        summary.elapsed_secs
    );
}

fn status_label(status: &ChapterStatus) -> String {
    match status {
        ChapterStatus::Succeeded => "succeeded".to_string(),
        ChapterStatus::CompletedWithErrors { errors } => {
            format!("{} document error(s)", errors.len())
        }
        ChapterStatus::Failed { .. } => "failed".to_string(),
        ChapterStatus::BudgetExceeded { .. } => "budget exceeded".to_string(),
        ChapterStatus::NotStarted => "not started".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_are_short() {
        assert_eq!(status_label(&ChapterStatus::Succeeded), "succeeded");
        assert_eq!(
            status_label(&ChapterStatus::CompletedWithErrors {
                errors: vec!["quiz: boom".into(), "qa: boom".into()]
            }),
            "2 document error(s)"
        );
        assert_eq!(status_label(&ChapterStatus::NotStarted), "not started");
        assert_eq!(
            status_label(&ChapterStatus::BudgetExceeded {
                error: "budget exceeded: $5.10 of $5.00".into()
            }),
            "budget exceeded"
        );
    }
}
