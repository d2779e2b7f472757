//! Multi-chapter runs: sequential, or bounded batches run concurrently.
//!
//! The shared [`CostLedger`] is the only state crossing chapters. When a
//! chapter reports budget exhaustion the run's [`CancellationToken`] is
//! cancelled and every chapter not yet started is recorded as `NotStarted`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::budget::{CostLedger, CostSummary};
use crate::store::{ChapterStore, StoreError};

use super::chapter::{ChapterError, ChapterOrchestrator, ChapterReport};
use super::checkpoint::{self, Checkpoint};

pub const SUMMARY_FILE: &str = "generation-summary.json";

/// Runs one chapter to completion.
#[async_trait]
pub trait ChapterRunner: Send + Sync {
    async fn run_chapter(&self, chapter: u32) -> Result<ChapterReport, ChapterError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ChapterRunner) {}
};

#[async_trait]
impl ChapterRunner for ChapterOrchestrator {
    async fn run_chapter(&self, chapter: u32) -> Result<ChapterReport, ChapterError> {
        self.run(chapter).await
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Chapters per concurrent batch; `None` or `Some(1)` runs sequentially.
    pub parallel: Option<usize>,
    pub chapter_pause: Duration,
    pub batch_pause: Duration,
    /// Start after the saved checkpoint (sequential mode only).
    pub resume: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            parallel: None,
            chapter_pause: Duration::from_secs(2),
            batch_pause: Duration::from_secs(5),
            resume: false,
        }
    }
}

impl BatchOptions {
    fn batch_size(&self) -> Option<usize> {
        self.parallel.filter(|&n| n > 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChapterStatus {
    Succeeded,
    /// Ran to `Done` but one or more documents failed.
    CompletedWithErrors { errors: Vec<String> },
    Failed { error: String },
    BudgetExceeded { error: String },
    NotStarted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterOutcome {
    pub chapter: u32,
    #[serde(flatten)]
    pub status: ChapterStatus,
    pub elapsed_secs: f64,
}

/// Contents of [`SUMMARY_FILE`].
///
/// `successful` counts every chapter that ran to `Done`, including those with
/// document errors; their errors stay listed in `chapters`. `failed` counts
/// chapters that returned an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub not_started: usize,
    pub budget_exceeded: bool,
    pub elapsed_secs: f64,
    pub cost: CostSummary,
    pub chapters: Vec<ChapterOutcome>,
}

impl BatchSummary {
    /// Every chapter ran to `Done` without a single document error.
    pub fn all_succeeded(&self) -> bool {
        self.chapters
            .iter()
            .all(|c| c.status == ChapterStatus::Succeeded)
    }
}

pub struct BatchOrchestrator {
    runner: Arc<dyn ChapterRunner>,
    store: ChapterStore,
    ledger: Arc<CostLedger>,
    options: BatchOptions,
    cancel: CancellationToken,
}

impl BatchOrchestrator {
    pub fn new(
        runner: Arc<dyn ChapterRunner>,
        store: ChapterStore,
        ledger: Arc<CostLedger>,
        options: BatchOptions,
    ) -> Self {
        Self {
            runner,
            store,
            ledger,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the run from starting further chapters.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `chapters` in order and write [`SUMMARY_FILE`].
    pub async fn run(&self, chapters: &[u32]) -> Result<BatchSummary, StoreError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let chapters = self.resume_point(chapters).await;
        tracing::info!(%run_id, chapters = chapters.len(), parallel = ?self.options.batch_size(), "run started");

        let outcomes = match self.options.batch_size() {
            Some(size) => self.run_batches(&chapters, size).await,
            None => self.run_sequential(&chapters).await?,
        };

        let summary = summarize(
            run_id,
            outcomes,
            started.elapsed().as_secs_f64(),
            self.ledger.summary(),
        );
        self.store.write_root_json(SUMMARY_FILE, &summary).await?;

        if self.options.batch_size().is_none() && summary.all_succeeded() {
            checkpoint::clear(&self.store).await?;
        }

        tracing::info!(
            %run_id,
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            not_started = summary.not_started,
            cost = %self.ledger.inline(),
            "run finished"
        );
        Ok(summary)
    }

    async fn resume_point(&self, chapters: &[u32]) -> Vec<u32> {
        if !self.options.resume || self.options.batch_size().is_some() {
            return chapters.to_vec();
        }
        match checkpoint::load(&self.store).await {
            Some(cp) => {
                let remaining = cp.remaining(chapters);
                tracing::info!(last_completed = cp.last_completed, remaining = remaining.len(), "resuming from checkpoint");
                remaining
            }
            None => chapters.to_vec(),
        }
    }

    async fn run_sequential(&self, chapters: &[u32]) -> Result<Vec<ChapterOutcome>, StoreError> {
        let total = chapters.iter().copied().max().unwrap_or(0);
        let mut outcomes = Vec::with_capacity(chapters.len());
        // The checkpoint only advances over an unbroken run of clean chapters.
        let mut clean_so_far = true;
        for (i, &number) in chapters.iter().enumerate() {
            if self.cancel.is_cancelled() {
                outcomes.push(not_started(number));
                continue;
            }
            let outcome = self.run_one(number).await;
            clean_so_far &= outcome.status == ChapterStatus::Succeeded;
            outcomes.push(outcome);
            if clean_so_far {
                checkpoint::save(&self.store, &Checkpoint::new(number, total)).await?;
            }

            if i + 1 < chapters.len() && !self.cancel.is_cancelled() {
                self.pause(self.options.chapter_pause).await;
            }
        }
        Ok(outcomes)
    }

    async fn run_batches(&self, chapters: &[u32], size: usize) -> Vec<ChapterOutcome> {
        let batches: Vec<&[u32]> = chapters.chunks(size).collect();
        let mut outcomes = Vec::with_capacity(chapters.len());
        for (i, batch) in batches.iter().enumerate() {
            if self.cancel.is_cancelled() {
                outcomes.extend(batch.iter().map(|&n| not_started(n)));
                continue;
            }
            tracing::info!(batch = i + 1, of = batches.len(), chapters = ?batch, "batch started");
            // Chapters already in flight finish; the ledger refuses their
            // further calls once the ceiling is crossed.
            outcomes.extend(join_all(batch.iter().map(|&n| self.run_one(n))).await);

            if i + 1 < batches.len() && !self.cancel.is_cancelled() {
                self.pause(self.options.batch_pause).await;
            }
        }
        outcomes
    }

    async fn run_one(&self, number: u32) -> ChapterOutcome {
        let started = Instant::now();
        let status = match self.runner.run_chapter(number).await {
            Ok(report) if report.is_success() => ChapterStatus::Succeeded,
            Ok(report) => ChapterStatus::CompletedWithErrors {
                errors: report.errors,
            },
            Err(ChapterError::BudgetExceeded(exceeded)) => {
                tracing::error!(chapter = number, %exceeded, "budget exceeded, cancelling run");
                self.cancel.cancel();
                ChapterStatus::BudgetExceeded {
                    error: exceeded.to_string(),
                }
            }
            Err(e) => {
                tracing::error!(chapter = number, error = %e, "chapter failed");
                ChapterStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        ChapterOutcome {
            chapter: number,
            status,
            elapsed_secs: started.elapsed().as_secs_f64(),
        }
    }

    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

fn not_started(chapter: u32) -> ChapterOutcome {
    ChapterOutcome {
        chapter,
        status: ChapterStatus::NotStarted,
        elapsed_secs: 0.0,
    }
}

fn summarize(
    run_id: Uuid,
    chapters: Vec<ChapterOutcome>,
    elapsed_secs: f64,
    cost: CostSummary,
) -> BatchSummary {
    let count = |f: fn(&ChapterStatus) -> bool| chapters.iter().filter(|c| f(&c.status)).count();
    let successful = count(|s| {
        matches!(
            s,
            ChapterStatus::Succeeded | ChapterStatus::CompletedWithErrors { .. }
        )
    });
    let not_started = count(|s| matches!(s, ChapterStatus::NotStarted));
    let budget_exceeded = count(|s| matches!(s, ChapterStatus::BudgetExceeded { .. })) > 0;
    BatchSummary {
        run_id,
        timestamp: Utc::now(),
        total: chapters.len(),
        successful,
        failed: chapters.len() - successful - not_started,
        not_started,
        budget_exceeded,
        elapsed_secs,
        cost,
        chapters,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::budget::BudgetExceeded;

    struct Scripted {
        budget_on: Option<u32>,
        fail_on: Option<u32>,
        seen: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl ChapterRunner for Scripted {
        async fn run_chapter(&self, chapter: u32) -> Result<ChapterReport, ChapterError> {
            self.seen.lock().unwrap().push(chapter);
            if self.budget_on == Some(chapter) {
                return Err(BudgetExceeded {
                    cost: 6.0,
                    ceiling: 5.0,
                }
                .into());
            }
            Ok(ChapterReport {
                chapter,
                title: format!("Chapter {chapter}"),
                documents: vec![],
                phases: vec![],
                errors: if self.fail_on == Some(chapter) {
                    vec!["quiz: boom".into()]
                } else {
                    vec![]
                },
                budget_exceeded: None,
                elapsed_secs: 0.0,
                cost: CostLedger::default().summary(),
                timestamp: Utc::now(),
            })
        }
    }

    fn orchestrator(
        dir: &std::path::Path,
        runner: Arc<Scripted>,
        parallel: Option<usize>,
    ) -> BatchOrchestrator {
        BatchOrchestrator::new(
            runner,
            ChapterStore::new(dir),
            Arc::new(CostLedger::default()),
            BatchOptions {
                parallel,
                chapter_pause: Duration::ZERO,
                batch_pause: Duration::ZERO,
                resume: false,
            },
        )
    }

    #[tokio::test]
    async fn sequential_budget_stops_remaining_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Scripted {
            budget_on: Some(2),
            fail_on: None,
            seen: Mutex::new(vec![]),
        });
        let batch = orchestrator(dir.path(), runner.clone(), None);
        let summary = batch.run(&[1, 2, 3, 4]).await.unwrap();

        assert_eq!(*runner.seen.lock().unwrap(), vec![1, 2]);
        assert!(summary.budget_exceeded);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.not_started, 2);
        assert_eq!(summary.chapters[3].status, ChapterStatus::NotStarted);

        // Chapter 1 ran to completion, so the checkpoint points past it.
        let cp = checkpoint::load(&ChapterStore::new(dir.path())).await.unwrap();
        assert_eq!(cp.last_completed, 1);
        assert!(dir.path().join(SUMMARY_FILE).exists());
    }

    #[tokio::test]
    async fn document_errors_still_count_as_successful() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Scripted {
            budget_on: None,
            fail_on: Some(1),
            seen: Mutex::new(vec![]),
        });
        let summary = orchestrator(dir.path(), runner, None)
            .run(&[1, 2])
            .await
            .unwrap();
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 0);
        assert!(!summary.all_succeeded());
        match &summary.chapters[0].status {
            ChapterStatus::CompletedWithErrors { errors } => assert!(!errors.is_empty()),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn checkpoint_stops_before_a_chapter_with_document_errors() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Scripted {
            budget_on: None,
            fail_on: Some(2),
            seen: Mutex::new(vec![]),
        });
        orchestrator(dir.path(), runner.clone(), None)
            .run(&[1, 2, 3])
            .await
            .unwrap();

        let store = ChapterStore::new(dir.path());
        let cp = checkpoint::load(&store).await.unwrap();
        assert_eq!(cp.last_completed, 1);

        let mut resumed = orchestrator(dir.path(), runner.clone(), None);
        resumed.options.resume = true;
        runner.seen.lock().unwrap().clear();
        resumed.run(&[1, 2, 3]).await.unwrap();
        assert_eq!(*runner.seen.lock().unwrap(), vec![2, 3]);
    }

    #[tokio::test]
    async fn full_success_clears_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Scripted {
            budget_on: None,
            fail_on: None,
            seen: Mutex::new(vec![]),
        });
        let summary = orchestrator(dir.path(), runner, None)
            .run(&[1, 2, 3])
            .await
            .unwrap();
        assert_eq!(summary.successful, 3);
        assert!(!dir.path().join(checkpoint::CHECKPOINT_FILE).exists());
    }

    #[tokio::test]
    async fn resume_starts_after_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::new(dir.path());
        checkpoint::save(&store, &Checkpoint::new(2, 4)).await.unwrap();

        let runner = Arc::new(Scripted {
            budget_on: None,
            fail_on: None,
            seen: Mutex::new(vec![]),
        });
        let mut batch = orchestrator(dir.path(), runner.clone(), None);
        batch.options.resume = true;
        let summary = batch.run(&[1, 2, 3, 4]).await.unwrap();

        assert_eq!(*runner.seen.lock().unwrap(), vec![3, 4]);
        assert_eq!(summary.total, 2);
    }

    #[tokio::test]
    async fn budget_in_a_batch_cancels_later_batches() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Scripted {
            budget_on: Some(1),
            fail_on: None,
            seen: Mutex::new(vec![]),
        });
        let summary = orchestrator(dir.path(), runner.clone(), Some(2))
            .run(&[1, 2, 3, 4])
            .await
            .unwrap();

        let mut seen = runner.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(summary.not_started, 2);
        assert!(summary.budget_exceeded);
    }
}
