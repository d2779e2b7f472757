//! Per-chapter state machine.
//!
//! `Generating → CheckEdit → ReviseExtend → Polish → Export → Done`. A failed
//! document skips every later phase. A failed phase is recorded and the next
//! phase still runs. Budget exhaustion stops the chapter after the report has
//! been written.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::budget::{BudgetExceeded, CostSummary};
use crate::curriculum::{Chapter, Curriculum, CurriculumError};
use crate::document::DocumentKind;
use crate::enhance::EnhancementApplier;
use crate::generator::{ChapterInputs, DocumentGenerator, DocumentPlan};
use crate::llm::GenerationCaller;
use crate::phases::{self, Exporter, ManifestExporter, PhaseError};
use crate::store::{ChapterStore, StoreError, sha256_hex};

pub const REPORT_FILE: &str = "generation-report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Generating,
    CheckEdit,
    ReviseExtend,
    Polish,
    Export,
    Done,
}

impl Phase {
    /// The optional phases, in execution order.
    pub const POST_GENERATION: [Phase; 4] = [
        Phase::CheckEdit,
        Phase::ReviseExtend,
        Phase::Polish,
        Phase::Export,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Generating => "generating",
            Phase::CheckEdit => "check-edit",
            Phase::ReviseExtend => "revise-extend",
            Phase::Polish => "polish",
            Phase::Export => "export",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator switches for the optional phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseOptions {
    pub skip_check_edit: bool,
    pub skip_revise: bool,
    pub skip_polish: bool,
    pub skip_export: bool,
}

impl PhaseOptions {
    pub fn runs(&self, phase: Phase) -> bool {
        match phase {
            Phase::CheckEdit => !self.skip_check_edit,
            Phase::ReviseExtend => !self.skip_revise,
            Phase::Polish => !self.skip_polish,
            Phase::Export => !self.skip_export,
            Phase::Generating | Phase::Done => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Generated,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document: DocumentKind,
    pub file: String,
    #[serde(flatten)]
    pub status: DocumentStatus,
    pub bytes: usize,
    pub duration_ms: u64,
    pub passes: usize,
    pub units: Option<u32>,
    pub warnings: Vec<String>,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PhaseOutcome {
    Completed { summary: String },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    #[serde(flatten)]
    pub outcome: PhaseOutcome,
    pub duration_ms: u64,
}

/// Contents of [`REPORT_FILE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterReport {
    pub chapter: u32,
    pub title: String,
    pub documents: Vec<DocumentRecord>,
    pub phases: Vec<PhaseRecord>,
    /// One entry per failed document.
    pub errors: Vec<String>,
    pub budget_exceeded: Option<String>,
    pub elapsed_secs: f64,
    pub cost: CostSummary,
    pub timestamp: DateTime<Utc>,
}

impl ChapterReport {
    /// Every document was generated and the budget held.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.budget_exceeded.is_none()
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|r| r.phase == phase)
            .map(|r| &r.outcome)
    }

    pub fn document(&self, kind: DocumentKind) -> Option<&DocumentRecord> {
        self.documents.iter().find(|d| d.document == kind)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChapterError {
    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),

    #[error(transparent)]
    Curriculum(#[from] CurriculumError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives one chapter through every phase.
pub struct ChapterOrchestrator {
    curriculum: Arc<Curriculum>,
    store: ChapterStore,
    generator: DocumentGenerator,
    applier: EnhancementApplier,
    exporters: Vec<Arc<dyn Exporter>>,
    options: PhaseOptions,
}

impl fmt::Debug for ChapterOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChapterOrchestrator")
            .field("store", &self.store)
            .field("options", &self.options)
            .field(
                "exporters",
                &self.exporters.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ChapterOrchestrator {
    pub fn new(
        curriculum: Arc<Curriculum>,
        store: ChapterStore,
        caller: GenerationCaller,
        options: PhaseOptions,
    ) -> Self {
        Self {
            curriculum,
            store,
            generator: DocumentGenerator::new(caller.clone()),
            applier: EnhancementApplier::new(caller),
            exporters: vec![Arc::new(ManifestExporter)],
            options,
        }
    }

    /// Replace the default manifest exporter.
    pub fn with_exporters(mut self, exporters: Vec<Arc<dyn Exporter>>) -> Self {
        self.exporters = exporters;
        self
    }

    pub fn caller(&self) -> &GenerationCaller {
        self.generator.caller()
    }

    pub fn store(&self) -> &ChapterStore {
        &self.store
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    /// Run chapter `number` to `Done` and write [`REPORT_FILE`].
    pub async fn run(&self, number: u32) -> Result<ChapterReport, ChapterError> {
        let started = Instant::now();
        let chapter = self.curriculum.chapter(number)?.clone();
        self.store.ensure_chapter_dir(number).await?;
        tracing::info!(chapter = number, title = %chapter.title, "chapter started");

        let mut report = ChapterReport {
            chapter: number,
            title: chapter.title.clone(),
            documents: Vec::new(),
            phases: Vec::new(),
            errors: Vec::new(),
            budget_exceeded: None,
            elapsed_secs: 0.0,
            cost: self.caller().ledger().summary(),
            timestamp: Utc::now(),
        };

        if let Err(exceeded) = self.generate_documents(&chapter, &mut report).await {
            return self.abort(report, started, exceeded).await;
        }
        let failed = report.errors.len();
        report.phases.push(PhaseRecord {
            phase: Phase::Generating,
            outcome: if failed == 0 {
                PhaseOutcome::Completed {
                    summary: format!("{} documents generated", report.documents.len()),
                }
            } else {
                PhaseOutcome::Failed {
                    error: format!("{failed} of {} documents failed", report.documents.len()),
                }
            },
            duration_ms: started.elapsed().as_millis() as u64,
        });

        for phase in Phase::POST_GENERATION {
            let phase_started = Instant::now();
            let outcome = if !report.errors.is_empty() {
                PhaseOutcome::Skipped {
                    reason: "document generation failed".to_string(),
                }
            } else if !self.options.runs(phase) {
                PhaseOutcome::Skipped {
                    reason: "disabled".to_string(),
                }
            } else {
                tracing::info!(chapter = number, %phase, "phase started");
                match self.run_phase(phase, &chapter).await {
                    Ok(summary) => PhaseOutcome::Completed { summary },
                    Err(PhaseError::BudgetExceeded(exceeded)) => {
                        report.phases.push(PhaseRecord {
                            phase,
                            outcome: PhaseOutcome::Failed {
                                error: exceeded.to_string(),
                            },
                            duration_ms: phase_started.elapsed().as_millis() as u64,
                        });
                        return self.abort(report, started, exceeded).await;
                    }
                    Err(PhaseError::Other(e)) => {
                        let error = format!("{e:#}");
                        tracing::warn!(chapter = number, %phase, %error, "phase failed, continuing");
                        PhaseOutcome::Failed { error }
                    }
                }
            };
            report.phases.push(PhaseRecord {
                phase,
                outcome,
                duration_ms: phase_started.elapsed().as_millis() as u64,
            });
        }

        self.finish(&mut report, started).await?;
        tracing::info!(
            chapter = number,
            success = report.is_success(),
            elapsed_secs = report.elapsed_secs,
            "chapter done"
        );
        Ok(report)
    }

    /// Generate every document kind in order. Only budget exhaustion stops
    /// the loop; any other failure is recorded and the next kind runs.
    async fn generate_documents(
        &self,
        chapter: &Chapter,
        report: &mut ChapterReport,
    ) -> Result<(), BudgetExceeded> {
        for kind in DocumentKind::ALL {
            let started = Instant::now();
            let mut inputs = ChapterInputs::new(chapter, &self.curriculum);
            for companion in DocumentPlan::for_kind(kind).companions {
                match self.store.read_document(chapter.number, *companion).await {
                    Ok(text) => inputs.companions.push((*companion, text)),
                    Err(e) => {
                        tracing::warn!(chapter = chapter.number, document = %kind, companion = %companion, error = %e, "companion unavailable");
                    }
                }
            }

            let result = match self.generator.generate(kind, &inputs).await {
                Ok(generated) => self
                    .store
                    .write_document(chapter.number, kind, &generated.content)
                    .await
                    .map(|_| generated)
                    .map_err(|e| e.to_string()),
                Err(e) => match e.budget_exceeded() {
                    Some(exceeded) => {
                        report.errors.push(format!("{kind}: {e}"));
                        report.documents.push(failed_record(kind, &e.to_string(), started));
                        return Err(exceeded);
                    }
                    None => Err(e.to_string()),
                },
            };

            match result {
                Ok(generated) => report.documents.push(DocumentRecord {
                    document: kind,
                    file: kind.file_name().to_string(),
                    status: DocumentStatus::Generated,
                    bytes: generated.content.len(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    passes: generated.passes,
                    units: generated.units.map(|u| u.total),
                    warnings: generated.warnings,
                    sha256: Some(sha256_hex(&generated.content)),
                }),
                Err(error) => {
                    tracing::error!(chapter = chapter.number, document = %kind, %error, "document failed");
                    report.errors.push(format!("{kind}: {error}"));
                    report.documents.push(failed_record(kind, &error, started));
                }
            }
        }
        Ok(())
    }

    async fn run_phase(&self, phase: Phase, chapter: &Chapter) -> Result<String, PhaseError> {
        let caller = self.caller();
        match phase {
            Phase::CheckEdit => {
                let r = phases::check_edit::run(caller, &self.store, chapter).await?;
                Ok(format!(
                    "{} components reviewed, {} issues",
                    r.components_reviewed,
                    r.issues.len()
                ))
            }
            Phase::ReviseExtend => {
                let r = phases::revise::run(&self.applier, &self.store, chapter).await?;
                Ok(format!(
                    "{} documents analyzed, {} revised",
                    r.analyzed.len(),
                    r.revisions.len()
                ))
            }
            Phase::Polish => {
                let r = phases::polish::run(caller, &self.store, chapter).await?;
                Ok(format!("{} documents polished", r.polished))
            }
            Phase::Export => {
                let r = phases::export::run(&self.store, chapter, &self.exporters).await?;
                Ok(format!(
                    "{} documents exported, {} normalized",
                    r.documents.len(),
                    r.normalized.len()
                ))
            }
            Phase::Generating | Phase::Done => Ok(String::new()),
        }
    }

    async fn abort(
        &self,
        mut report: ChapterReport,
        started: Instant,
        exceeded: BudgetExceeded,
    ) -> Result<ChapterReport, ChapterError> {
        tracing::error!(chapter = report.chapter, %exceeded, "budget exceeded, stopping chapter");
        report.budget_exceeded = Some(exceeded.to_string());
        self.finish(&mut report, started).await?;
        Err(exceeded.into())
    }

    async fn finish(&self, report: &mut ChapterReport, started: Instant) -> Result<(), StoreError> {
        report.elapsed_secs = started.elapsed().as_secs_f64();
        report.cost = self.caller().ledger().summary();
        report.timestamp = Utc::now();
        report.phases.push(PhaseRecord {
            phase: Phase::Done,
            outcome: PhaseOutcome::Completed {
                summary: format!("{} document errors", report.errors.len()),
            },
            duration_ms: 0,
        });
        self.store
            .write_chapter_json(report.chapter, REPORT_FILE, report)
            .await?;
        Ok(())
    }
}

fn failed_record(kind: DocumentKind, error: &str, started: Instant) -> DocumentRecord {
    DocumentRecord {
        document: kind,
        file: kind.file_name().to_string(),
        status: DocumentStatus::Failed {
            error: error.to_string(),
        },
        bytes: 0,
        duration_ms: started.elapsed().as_millis() as u64,
        passes: 0,
        units: None,
        warnings: Vec::new(),
        sha256: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_gate_only_optional_phases() {
        let options = PhaseOptions {
            skip_polish: true,
            ..PhaseOptions::default()
        };
        assert!(options.runs(Phase::Generating));
        assert!(options.runs(Phase::CheckEdit));
        assert!(options.runs(Phase::ReviseExtend));
        assert!(!options.runs(Phase::Polish));
        assert!(options.runs(Phase::Export));
        assert!(options.runs(Phase::Done));
    }

    #[test]
    fn phase_names_are_kebab_case() {
        assert_eq!(Phase::ReviseExtend.to_string(), "revise-extend");
        assert_eq!(
            serde_json::to_value(Phase::CheckEdit).unwrap(),
            serde_json::json!("check-edit")
        );
    }

    #[test]
    fn phase_record_flattens_outcome() {
        let record = PhaseRecord {
            phase: Phase::Polish,
            outcome: PhaseOutcome::Skipped {
                reason: "disabled".into(),
            },
            duration_ms: 0,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["phase"], "polish");
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "disabled");
    }
}
