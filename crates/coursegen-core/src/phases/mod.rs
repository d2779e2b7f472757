//! Post-generation phases run by the chapter orchestrator.
//!
//! Each phase reads the chapter's documents from the store, may issue
//! generation calls, writes its own JSON report next to the documents, and
//! returns that report. Budget exhaustion is surfaced separately from every
//! other failure so the orchestrator can stop the run.

pub mod check_edit;
pub mod export;
pub mod polish;
pub mod revise;

use crate::budget::BudgetExceeded;
use crate::llm::GenerationError;
use crate::store::StoreError;

pub use check_edit::{CheckEditReport, Review};
pub use export::{Exporter, ExportReport, ManifestExporter};
pub use polish::PolishReport;
pub use revise::ReviseReport;

#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<GenerationError> for PhaseError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::BudgetExceeded(b) => PhaseError::BudgetExceeded(b),
            GenerationError::Service(s) => PhaseError::Other(s.into()),
        }
    }
}

impl From<StoreError> for PhaseError {
    fn from(e: StoreError) -> Self {
        PhaseError::Other(e.into())
    }
}
