//! Chapter and batch orchestration.

pub mod batch;
pub mod chapter;
pub mod checkpoint;

pub use batch::{
    BatchOptions, BatchOrchestrator, BatchSummary, ChapterOutcome, ChapterRunner, ChapterStatus,
};
pub use chapter::{
    ChapterError, ChapterOrchestrator, ChapterReport, DocumentStatus, Phase, PhaseOptions,
    PhaseOutcome,
};
pub use checkpoint::Checkpoint;
