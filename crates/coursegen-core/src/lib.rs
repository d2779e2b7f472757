//! Core of the curriculum generator: cost ledger, generation-service
//! adapters, the multi-pass document generator, quality analysis and
//! remediation, post-generation phases, and chapter/batch orchestration.

pub mod budget;
pub mod curriculum;
pub mod document;
pub mod enhance;
pub mod generator;
pub mod llm;
pub mod orchestrator;
pub mod phases;
pub mod quality;
pub mod safety;
pub mod store;
pub mod text;
pub mod validate;

pub use budget::{BudgetExceeded, CostLedger, CostSummary, PriceTable};
pub use llm::GenerationError;
