//! Shared test utilities for coursegen integration tests.
//!
//! [`ScriptedGenerator`] stands in for the generation service: a closure
//! decides each reply from the request, every request is recorded, and each
//! reply reports a fixed token usage so ledger behaviour is predictable.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use coursegen_core::budget::{CostLedger, PriceTable};
use coursegen_core::curriculum::Curriculum;
use coursegen_core::llm::{
    GenerationCaller, GenerationRequest, GenerationResponse, ServiceError, TextGenerator,
};
use coursegen_core::store::ChapterStore;

/// Model name used by [`caller`]; priced by the default price table.
pub const TEST_MODEL: &str = coursegen_core::budget::pricing::DEFAULT_MODEL;

type Script = dyn Fn(&GenerationRequest) -> Result<String, ServiceError> + Send + Sync;

/// Scripted [`TextGenerator`] double.
pub struct ScriptedGenerator {
    script: Box<Script>,
    input_tokens: u64,
    output_tokens: u64,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(
        script: impl Fn(&GenerationRequest) -> Result<String, ServiceError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            input_tokens: 100,
            output_tokens: 100,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with `text`.
    pub fn constant(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Token usage reported for every reply.
    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        let text = (self.script)(request)?;
        Ok(GenerationResponse {
            text,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        })
    }
}

/// Caller over `generator` with a fresh ledger at `ceiling` dollars.
pub fn caller(generator: Arc<ScriptedGenerator>, ceiling: f64) -> GenerationCaller {
    let ledger = Arc::new(CostLedger::new(PriceTable::default(), ceiling));
    GenerationCaller::new(generator, ledger, TEST_MODEL)
}

/// Three-chapter curriculum with domain context.
pub fn sample_curriculum() -> Curriculum {
    Curriculum::from_json(
        r#"{
            "title": "Web Services in Practice",
            "chapters": [
                {
                    "number": 1,
                    "title": "Intro",
                    "part": "Foundations",
                    "learningObjectives": ["Explain X"],
                    "topics": ["X basics"]
                },
                {
                    "number": 2,
                    "title": "Routing",
                    "part": "Foundations",
                    "learningObjectives": ["Define routes", "Explain middleware ordering"],
                    "topics": ["Route tables", "Middleware"]
                },
                {
                    "number": 3,
                    "title": "Persistence",
                    "part": "Data",
                    "learningObjectives": ["Store records"],
                    "topics": ["Repositories"]
                }
            ],
            "domain": {
                "technology": ["Rust", "PostgreSQL"],
                "entities": ["Order", "Customer"],
                "scenarios": ["Checkout flow"]
            }
        }"#,
    )
    .expect("sample curriculum is valid")
}

/// Store rooted in a fresh temporary directory; keep the `TempDir` alive.
pub fn temp_store() -> (TempDir, ChapterStore) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let store = ChapterStore::new(dir.path());
    (dir, store)
}
