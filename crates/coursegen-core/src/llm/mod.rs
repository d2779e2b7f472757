//! Generation-service boundary.
//!
//! [`TextGenerator`] is the adapter interface for a text-generation backend
//! (the Anthropic Messages API in production, scripted doubles in tests).
//! [`GenerationCaller`] wraps one generator together with the shared
//! [`CostLedger`] and is the only way the rest of the crate issues calls:
//! it checks the ledger before every request and routes usage into it
//! afterwards.

pub mod anthropic;
pub mod caller;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::budget::BudgetExceeded;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use caller::GenerationCaller;
pub use retry::RetryPolicy;

/// One bounded request to the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Prior-pass preview or running outline, sent as the system prompt.
    pub context: Option<String>,
}

/// Output text and token usage of one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Failures reported by a [`TextGenerator`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode service response: {0}")]
    Decode(String),

    #[error("service returned no text content")]
    EmptyResponse,

    #[error("giving up after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<ServiceError>,
    },

    #[error("generation service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Transport failures, rate limiting and server-side errors are worth
    /// another attempt; everything else is returned immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Http(_) => true,
            ServiceError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Error type of every generation call made through [`GenerationCaller`].
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Run-fatal: no further calls may be issued anywhere.
    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),

    /// Fatal to the document being produced.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl GenerationError {
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, GenerationError::BudgetExceeded(_))
    }

    pub fn budget_exceeded(&self) -> Option<BudgetExceeded> {
        match self {
            GenerationError::BudgetExceeded(b) => Some(*b),
            GenerationError::Service(_) => None,
        }
    }
}

/// Adapter interface for text-generation backends.
///
/// Object-safe so it can be shared as `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Issue exactly one request and return its text and usage.
    async fn generate(&self, request: &GenerationRequest)
    -> Result<GenerationResponse, ServiceError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn TextGenerator) {}
};
