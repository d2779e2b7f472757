//! Budget-aware generation call wrapper.

use std::sync::Arc;

use crate::budget::CostLedger;

use super::{GenerationError, GenerationRequest, GenerationResponse, ServiceError, TextGenerator};

/// Issues single generation calls and accounts for them in the ledger.
#[derive(Clone)]
pub struct GenerationCaller {
    generator: Arc<dyn TextGenerator>,
    ledger: Arc<CostLedger>,
    model: String,
}

impl std::fmt::Debug for GenerationCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCaller")
            .field("generator", &self.generator.name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GenerationCaller {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        ledger: Arc<CostLedger>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            ledger,
            model: model.into(),
        }
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Issue exactly one request and return its output text.
    ///
    /// Refuses to call when the ledger is already over its ceiling. Usage of
    /// a completed call is always tracked; if that tracking crosses the
    /// ceiling the text is discarded and `BudgetExceeded` returned. A reply
    /// with no text is tracked, then reported as `EmptyResponse`.
    pub async fn call(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
        context: Option<&str>,
    ) -> Result<String, GenerationError> {
        self.call_with_usage(prompt, max_tokens, temperature, context)
            .await
            .map(|resp| resp.text)
    }

    /// Like [`Self::call`] but keeps the token usage.
    pub async fn call_with_usage(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
        context: Option<&str>,
    ) -> Result<GenerationResponse, GenerationError> {
        self.ledger.ensure_within_budget()?;

        let request = GenerationRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            max_tokens,
            temperature,
            context: context.map(str::to_string),
        };
        let response = self.generator.generate(&request).await?;

        let total = self.ledger.track(
            &self.model,
            response.input_tokens,
            response.output_tokens,
        )?;
        tracing::debug!(
            model = %self.model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cumulative_cost = total,
            "generation call tracked"
        );
        if response.text.is_empty() {
            return Err(ServiceError::EmptyResponse.into());
        }
        Ok(response)
    }
}
