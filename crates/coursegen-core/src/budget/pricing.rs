//! Static per-model price table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Dollar rates for one model, quoted per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPrice {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Cost in dollars of a single call with the given usage.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_million
            + output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Lookup table from model identifier to [`ModelPrice`].
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    prices: HashMap<String, ModelPrice>,
}

impl PriceTable {
    /// An empty table. Every model is unknown.
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Add or replace the price for `model`.
    pub fn insert(&mut self, model: impl Into<String>, price: ModelPrice) -> Option<ModelPrice> {
        self.prices.insert(model.into(), price)
    }

    /// Builder-style [`Self::insert`].
    pub fn with(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.insert(model, price);
        self
    }

    pub fn get(&self, model: &str) -> Option<ModelPrice> {
        self.prices.get(model).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PriceTable {
    /// Published rates for the default model ($0.80 in / $4.00 out per million).
    fn default() -> Self {
        Self::empty().with(DEFAULT_MODEL, ModelPrice::new(0.80, 4.00))
    }
}
