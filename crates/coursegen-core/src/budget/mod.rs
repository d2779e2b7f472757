//! Run-wide cost ledger with a hard spending ceiling.
//!
//! The ledger is constructed once per run and shared (via `Arc`) by every
//! component that issues generation calls. Updates happen under a mutex so
//! that concurrent chapters cannot race past the ceiling on stale totals:
//! each tracked call adds its cost and compares against the ceiling in one
//! critical section.
//!
//! Once the cumulative cost exceeds the ceiling the ledger stays exceeded
//! (cost only grows) until the ceiling is raised or the ledger is reset.

pub mod pricing;

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

pub use pricing::{DEFAULT_MODEL, ModelPrice, PriceTable};

/// Ceiling used when none is configured, in dollars.
pub const DEFAULT_CEILING_USD: f64 = 5.00;

/// Raised when cumulative spend is over the ceiling.
///
/// The ledger has already recorded the cost that caused the crossing;
/// callers must stop issuing new generation calls.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("budget exceeded: ${cost:.4} > ${ceiling:.2} (over by ${:.4})", self.overage())]
pub struct BudgetExceeded {
    /// Cumulative cost at the time of the failure.
    pub cost: f64,
    /// Ceiling in force at the time of the failure.
    pub ceiling: f64,
}

impl BudgetExceeded {
    pub fn overage(&self) -> f64 {
        self.cost - self.ceiling
    }
}

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_cost: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub calls: u64,
    pub ceiling: f64,
    pub remaining: f64,
    pub percent_used: f64,
}

#[derive(Debug, Default)]
struct LedgerState {
    cost: f64,
    input_tokens: u64,
    output_tokens: u64,
    calls: u64,
}

/// Shared running total of generation spend.
#[derive(Debug)]
pub struct CostLedger {
    prices: PriceTable,
    ceiling: Mutex<f64>,
    state: Mutex<LedgerState>,
}

impl CostLedger {
    pub fn new(prices: PriceTable, ceiling: f64) -> Self {
        Self {
            prices,
            ceiling: Mutex::new(ceiling),
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Ledger with the default price table and the given ceiling.
    pub fn with_ceiling(ceiling: f64) -> Self {
        Self::new(PriceTable::default(), ceiling)
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Record one call's usage and return the new cumulative cost.
    ///
    /// Unknown models are not priced: the call is logged and the current
    /// total returned unchanged. Once the ledger is over its ceiling every
    /// call fails, whatever the model; usage of priced models is still
    /// recorded first so the overage is never dropped.
    pub fn track(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<f64, BudgetExceeded> {
        let ceiling = self.ceiling();
        let mut state = self.lock_state();

        let Some(price) = self.prices.get(model) else {
            tracing::warn!(model = %model, "unknown model, cannot track cost");
            if state.cost > ceiling {
                return Err(BudgetExceeded {
                    cost: state.cost,
                    ceiling,
                });
            }
            return Ok(state.cost);
        };

        state.cost += price.cost(input_tokens, output_tokens);
        state.input_tokens += input_tokens;
        state.output_tokens += output_tokens;
        state.calls += 1;

        if state.cost > ceiling {
            return Err(BudgetExceeded {
                cost: state.cost,
                ceiling,
            });
        }
        Ok(state.cost)
    }

    /// Fail if the ledger is already over its ceiling.
    ///
    /// Checked before every new generation call.
    pub fn ensure_within_budget(&self) -> Result<(), BudgetExceeded> {
        let ceiling = self.ceiling();
        let state = self.lock_state();
        if state.cost > ceiling {
            return Err(BudgetExceeded {
                cost: state.cost,
                ceiling,
            });
        }
        Ok(())
    }

    pub fn is_exceeded(&self) -> bool {
        self.ensure_within_budget().is_err()
    }

    /// Replace the ceiling. Past calls are not re-evaluated.
    pub fn set_ceiling(&self, limit: f64) {
        *self.ceiling.lock().unwrap_or_else(|e| e.into_inner()) = limit;
        tracing::info!(ceiling = limit, "budget ceiling set");
    }

    pub fn ceiling(&self) -> f64 {
        *self.ceiling.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn total_cost(&self) -> f64 {
        self.lock_state().cost
    }

    /// Zero all counters, keeping prices and ceiling.
    pub fn reset(&self) {
        *self.lock_state() = LedgerState::default();
        tracing::info!("cost tracking reset");
    }

    pub fn summary(&self) -> CostSummary {
        let ceiling = self.ceiling();
        let state = self.lock_state();
        let percent_used = if ceiling > 0.0 {
            state.cost / ceiling * 100.0
        } else {
            0.0
        };
        CostSummary {
            total_cost: state.cost,
            input_tokens: state.input_tokens,
            output_tokens: state.output_tokens,
            total_tokens: state.input_tokens + state.output_tokens,
            calls: state.calls,
            ceiling,
            remaining: ceiling - state.cost,
            percent_used,
        }
    }

    /// One-line display, e.g. `$1.2345 / $5.00 (24.7%)`.
    pub fn inline(&self) -> String {
        let s = self.summary();
        format!(
            "${:.4} / ${:.2} ({:.1}%)",
            s.total_cost, s.ceiling, s.percent_used
        )
    }

    fn lock_state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for CostLedger {
    fn default() -> Self {
        Self::with_ceiling(DEFAULT_CEILING_USD)
    }
}
