//! Token usage aggregation and cost estimation (spec §4.1, §4.8).

use serde::{Deserialize, Serialize};

/// Token usage for one completion, or an aggregate across a run.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_input_tokens += other.cache_creation_input_tokens;
        self.cache_read_input_tokens += other.cache_read_input_tokens;
    }
}

/// Per-model usage breakdown entry, keyed by model name in the caller's map.
pub type ModelUsage = std::collections::HashMap<String, Usage>;

/// Price table entry: dollars per 1,000,000 tokens.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
}

/// A single completion's cost, derived from `ModelPricing` (spec §4.1).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CostEstimate(pub f64);

impl CostEstimate {
    pub fn compute(usage: &Usage, pricing: &ModelPricing) -> Self {
        let input_cost = usage.input_tokens as f64 / 1_000_000.0 * pricing.input_per_1m;
        let output_cost = usage.output_tokens as f64 / 1_000_000.0 * pricing.output_per_1m;
        Self(input_cost + output_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_add_accumulates_fields() {
        let mut total = Usage::default();
        total.add(&Usage {
            input_tokens: 5,
            output_tokens: 3,
            ..Default::default()
        });
        total.add(&Usage {
            input_tokens: 2,
            output_tokens: 1,
            ..Default::default()
        });
        assert_eq!(total.input_tokens, 7);
        assert_eq!(total.output_tokens, 4);
        assert_eq!(total.total_tokens(), 11);
    }

    #[test]
    fn cost_estimate_scales_by_per_million_price() {
        let usage = Usage {
            input_tokens: 1_000_000,
            output_tokens: 500_000,
            ..Default::default()
        };
        let pricing = ModelPricing {
            input_per_1m: 3.0,
            output_per_1m: 15.0,
        };
        let cost = CostEstimate::compute(&usage, &pricing);
        assert!((cost.0 - 10.5).abs() < 1e-9);
    }
}
