// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Cost estimation for completion results
//!
//! Billing itself lives elsewhere; the orchestrator only needs a
//! `cost(model_id, input, output)` function to annotate results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Price per 1,000 tokens for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// External cost collaborator
pub trait CostEstimator: Send + Sync {
    /// Cost of a call with the given input and output sizes (in tokens).
    fn cost(&self, model_id: &str, input: u32, output: u32) -> f64;
}

/// Static price table; unknown models cost nothing.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<String, ModelPrice>,
}

impl PriceTable {
    pub fn new(prices: HashMap<String, ModelPrice>) -> Self {
        Self { prices }
    }

    pub fn price(&self, model_id: &str) -> Option<&ModelPrice> {
        self.prices.get(model_id)
    }
}

impl CostEstimator for PriceTable {
    fn cost(&self, model_id: &str, input: u32, output: u32) -> f64 {
        match self.price(model_id) {
            Some(price) => {
                (input as f64 * price.input_per_1k + output as f64 * price.output_per_1k) / 1000.0
            }
            None => 0.0,
        }
    }
}

/// Rough token count when the provider reports no usage.
///
/// CJK unified ideographs count as two tokens, every other char as one.
pub fn estimate_tokens(text: &str) -> u32 {
    text.chars()
        .map(|c| if ('\u{4e00}'..='\u{9fa5}').contains(&c) { 2 } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PriceTable {
        let mut prices = HashMap::new();
        prices.insert(
            "gpt-4".to_string(),
            ModelPrice {
                input_per_1k: 0.03,
                output_per_1k: 0.06,
            },
        );
        PriceTable::new(prices)
    }

    #[test]
    fn test_cost_known_model() {
        let cost = table().cost("gpt-4", 1000, 500);
        assert!((cost - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_cost_unknown_model_is_zero() {
        assert_eq!(table().cost("mystery", 1000, 1000), 0.0);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("hello"), 5);
        assert_eq!(estimate_tokens("你好"), 4);
        assert_eq!(estimate_tokens("hi 你好"), 7);
    }
}
