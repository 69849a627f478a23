//! Pricing table for cost estimation.
//!
//! Prices are in USD per 1 million tokens. Each model has an input and an
//! output price; models not in the table fall back to a conservative
//! default rate instead of erroring. The table is built once (optionally
//! from config overrides) and read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    /// Create a new pricing entry.
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 * self.input_per_m + completion_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Conservative rate applied to models the table does not know.
const FALLBACK_PRICING: ModelPricing = ModelPricing {
    input_per_m: 0.01,
    output_per_m: 0.01,
};

/// Pricing table with built-in defaults and a fallback for unknown models.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
    fallback: ModelPricing,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        prices.insert("gpt-4o".into(), ModelPricing::new(2.5, 10.0));
        prices.insert("gpt-4o-mini".into(), ModelPricing::new(0.15, 0.6));
        prices.insert("gpt-4-turbo".into(), ModelPricing::new(10.0, 30.0));
        prices.insert("gpt-4".into(), ModelPricing::new(30.0, 60.0));
        prices.insert("gpt-3.5-turbo".into(), ModelPricing::new(0.5, 1.5));
        prices.insert("o1".into(), ModelPricing::new(15.0, 60.0));
        prices.insert("o1-mini".into(), ModelPricing::new(3.0, 12.0));
        prices.insert("o3-mini".into(), ModelPricing::new(1.1, 4.4));

        Self {
            prices,
            fallback: FALLBACK_PRICING,
        }
    }

    /// Create an empty pricing table (fallback rate only).
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
            fallback: FALLBACK_PRICING,
        }
    }

    /// Add or update pricing for a model.
    pub fn set(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.prices.insert(model.into(), pricing);
    }

    /// Look up pricing for a model. Returns None if not found.
    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.prices.get(model)
    }

    /// The rate used for unknown models.
    pub fn fallback(&self) -> &ModelPricing {
        &self.fallback
    }

    /// Estimate cost for a call. Pure and infallible.
    ///
    /// Matching: exact name first, then longest prefix match so versioned
    /// ids like `gpt-4o-mini-2024-07-18` price as `gpt-4o-mini`, then the
    /// fallback rate.
    pub fn estimate(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        if let Some(p) = self.prices.get(model) {
            return p.cost(prompt_tokens, completion_tokens);
        }

        let model_lower = model.to_lowercase();
        let mut best: Option<(&str, &ModelPricing)> = None;
        for (key, pricing) in &self.prices {
            if model_lower.starts_with(&key.to_lowercase())
                && best.is_none_or(|(k, _)| key.len() > k.len())
            {
                best = Some((key.as_str(), pricing));
            }
        }

        best.map_or(&self.fallback, |(_, p)| p)
            .cost(prompt_tokens, completion_tokens)
    }

    /// List all known model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of models in the pricing table.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Whether the table has no explicit entries.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
