// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use recap_llm_core::{ModelCatalog, ModelPricing, ModelSpec, Provider};

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Characters per token for local estimates.
pub const CHARS_PER_TOKEN: f64 = 4.0;

const MODELS: &[ModelSpec] = &[
	ModelSpec {
		name: DEFAULT_MODEL,
		pricing: ModelPricing::new(0.005, 0.015),
		max_output_tokens: 128_000,
		context_window: 128_000,
	},
	ModelSpec {
		name: "gpt-4o-mini",
		pricing: ModelPricing::new(0.00015, 0.0006),
		max_output_tokens: 128_000,
		context_window: 128_000,
	},
	ModelSpec {
		name: "gpt-4-turbo",
		pricing: ModelPricing::new(0.01, 0.03),
		max_output_tokens: 128_000,
		context_window: 128_000,
	},
	ModelSpec {
		name: "gpt-4",
		pricing: ModelPricing::new(0.03, 0.06),
		max_output_tokens: 8192,
		context_window: 8192,
	},
	ModelSpec {
		name: "gpt-3.5-turbo",
		pricing: ModelPricing::new(0.0015, 0.002),
		max_output_tokens: 16_384,
		context_window: 16_384,
	},
];

pub const CATALOG: ModelCatalog = ModelCatalog::new(Provider::OpenAi, MODELS);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_model_is_first() {
		assert_eq!(CATALOG.default_model().name, DEFAULT_MODEL);
		assert_eq!(CATALOG.models.len(), 5);
	}
}
