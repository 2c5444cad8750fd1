// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use recap_llm_core::{ModelCatalog, ModelPricing, ModelSpec, Provider};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Cheapest model; used for the one-token key check.
pub const VALIDATION_MODEL: &str = "claude-3-haiku-20240307";

pub const CHARS_PER_TOKEN: f64 = 3.5;

const CONTEXT_WINDOW: u32 = 200_000;

const MODELS: &[ModelSpec] = &[
	ModelSpec {
		name: DEFAULT_MODEL,
		pricing: ModelPricing::new(0.003, 0.015),
		max_output_tokens: 8192,
		context_window: CONTEXT_WINDOW,
	},
	ModelSpec {
		name: "claude-3-opus-20240229",
		pricing: ModelPricing::new(0.015, 0.075),
		max_output_tokens: 4096,
		context_window: CONTEXT_WINDOW,
	},
	ModelSpec {
		name: "claude-3-sonnet-20240229",
		pricing: ModelPricing::new(0.003, 0.015),
		max_output_tokens: 4096,
		context_window: CONTEXT_WINDOW,
	},
	ModelSpec {
		name: VALIDATION_MODEL,
		pricing: ModelPricing::new(0.00025, 0.00125),
		max_output_tokens: 4096,
		context_window: CONTEXT_WINDOW,
	},
];

pub const CATALOG: ModelCatalog = ModelCatalog::new(Provider::Anthropic, MODELS);
