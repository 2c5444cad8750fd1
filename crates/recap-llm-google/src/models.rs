// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use recap_llm_core::{ModelCatalog, ModelPricing, ModelSpec, Provider};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

pub const CHARS_PER_TOKEN: f64 = 4.0;

const MODELS: &[ModelSpec] = &[
	ModelSpec {
		name: DEFAULT_MODEL,
		pricing: ModelPricing::new(0.00075, 0.003),
		max_output_tokens: 8192,
		context_window: 1_000_000,
	},
	ModelSpec {
		name: "gemini-1.5-pro",
		pricing: ModelPricing::new(0.0035, 0.0105),
		max_output_tokens: 8192,
		context_window: 2_000_000,
	},
	ModelSpec {
		name: "gemini-1.0-pro",
		pricing: ModelPricing::new(0.0005, 0.0015),
		max_output_tokens: 2048,
		context_window: 32_000,
	},
];

pub const CATALOG: ModelCatalog = ModelCatalog::new(Provider::Google, MODELS);
