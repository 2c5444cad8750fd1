// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Static per-model price tables and capability reporting.

use serde::Serialize;

use crate::provider::Provider;

/// Round a USD amount to six decimal places.
pub fn round_usd(value: f64) -> f64 {
	(value * 1_000_000.0).round() / 1_000_000.0
}

/// Heuristic token count: characters divided by `chars_per_token`, never
/// less than one.
pub fn estimate_tokens_by_ratio(text: &str, chars_per_token: f64) -> u32 {
	let chars = text.chars().count() as f64;
	((chars / chars_per_token) as u32).max(1)
}

/// USD price per 1,000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPricing {
	pub input_per_1k: f64,
	pub output_per_1k: f64,
}

impl ModelPricing {
	pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
		Self {
			input_per_1k,
			output_per_1k,
		}
	}

	pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
		let input = f64::from(input_tokens) / 1000.0 * self.input_per_1k;
		let output = f64::from(output_tokens) / 1000.0 * self.output_per_1k;
		round_usd(input + output)
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
	pub name: &'static str,
	pub pricing: ModelPricing,
	pub max_output_tokens: u32,
	pub context_window: u32,
}

/// A vendor's model table. The first entry is the vendor default and the
/// fallback for unknown model names.
#[derive(Debug, Clone, Copy)]
pub struct ModelCatalog {
	pub provider: Provider,
	pub models: &'static [ModelSpec],
}

impl ModelCatalog {
	pub const fn new(provider: Provider, models: &'static [ModelSpec]) -> Self {
		Self { provider, models }
	}

	pub fn default_model(&self) -> &'static ModelSpec {
		&self.models[0]
	}

	pub fn get(&self, model: &str) -> Option<&'static ModelSpec> {
		self.models.iter().find(|spec| spec.name == model)
	}

	/// Looks up `model`, returning the default entry and `false` when the
	/// name is unknown.
	pub fn resolve(&self, model: &str) -> (&'static ModelSpec, bool) {
		match self.get(model) {
			Some(spec) => (spec, true),
			None => (self.default_model(), false),
		}
	}

	pub fn model_names(&self) -> Vec<String> {
		self.models.iter().map(|spec| spec.name.to_string()).collect()
	}
}

/// What a configured adapter can do, reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderCapabilities {
	pub provider: Provider,
	pub model: String,
	pub max_output_tokens: u32,
	pub context_window: u32,
	pub supports_system_message: bool,
	pub supports_streaming: bool,
	pub available_models: Vec<String>,
	pub pricing: ModelPricing,
}
