// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Closed set of vendor adapters.

use recap_llm_anthropic::AnthropicClient;
use recap_llm_core::{
	GenerationRequest, GenerationResult, LlmError, ModelCatalog, ModelPricing, Provider,
	ProviderCapabilities, ProviderConfig,
};
use recap_llm_google::GoogleClient;
use recap_llm_openai::OpenAiClient;

/// One vendor client, selected by [`Provider`].
#[derive(Debug)]
pub enum ProviderAdapter {
	OpenAi(OpenAiClient),
	Anthropic(AnthropicClient),
	Google(GoogleClient),
}

impl ProviderAdapter {
	pub fn build(config: ProviderConfig) -> Result<Self, LlmError> {
		Ok(match config.provider {
			Provider::OpenAi => ProviderAdapter::OpenAi(OpenAiClient::new(config)?),
			Provider::Anthropic => ProviderAdapter::Anthropic(AnthropicClient::new(config)?),
			Provider::Google => ProviderAdapter::Google(GoogleClient::new(config)?),
		})
	}

	pub fn provider(&self) -> Provider {
		match self {
			ProviderAdapter::OpenAi(c) => c.provider(),
			ProviderAdapter::Anthropic(c) => c.provider(),
			ProviderAdapter::Google(c) => c.provider(),
		}
	}

	pub fn model(&self) -> &str {
		match self {
			ProviderAdapter::OpenAi(c) => c.model(),
			ProviderAdapter::Anthropic(c) => c.model(),
			ProviderAdapter::Google(c) => c.model(),
		}
	}

	/// `Ok(true)` when the vendor accepted the key, `Ok(false)` when the
	/// check was inconclusive.
	pub async fn validate(&self) -> Result<bool, LlmError> {
		match self {
			ProviderAdapter::OpenAi(c) => c.validate().await,
			ProviderAdapter::Anthropic(c) => c.validate().await,
			ProviderAdapter::Google(c) => c.validate().await,
		}
	}

	pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
		match self {
			ProviderAdapter::OpenAi(c) => c.generate(request).await,
			ProviderAdapter::Anthropic(c) => c.generate(request).await,
			ProviderAdapter::Google(c) => c.generate(request).await,
		}
	}

	pub fn estimate_tokens(&self, text: &str) -> u32 {
		match self {
			ProviderAdapter::OpenAi(c) => c.estimate_tokens(text),
			ProviderAdapter::Anthropic(c) => c.estimate_tokens(text),
			ProviderAdapter::Google(c) => c.estimate_tokens(text),
		}
	}

	pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
		match self {
			ProviderAdapter::OpenAi(c) => c.estimate_cost(input_tokens, output_tokens),
			ProviderAdapter::Anthropic(c) => c.estimate_cost(input_tokens, output_tokens),
			ProviderAdapter::Google(c) => c.estimate_cost(input_tokens, output_tokens),
		}
	}

	pub fn capabilities(&self) -> ProviderCapabilities {
		match self {
			ProviderAdapter::OpenAi(c) => c.capabilities(),
			ProviderAdapter::Anthropic(c) => c.capabilities(),
			ProviderAdapter::Google(c) => c.capabilities(),
		}
	}
}

pub fn catalog(provider: Provider) -> &'static ModelCatalog {
	match provider {
		Provider::OpenAi => &recap_llm_openai::CATALOG,
		Provider::Anthropic => &recap_llm_anthropic::CATALOG,
		Provider::Google => &recap_llm_google::CATALOG,
	}
}

/// Static price of `model` (or the vendor default) without building a
/// client. Unknown models price as the vendor default.
pub fn reference_pricing(provider: Provider, model: Option<&str>) -> ModelPricing {
	let catalog = catalog(provider);
	match model {
		Some(model) => catalog.resolve(model).0.pricing,
		None => catalog.default_model().pricing,
	}
}

/// Builds a throwaway adapter and runs its key check.
pub async fn validate_key(config: ProviderConfig) -> Result<bool, LlmError> {
	ProviderAdapter::build(config)?.validate().await
}
