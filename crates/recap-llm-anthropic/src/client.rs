// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Anthropic client implementation.

use std::time::Instant;

use recap_common_secret::SecretString;
use recap_llm_core::{
	estimate_tokens_by_ratio, retry_after_secs, GenerationRequest, GenerationResult, LlmError,
	ModelSpec, Provider, ProviderCapabilities, ProviderConfig, RateLimiter, TokenUsage,
};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, error, info, instrument, warn};

use crate::models::{CATALOG, CHARS_PER_TOKEN, DEFAULT_MODEL, VALIDATION_MODEL};
use crate::types::{
	finish_reason, ErrorDetail, ErrorEnvelope, Message, MessagesRequest, MessagesResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const PROVIDER: Provider = Provider::Anthropic;

/// Anthropic caps temperature at 1.0.
const MAX_TEMPERATURE: f32 = 1.0;

/// Client for the Anthropic Messages API.
#[derive(Debug)]
pub struct AnthropicClient {
	api_key: SecretString,
	base_url: String,
	model: String,
	spec: &'static ModelSpec,
	max_tokens_default: u32,
	temperature_default: f32,
	http: Client,
	limiter: RateLimiter,
}

impl AnthropicClient {
	pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
		let http = recap_common_http::client_with_timeout(config.timeout).map_err(|e| {
			LlmError::Provider {
				provider: PROVIDER,
				status: None,
				message: format!("failed to build HTTP client: {e}"),
			}
		})?;

		let model = config
			.model
			.clone()
			.unwrap_or_else(|| DEFAULT_MODEL.to_string());
		let (spec, known) = CATALOG.resolve(&model);
		if !known {
			warn!(model = %model, pricing_model = spec.name, "Unknown Anthropic model, using default pricing");
		}

		info!(model = %model, "Initialized Anthropic client");

		Ok(Self {
			base_url: config.base_url_or(DEFAULT_BASE_URL),
			api_key: config.api_key,
			model,
			spec,
			max_tokens_default: config.max_tokens_default,
			temperature_default: config.temperature_default,
			http,
			limiter: RateLimiter::per_minute(config.rate_limit_per_minute),
		})
	}

	pub fn provider(&self) -> Provider {
		PROVIDER
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	/// Claude tokenizes denser than GPT models: about 3.5 characters per token.
	pub fn estimate_tokens(&self, text: &str) -> u32 {
		estimate_tokens_by_ratio(text, CHARS_PER_TOKEN)
	}

	pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
		self.spec.pricing.cost(input_tokens, output_tokens)
	}

	pub fn capabilities(&self) -> ProviderCapabilities {
		ProviderCapabilities {
			provider: PROVIDER,
			model: self.model.clone(),
			max_output_tokens: self.spec.max_output_tokens,
			context_window: self.spec.context_window,
			supports_system_message: true,
			supports_streaming: false,
			available_models: CATALOG.model_names(),
			pricing: self.spec.pricing,
		}
	}

	async fn post_messages(&self, body: &MessagesRequest) -> Result<MessagesResponse, LlmError> {
		let url = format!("{}/messages", self.base_url);
		debug!(url = %url, model = %body.model, max_tokens = body.max_tokens, "Sending request to Anthropic");

		let response = self
			.http
			.post(&url)
			.header("x-api-key", self.api_key.expose())
			.header("anthropic-version", ANTHROPIC_VERSION)
			.json(body)
			.send()
			.await
			.map_err(transport_error)?;

		if !response.status().is_success() {
			return Err(self.error_from_response(response, &body.model).await);
		}

		response
			.json::<MessagesResponse>()
			.await
			.map_err(|e| LlmError::Provider {
				provider: PROVIDER,
				status: None,
				message: format!("failed to parse response: {e}"),
			})
	}

	/// One-token message on the cheapest model.
	#[instrument(skip(self), fields(provider = %PROVIDER))]
	pub async fn validate(&self) -> Result<bool, LlmError> {
		let probe = MessagesRequest {
			model: VALIDATION_MODEL.to_string(),
			max_tokens: 1,
			messages: vec![Message::user("hi")],
			system: None,
			temperature: None,
			top_p: None,
		};

		match self.post_messages(&probe).await {
			Ok(_) => {
				debug!("Anthropic API key validated");
				Ok(true)
			}
			Err(
				err @ (LlmError::Authentication { .. }
				| LlmError::Connectivity { .. }
				| LlmError::Timeout { .. }),
			) => Err(err),
			Err(other) => {
				warn!(error = %other, "Anthropic key validation inconclusive");
				Ok(false)
			}
		}
	}

	#[instrument(skip(self, request), fields(provider = %PROVIDER, model = %self.model))]
	pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
		request.validate()?;

		let permit = self
			.limiter
			.try_acquire()
			.map_err(|wait| LlmError::RateLimited {
				provider: PROVIDER,
				retry_after_secs: Some(retry_after_secs(wait)),
			})?;

		let temperature = request
			.temperature
			.unwrap_or(self.temperature_default)
			.min(MAX_TEMPERATURE);
		let body = MessagesRequest {
			model: self.model.clone(),
			max_tokens: request.max_tokens.unwrap_or(self.max_tokens_default),
			messages: vec![Message::user(request.prompt.clone())],
			system: request.system_message.clone(),
			temperature: Some(temperature),
			top_p: request.top_p,
		};

		let started = Instant::now();
		let outcome = self.post_messages(&body).await;
		permit.commit();
		let response = outcome?;
		let latency_ms = started.elapsed().as_millis() as u64;

		let usage = TokenUsage {
			input_tokens: response.usage.input_tokens,
			output_tokens: response.usage.output_tokens,
		};
		let cost_usd = self.estimate_cost(usage.input_tokens, usage.output_tokens);

		info!(
			input_tokens = usage.input_tokens,
			output_tokens = usage.output_tokens,
			cost_usd,
			latency_ms,
			stop_reason = ?response.stop_reason,
			"Anthropic generation completed"
		);

		Ok(GenerationResult {
			text: response.text(),
			provider: PROVIDER,
			model: self.model.clone(),
			usage,
			finish_reason: finish_reason(response.stop_reason.as_deref()),
			cost_usd,
			latency_ms,
			fallback_from: None,
		})
	}

	async fn error_from_response(&self, response: Response, model: &str) -> LlmError {
		let status = response.status();
		let retry_after = response
			.headers()
			.get("retry-after")
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.parse::<u64>().ok());
		let body = response.text().await.unwrap_or_default();
		let detail = serde_json::from_str::<ErrorEnvelope>(&body)
			.ok()
			.map(|e| e.error);
		let message = detail
			.as_ref()
			.map(|d| d.message.clone())
			.unwrap_or_else(|| format!("HTTP {status}"));

		error!(
			status = %status,
			error_type = ?detail.as_ref().map(|d| d.error_type.as_str()),
			message = %message,
			"Anthropic API error"
		);

		classify_error(status, detail.as_ref(), message, retry_after, model)
	}
}

fn classify_error(
	status: StatusCode,
	detail: Option<&ErrorDetail>,
	message: String,
	retry_after: Option<u64>,
	model: &str,
) -> LlmError {
	if detail.is_some_and(|d| d.is_credit_exhausted()) {
		return LlmError::QuotaExceeded {
			provider: PROVIDER,
			message,
		};
	}

	match status {
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Authentication {
			provider: PROVIDER,
			message,
		},
		StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
			provider: PROVIDER,
			retry_after_secs: retry_after,
		},
		StatusCode::NOT_FOUND => LlmError::ModelNotFound {
			provider: PROVIDER,
			model: model.to_string(),
		},
		StatusCode::REQUEST_TIMEOUT => LlmError::Timeout { provider: PROVIDER },
		// 529 (overloaded) and other 5xx land here.
		_ => LlmError::Provider {
			provider: PROVIDER,
			status: Some(status.as_u16()),
			message,
		},
	}
}

fn transport_error(e: reqwest::Error) -> LlmError {
	if e.is_timeout() {
		return LlmError::Timeout { provider: PROVIDER };
	}
	LlmError::Connectivity {
		provider: PROVIDER,
		message: e.to_string(),
	}
}
