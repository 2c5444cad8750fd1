// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OpenAI client implementation.

use std::time::Instant;

use recap_common_secret::SecretString;
use recap_llm_core::{
	estimate_tokens_by_ratio, retry_after_secs, GenerationRequest, GenerationResult, LlmError,
	ModelSpec, Provider, ProviderCapabilities, ProviderConfig, RateLimiter, TokenUsage,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, error, info, instrument, warn};

use crate::models::{CATALOG, CHARS_PER_TOKEN, DEFAULT_MODEL};
use crate::types::{
	finish_reason, ChatMessage, ChatRequest, ChatResponse, ErrorDetail, ErrorEnvelope,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const PROVIDER: Provider = Provider::OpenAi;

/// Client for the OpenAI Chat Completions API.
#[derive(Debug)]
pub struct OpenAiClient {
	api_key: SecretString,
	base_url: String,
	model: String,
	spec: &'static ModelSpec,
	organization: Option<String>,
	max_tokens_default: u32,
	temperature_default: f32,
	http: Client,
	limiter: RateLimiter,
}

impl OpenAiClient {
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
			warn!(model = %model, pricing_model = spec.name, "Unknown OpenAI model, using default pricing");
		}

		info!(
			model = %model,
			rate_limit_per_minute = ?config.rate_limit_per_minute,
			timeout_secs = config.timeout.as_secs(),
			"Initialized OpenAI client"
		);

		Ok(Self {
			base_url: config.base_url_or(DEFAULT_BASE_URL),
			api_key: config.api_key,
			model,
			spec,
			organization: config.organization,
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

	fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
		let builder = builder.bearer_auth(self.api_key.expose());
		match &self.organization {
			Some(org) => builder.header("OpenAI-Organization", org),
			None => builder,
		}
	}

	/// Checks the key by listing models, which costs no tokens.
	#[instrument(skip(self), fields(provider = %PROVIDER))]
	pub async fn validate(&self) -> Result<bool, LlmError> {
		let url = format!("{}/models", self.base_url);
		let response = self
			.authorize(self.http.get(&url))
			.send()
			.await
			.map_err(transport_error)?;

		if response.status().is_success() {
			debug!("OpenAI API key validated");
			return Ok(true);
		}

		match self.error_from_response(response).await {
			err @ LlmError::Authentication { .. } => Err(err),
			other => {
				warn!(error = %other, "OpenAI key validation inconclusive");
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

		let started = Instant::now();
		let outcome = self.send_chat(request).await;
		permit.commit();
		let response = outcome?;
		let latency_ms = started.elapsed().as_millis() as u64;

		let Some(choice) = response.choices.into_iter().next() else {
			return Err(LlmError::Provider {
				provider: PROVIDER,
				status: None,
				message: "response contained no choices".to_string(),
			});
		};

		let text = choice.message.content.unwrap_or_default();
		let usage = match response.usage {
			Some(usage) => TokenUsage {
				input_tokens: usage.prompt_tokens,
				output_tokens: usage.completion_tokens,
			},
			None => TokenUsage {
				input_tokens: self.estimate_tokens(&request.input_text()),
				output_tokens: self.estimate_tokens(&text),
			},
		};
		let cost_usd = self.estimate_cost(usage.input_tokens, usage.output_tokens);

		info!(
			input_tokens = usage.input_tokens,
			output_tokens = usage.output_tokens,
			cost_usd,
			latency_ms,
			"OpenAI generation completed"
		);

		Ok(GenerationResult {
			text,
			provider: PROVIDER,
			model: self.model.clone(),
			usage,
			finish_reason: finish_reason(choice.finish_reason.as_deref()),
			cost_usd,
			latency_ms,
			fallback_from: None,
		})
	}

	async fn send_chat(&self, request: &GenerationRequest) -> Result<ChatResponse, LlmError> {
		let mut messages = Vec::with_capacity(2);
		if let Some(system) = &request.system_message {
			messages.push(ChatMessage::system(system.clone()));
		}
		messages.push(ChatMessage::user(request.prompt.clone()));

		let body = ChatRequest {
			model: self.model.clone(),
			messages,
			max_tokens: request.max_tokens.unwrap_or(self.max_tokens_default),
			temperature: request.temperature.unwrap_or(self.temperature_default),
			top_p: request.top_p,
			frequency_penalty: request.frequency_penalty,
			presence_penalty: request.presence_penalty,
		};

		let url = format!("{}/chat/completions", self.base_url);
		debug!(url = %url, max_tokens = body.max_tokens, "Sending request to OpenAI");

		let response = self
			.authorize(self.http.post(&url))
			.json(&body)
			.send()
			.await
			.map_err(transport_error)?;

		if !response.status().is_success() {
			return Err(self.error_from_response(response).await);
		}

		response
			.json::<ChatResponse>()
			.await
			.map_err(|e| LlmError::Provider {
				provider: PROVIDER,
				status: None,
				message: format!("failed to parse response: {e}"),
			})
	}

	async fn error_from_response(&self, response: Response) -> LlmError {
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

		error!(status = %status, message = %message, "OpenAI API error");

		classify_error(status, detail.as_ref(), message, retry_after, &self.model)
	}
}

/// Maps a non-success Chat Completions response into the shared taxonomy.
fn classify_error(
	status: StatusCode,
	detail: Option<&ErrorDetail>,
	message: String,
	retry_after: Option<u64>,
	model: &str,
) -> LlmError {
	match status {
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Authentication {
			provider: PROVIDER,
			message,
		},
		StatusCode::TOO_MANY_REQUESTS if detail.is_some_and(|d| d.is_quota()) => {
			LlmError::QuotaExceeded {
				provider: PROVIDER,
				message,
			}
		}
		StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
			provider: PROVIDER,
			retry_after_secs: retry_after,
		},
		StatusCode::NOT_FOUND => LlmError::ModelNotFound {
			provider: PROVIDER,
			model: model.to_string(),
		},
		StatusCode::REQUEST_TIMEOUT => LlmError::Timeout { provider: PROVIDER },
		_ => LlmError::Provider {
			provider: PROVIDER,
			status: Some(status.as_u16()),
			message,
		},
	}
}

fn transport_error(e: reqwest::Error) -> LlmError {
	if e.is_timeout() {
		LlmError::Timeout { provider: PROVIDER }
	} else {
		LlmError::Connectivity {
			provider: PROVIDER,
			message: e.to_string(),
		}
	}
}
