// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gemini client implementation.

use std::time::Instant;

use recap_common_secret::SecretString;
use recap_llm_core::{
	estimate_tokens_by_ratio, retry_after_secs, FinishReason, GenerationRequest, GenerationResult,
	LlmError, ModelSpec, Provider, ProviderCapabilities, ProviderConfig, RateLimiter, TokenUsage,
};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, error, info, instrument, warn};

use crate::models::{CATALOG, CHARS_PER_TOKEN, DEFAULT_MODEL};
use crate::types::{
	finish_reason, Content, ErrorDetail, ErrorEnvelope, GenerateContentRequest,
	GenerateContentResponse, GenerationConfig, SafetySetting,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROVIDER: Provider = Provider::Google;

const DEFAULT_TOP_P: f32 = 0.95;
const DEFAULT_TOP_K: u32 = 40;

/// Folds a system instruction into the user turn.
pub fn fold_system_message(system: Option<&str>, prompt: &str) -> String {
	match system {
		Some(system) => format!("System: {system}\n\nUser: {prompt}"),
		None => prompt.to_string(),
	}
}

/// Client for the Gemini API, authenticated with an API key.
#[derive(Debug)]
pub struct GoogleClient {
	api_key: SecretString,
	base_url: String,
	model: String,
	spec: &'static ModelSpec,
	max_tokens_default: u32,
	temperature_default: f32,
	http: Client,
	limiter: RateLimiter,
}

impl GoogleClient {
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
			warn!(model = %model, pricing_model = spec.name, "Unknown Gemini model, using default pricing");
		}

		info!(model = %model, "Initialized Gemini client");

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

	pub fn estimate_tokens(&self, text: &str) -> u32 {
		estimate_tokens_by_ratio(text, CHARS_PER_TOKEN)
	}

	pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
		self.spec.pricing.cost(input_tokens, output_tokens)
	}

	/// System messages are folded into the prompt, so native support is
	/// reported as absent.
	pub fn capabilities(&self) -> ProviderCapabilities {
		ProviderCapabilities {
			provider: PROVIDER,
			model: self.model.clone(),
			max_output_tokens: self.spec.max_output_tokens,
			context_window: self.spec.context_window,
			supports_system_message: false,
			supports_streaming: false,
			available_models: CATALOG.model_names(),
			pricing: self.spec.pricing,
		}
	}

	#[instrument(skip(self), fields(provider = %PROVIDER))]
	pub async fn validate(&self) -> Result<bool, LlmError> {
		let url = format!("{}/models", self.base_url);
		let response = self
			.http
			.get(&url)
			.header("x-goog-api-key", self.api_key.expose())
			.send()
			.await
			.map_err(transport_error)?;

		if response.status().is_success() {
			debug!("Gemini API key validated");
			return Ok(true);
		}

		match self.error_from_response(response).await {
			err @ LlmError::Authentication { .. } => Err(err),
			other => {
				warn!(error = %other, "Gemini key validation inconclusive");
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

		let content = fold_system_message(request.system_message.as_deref(), &request.prompt);
		let body = GenerateContentRequest {
			contents: vec![Content::user(content.clone())],
			generation_config: GenerationConfig {
				max_output_tokens: request.max_tokens.unwrap_or(self.max_tokens_default),
				temperature: request.temperature.unwrap_or(self.temperature_default),
				top_p: request.top_p.unwrap_or(DEFAULT_TOP_P),
				top_k: DEFAULT_TOP_K,
				frequency_penalty: request.frequency_penalty,
				presence_penalty: request.presence_penalty,
			},
			safety_settings: SafetySetting::defaults(),
		};

		let started = Instant::now();
		let outcome = self.send_generate(&body).await;
		permit.commit();
		let response = outcome?;
		let latency_ms = started.elapsed().as_millis() as u64;

		let raw_finish = response
			.candidates
			.first()
			.and_then(|c| c.finish_reason.as_deref());
		let (text, finish) = match (response.block_reason(), response.text()) {
			(Some(reason), _) => {
				warn!(block_reason = %reason, "Gemini blocked the prompt");
				(response.text().unwrap_or_default(), FinishReason::ContentFilter)
			}
			(None, Some(text)) => (text, finish_reason(raw_finish)),
			// Safety-stopped candidates arrive without content.
			(None, None) if finish_reason(raw_finish) == FinishReason::ContentFilter => {
				warn!(
					finish_reason = raw_finish.unwrap_or_default(),
					"Gemini withheld the candidate"
				);
				(String::new(), FinishReason::ContentFilter)
			}
			(None, None) => {
				return Err(LlmError::Provider {
					provider: PROVIDER,
					status: None,
					message: "empty response from Gemini".to_string(),
				});
			}
		};

		let usage = match response.usage_metadata {
			Some(meta) => TokenUsage {
				input_tokens: meta.prompt_token_count,
				output_tokens: meta.candidates_token_count,
			},
			None => TokenUsage {
				input_tokens: self.estimate_tokens(&content),
				output_tokens: self.estimate_tokens(&text),
			},
		};
		let cost_usd = self.estimate_cost(usage.input_tokens, usage.output_tokens);

		info!(
			input_tokens = usage.input_tokens,
			output_tokens = usage.output_tokens,
			cost_usd,
			latency_ms,
			finish_reason = finish.as_str(),
			"Gemini generation completed"
		);

		Ok(GenerationResult {
			text,
			provider: PROVIDER,
			model: self.model.clone(),
			usage,
			finish_reason: finish,
			cost_usd,
			latency_ms,
			fallback_from: None,
		})
	}

	async fn send_generate(
		&self,
		body: &GenerateContentRequest,
	) -> Result<GenerateContentResponse, LlmError> {
		let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
		debug!(url = %url, "Sending request to Gemini");

		let response = self
			.http
			.post(&url)
			.header("x-goog-api-key", self.api_key.expose())
			.json(body)
			.send()
			.await
			.map_err(transport_error)?;

		if !response.status().is_success() {
			return Err(self.error_from_response(response).await);
		}

		response
			.json::<GenerateContentResponse>()
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

		error!(
			status = %status,
			google_status = ?detail.as_ref().and_then(|d| d.status.as_deref()),
			message = %message,
			"Gemini API error"
		);

		classify_error(status, detail.as_ref(), message, retry_after, &self.model)
	}
}

fn classify_error(
	status: StatusCode,
	detail: Option<&ErrorDetail>,
	message: String,
	retry_after: Option<u64>,
	model: &str,
) -> LlmError {
	let invalid_key = detail.is_some_and(|d| d.is_invalid_key());
	let billing = detail.is_some_and(|d| d.is_billing());

	match status {
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Authentication {
			provider: PROVIDER,
			message,
		},
		StatusCode::BAD_REQUEST if invalid_key => LlmError::Authentication {
			provider: PROVIDER,
			message,
		},
		StatusCode::TOO_MANY_REQUESTS if billing => LlmError::QuotaExceeded {
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
		StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
			LlmError::Timeout { provider: PROVIDER }
		}
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
