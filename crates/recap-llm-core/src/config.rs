// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::time::Duration;

use recap_common_secret::SecretString;

use crate::provider::Provider;

pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to build one vendor adapter. The API key lives only
/// in memory.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
	pub provider: Provider,
	pub api_key: SecretString,
	/// `None` selects the vendor's default model.
	pub model: Option<String>,
	pub max_tokens_default: u32,
	pub temperature_default: f32,
	pub rate_limit_per_minute: Option<u32>,
	pub timeout: Duration,
	/// Overrides the vendor API root, e.g. for a proxy or a test double.
	pub base_url: Option<String>,
	/// OpenAI organization header; ignored by other vendors.
	pub organization: Option<String>,
}

impl ProviderConfig {
	pub fn new(provider: Provider, api_key: SecretString) -> Self {
		Self {
			provider,
			api_key,
			model: None,
			max_tokens_default: DEFAULT_MAX_TOKENS,
			temperature_default: DEFAULT_TEMPERATURE,
			rate_limit_per_minute: None,
			timeout: DEFAULT_TIMEOUT,
			base_url: None,
			organization: None,
		}
	}

	pub fn with_model(mut self, model: impl Into<String>) -> Self {
		self.model = Some(model.into());
		self
	}

	pub fn with_max_tokens_default(mut self, max_tokens: u32) -> Self {
		self.max_tokens_default = max_tokens;
		self
	}

	pub fn with_temperature_default(mut self, temperature: f32) -> Self {
		self.temperature_default = temperature;
		self
	}

	pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
		self.rate_limit_per_minute = Some(per_minute);
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = Some(base_url.into());
		self
	}

	pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
		self.organization = Some(organization.into());
		self
	}

	/// `base_url` with any trailing slash removed, or `default`.
	pub fn base_url_or(&self, default: &str) -> String {
		self
			.base_url
			.as_deref()
			.unwrap_or(default)
			.trim_end_matches('/')
			.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_generation_defaults() {
		let config = ProviderConfig::new(Provider::Anthropic, "sk-ant-test-key".into());
		assert_eq!(config.max_tokens_default, 1000);
		assert_eq!(config.temperature_default, 0.7);
		assert_eq!(config.timeout, Duration::from_secs(30));
		assert!(config.rate_limit_per_minute.is_none());
		assert!(config.model.is_none());
	}

	#[test]
	fn debug_redacts_api_key() {
		let config = ProviderConfig::new(Provider::OpenAi, "sk-live-abcdef123456".into());
		let debug = format!("{config:?}");
		assert!(!debug.contains("sk-live-abcdef123456"));
	}

	#[test]
	fn base_url_trailing_slash_is_trimmed() {
		let config = ProviderConfig::new(Provider::Google, "AIza-test-key".into())
			.with_base_url("http://127.0.0.1:9999/");
		assert_eq!(
			config.base_url_or("https://example.invalid"),
			"http://127.0.0.1:9999"
		);

		let config = ProviderConfig::new(Provider::Google, "AIza-test-key".into());
		assert_eq!(
			config.base_url_or("https://generativelanguage.googleapis.com"),
			"https://generativelanguage.googleapis.com"
		);
	}
}
