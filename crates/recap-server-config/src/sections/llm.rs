// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! LLM routing configuration section.
//!
//! ```toml
//! [llm]
//! health_check_interval_secs = 300
//! max_cached_managers = 1024
//! default_provider = "anthropic"
//! fallback_order = ["anthropic", "openai", "google"]
//!
//! [llm.openai]
//! model = "gpt-4o"
//! rate_limit_per_minute = 60
//! ```
//!
//! API keys are not configured here; they belong to users and live in the
//! credential store.

use std::collections::BTreeMap;
use std::time::Duration;

use recap_common_config::SecretString;
use recap_llm_core::{
	Provider, ProviderConfig, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_MAX_CACHED_MANAGERS: usize = 1024;

/// Per-vendor tuning layer (for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettingsLayer {
	pub model: Option<String>,
	pub base_url: Option<String>,
	pub rate_limit_per_minute: Option<u32>,
	pub timeout_secs: Option<u64>,
	pub max_tokens: Option<u32>,
	pub temperature: Option<f32>,
	pub organization: Option<String>,
}

impl ProviderSettingsLayer {
	pub fn merge(&mut self, other: ProviderSettingsLayer) {
		if other.model.is_some() {
			self.model = other.model;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.rate_limit_per_minute.is_some() {
			self.rate_limit_per_minute = other.rate_limit_per_minute;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.max_tokens.is_some() {
			self.max_tokens = other.max_tokens;
		}
		if other.temperature.is_some() {
			self.temperature = other.temperature;
		}
		if other.organization.is_some() {
			self.organization = other.organization;
		}
	}

	pub fn finalize(self) -> ProviderSettings {
		ProviderSettings {
			model: self.model,
			base_url: self.base_url,
			rate_limit_per_minute: self.rate_limit_per_minute,
			timeout: self
				.timeout_secs
				.map(Duration::from_secs)
				.unwrap_or(DEFAULT_TIMEOUT),
			max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
			temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
			organization: self.organization,
		}
	}
}

/// Per-vendor tuning (runtime, resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
	/// `None` selects the vendor's default model.
	pub model: Option<String>,
	pub base_url: Option<String>,
	pub rate_limit_per_minute: Option<u32>,
	pub timeout: Duration,
	pub max_tokens: u32,
	pub temperature: f32,
	pub organization: Option<String>,
}

impl Default for ProviderSettings {
	fn default() -> Self {
		ProviderSettingsLayer::default().finalize()
	}
}

impl ProviderSettings {
	/// Combines these settings with a user's key into an adapter config.
	pub fn provider_config(&self, provider: Provider, api_key: SecretString) -> ProviderConfig {
		let mut config = ProviderConfig::new(provider, api_key)
			.with_max_tokens_default(self.max_tokens)
			.with_temperature_default(self.temperature)
			.with_timeout(self.timeout);
		if let Some(model) = &self.model {
			config = config.with_model(model.clone());
		}
		if let Some(base_url) = &self.base_url {
			config = config.with_base_url(base_url.clone());
		}
		if let Some(limit) = self.rate_limit_per_minute {
			config = config.with_rate_limit(limit);
		}
		if let Some(organization) = &self.organization {
			config = config.with_organization(organization.clone());
		}
		config
	}
}

/// LLM configuration layer (for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LlmConfigLayer {
	pub health_check_interval_secs: Option<u64>,
	pub max_cached_managers: Option<usize>,
	pub default_provider: Option<Provider>,
	pub fallback_order: Option<Vec<Provider>>,
	pub openai: Option<ProviderSettingsLayer>,
	pub anthropic: Option<ProviderSettingsLayer>,
	pub google: Option<ProviderSettingsLayer>,
}

impl LlmConfigLayer {
	/// Merges another layer on top of this one.
	/// Values from `other` take precedence when present.
	pub fn merge(&mut self, other: LlmConfigLayer) {
		if other.health_check_interval_secs.is_some() {
			self.health_check_interval_secs = other.health_check_interval_secs;
		}
		if other.max_cached_managers.is_some() {
			self.max_cached_managers = other.max_cached_managers;
		}
		if other.default_provider.is_some() {
			self.default_provider = other.default_provider;
		}
		if other.fallback_order.is_some() {
			self.fallback_order = other.fallback_order;
		}
		crate::layer::merge_option(&mut self.openai, other.openai, ProviderSettingsLayer::merge);
		crate::layer::merge_option(
			&mut self.anthropic,
			other.anthropic,
			ProviderSettingsLayer::merge,
		);
		crate::layer::merge_option(&mut self.google, other.google, ProviderSettingsLayer::merge);
	}

	/// Mutable per-vendor layer, created empty if absent.
	pub fn provider_mut(&mut self, provider: Provider) -> &mut ProviderSettingsLayer {
		let slot = match provider {
			Provider::OpenAi => &mut self.openai,
			Provider::Anthropic => &mut self.anthropic,
			Provider::Google => &mut self.google,
		};
		slot.get_or_insert_with(ProviderSettingsLayer::default)
	}

	pub fn finalize(self) -> LlmConfig {
		let mut providers = BTreeMap::new();
		for (provider, layer) in [
			(Provider::OpenAi, self.openai),
			(Provider::Anthropic, self.anthropic),
			(Provider::Google, self.google),
		] {
			providers.insert(provider, layer.unwrap_or_default().finalize());
		}

		LlmConfig {
			health_check_interval: Duration::from_secs(
				self.health_check_interval_secs
					.unwrap_or(DEFAULT_HEALTH_CHECK_INTERVAL_SECS),
			),
			max_cached_managers: self
				.max_cached_managers
				.unwrap_or(DEFAULT_MAX_CACHED_MANAGERS),
			default_provider: self.default_provider,
			fallback_order: self
				.fallback_order
				.unwrap_or_else(|| Provider::PRIORITY.to_vec()),
			providers,
		}
	}
}

/// LLM configuration (runtime, resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
	pub health_check_interval: Duration,
	/// Users whose provider managers stay cached; the least recently used
	/// one is dropped beyond this.
	pub max_cached_managers: usize,
	/// Default provider for each user's manager. `None` keeps the first
	/// registered provider.
	pub default_provider: Option<Provider>,
	pub fallback_order: Vec<Provider>,
	pub providers: BTreeMap<Provider, ProviderSettings>,
}

impl Default for LlmConfig {
	fn default() -> Self {
		LlmConfigLayer::default().finalize()
	}
}

impl LlmConfig {
	pub fn settings(&self, provider: Provider) -> ProviderSettings {
		self.providers.get(&provider).cloned().unwrap_or_default()
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.health_check_interval.is_zero() {
			return Err(ConfigError::Validation(
				"llm.health_check_interval_secs must be greater than zero".to_string(),
			));
		}
		if self.max_cached_managers == 0 {
			return Err(ConfigError::InvalidValue {
				key: "llm.max_cached_managers".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}

		for (index, provider) in self.fallback_order.iter().enumerate() {
			if self.fallback_order[..index].contains(provider) {
				return Err(ConfigError::Validation(format!(
					"llm.fallback_order lists {provider} more than once"
				)));
			}
		}

		for (provider, settings) in &self.providers {
			if !(0.0..=2.0).contains(&settings.temperature) {
				return Err(ConfigError::InvalidValue {
					key: format!("llm.{provider}.temperature"),
					message: format!("{} is outside 0.0..=2.0", settings.temperature),
				});
			}
			if settings.max_tokens == 0 {
				return Err(ConfigError::InvalidValue {
					key: format!("llm.{provider}.max_tokens"),
					message: "must be greater than zero".to_string(),
				});
			}
			if settings.timeout.is_zero() {
				return Err(ConfigError::InvalidValue {
					key: format!("llm.{provider}.timeout_secs"),
					message: "must be greater than zero".to_string(),
				});
			}
			if settings.rate_limit_per_minute == Some(0) {
				return Err(ConfigError::InvalidValue {
					key: format!("llm.{provider}.rate_limit_per_minute"),
					message: "must be greater than zero; omit it to disable limiting".to_string(),
				});
			}
		}

		Ok(())
	}
}
