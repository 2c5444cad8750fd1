// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::str::FromStr;

use recap_llm_core::Provider;
use recap_server_db::QualityPreference;
use serde::{Deserialize, Serialize};

/// What the caller is generating. Only affects policy overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
	#[default]
	General,
	/// Long-form creative summaries.
	Recap,
	/// Short factual answers.
	Query,
}

impl RequestType {
	pub fn as_str(&self) -> &'static str {
		match self {
			RequestType::General => "general",
			RequestType::Recap => "recap",
			RequestType::Query => "query",
		}
	}
}

impl fmt::Display for RequestType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request type '{0}', expected 'general', 'recap', or 'query'")]
pub struct ParseRequestTypeError(pub String);

impl FromStr for RequestType {
	type Err = ParseRequestTypeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"general" => Ok(RequestType::General),
			"recap" => Ok(RequestType::Recap),
			"query" => Ok(RequestType::Query),
			_ => Err(ParseRequestTypeError(s.to_string())),
		}
	}
}

/// Which override replaced the stored preferred provider, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOverride {
	Quality,
	Cost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionPolicy {
	pub cost_optimization: bool,
	pub quality_preference: QualityPreference,
	pub applied: Option<PolicyOverride>,
}

/// The resolved route for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSelection {
	/// `None` only when the user has no valid credentials at all.
	pub preferred: Option<Provider>,
	pub fallbacks: Vec<Provider>,
	/// Providers with a valid key, in priority order.
	pub available: Vec<Provider>,
	pub policy: SelectionPolicy,
	pub has_preferences: bool,
}

impl ProviderSelection {
	/// Preferred first, then fallbacks.
	pub fn ordered(&self) -> Vec<Provider> {
		self.preferred
			.into_iter()
			.chain(self.fallbacks.iter().copied())
			.collect()
	}
}

/// Partial preference update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencePatch {
	pub preferred_provider: Option<Provider>,
	pub fallback_providers: Option<Vec<Provider>>,
	pub cost_optimization: Option<bool>,
	pub quality_preference: Option<QualityPreference>,
}

impl PreferencePatch {
	pub fn is_empty(&self) -> bool {
		self.preferred_provider.is_none()
			&& self.fallback_providers.is_none()
			&& self.cost_optimization.is_none()
			&& self.quality_preference.is_none()
	}

	/// Every provider this patch names.
	pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
		self.preferred_provider
			.into_iter()
			.chain(self.fallback_providers.iter().flatten().copied())
	}
}
