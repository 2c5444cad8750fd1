// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of supported text-generation vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
	OpenAi,
	Anthropic,
	Google,
}

impl Provider {
	pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::Anthropic, Provider::Google];

	/// Fixed priority used when a user has no stored preference.
	pub const PRIORITY: [Provider; 3] = [Provider::Anthropic, Provider::OpenAi, Provider::Google];

	pub fn as_str(&self) -> &'static str {
		match self {
			Provider::OpenAi => "openai",
			Provider::Anthropic => "anthropic",
			Provider::Google => "google",
		}
	}
}

impl fmt::Display for Provider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider '{0}', expected 'openai', 'anthropic', or 'google'")]
pub struct ParseProviderError(pub String);

impl FromStr for Provider {
	type Err = ParseProviderError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"openai" => Ok(Provider::OpenAi),
			"anthropic" => Ok(Provider::Anthropic),
			"google" => Ok(Provider::Google),
			_ => Err(ParseProviderError(s.to_string())),
		}
	}
}
