// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// Why the vendor stopped generating, normalized across vendors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
	Stop,
	Length,
	ContentFilter,
	ToolUse,
	Other(String),
}

impl FinishReason {
	pub fn as_str(&self) -> &str {
		match self {
			FinishReason::Stop => "stop",
			FinishReason::Length => "length",
			FinishReason::ContentFilter => "content_filter",
			FinishReason::ToolUse => "tool_use",
			FinishReason::Other(reason) => reason,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
	pub input_tokens: u32,
	pub output_tokens: u32,
}

impl TokenUsage {
	pub fn total(&self) -> u32 {
		self.input_tokens.saturating_add(self.output_tokens)
	}
}

/// Completed generation as returned to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
	pub text: String,
	pub provider: Provider,
	pub model: String,
	pub usage: TokenUsage,
	pub finish_reason: FinishReason,
	/// Estimated cost in USD, rounded to 6 decimals.
	pub cost_usd: f64,
	pub latency_ms: u64,
	/// Set by the manager when this result came from the fallback hop.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fallback_from: Option<Provider>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn finish_reason_serializes_snake_case() {
		let json = serde_json::to_string(&FinishReason::ContentFilter).unwrap();
		assert_eq!(json, "\"content_filter\"");
		assert_eq!(FinishReason::Other("recitation".into()).as_str(), "recitation");
	}

	#[test]
	fn fallback_from_omitted_when_absent() {
		let result = GenerationResult {
			text: "ok".into(),
			provider: Provider::Google,
			model: "gemini-1.5-flash".into(),
			usage: TokenUsage {
				input_tokens: 3,
				output_tokens: 1,
			},
			finish_reason: FinishReason::Stop,
			cost_usd: 0.000005,
			latency_ms: 12,
			fallback_from: None,
		};
		let json = serde_json::to_value(&result).unwrap();
		assert!(json.get("fallback_from").is_none());
		assert_eq!(json["provider"], "google");
		assert_eq!(result.usage.total(), 4);
	}
}
