// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::provider::Provider;

/// Shared failure taxonomy. Vendor and transport errors are mapped into
/// these variants inside each adapter crate and nowhere else.
#[derive(Clone, Error, Debug, PartialEq)]
pub enum LlmError {
	#[error("{provider} rejected the API key: {message}")]
	Authentication { provider: Provider, message: String },

	#[error("{provider} rate limited{}", retry_hint(.retry_after_secs))]
	RateLimited {
		provider: Provider,
		retry_after_secs: Option<u64>,
	},

	#[error("{provider} quota exceeded: {message}")]
	QuotaExceeded { provider: Provider, message: String },

	#[error("{provider} does not serve model '{model}'")]
	ModelNotFound { provider: Provider, model: String },

	#[error("{provider} unreachable: {message}")]
	Connectivity { provider: Provider, message: String },

	#[error("{provider} request timed out")]
	Timeout { provider: Provider },

	#[error("{provider} returned an error (status {status:?}): {message}")]
	Provider {
		provider: Provider,
		status: Option<u16>,
		message: String,
	},

	#[error("invalid request: {0}")]
	InvalidRequest(String),

	#[error("no providers available ({registered} registered, {active} active)")]
	NoProvidersAvailable { registered: usize, active: usize },
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
	match retry_after_secs {
		Some(secs) => format!(": retry after {secs} seconds"),
		None => String::new(),
	}
}

impl LlmError {
	/// The vendor the error originated from, when there is one.
	pub fn provider(&self) -> Option<Provider> {
		match self {
			LlmError::Authentication { provider, .. }
			| LlmError::RateLimited { provider, .. }
			| LlmError::QuotaExceeded { provider, .. }
			| LlmError::ModelNotFound { provider, .. }
			| LlmError::Connectivity { provider, .. }
			| LlmError::Timeout { provider }
			| LlmError::Provider { provider, .. } => Some(*provider),
			LlmError::InvalidRequest(_) | LlmError::NoProvidersAvailable { .. } => None,
		}
	}

	/// Whether the manager may spend its single fallback hop on this error.
	///
	/// Authentication and missing-model errors are configuration problems
	/// that another attempt cannot fix.
	pub fn is_fallback_eligible(&self) -> bool {
		matches!(
			self,
			LlmError::Connectivity { .. }
				| LlmError::Timeout { .. }
				| LlmError::Provider { .. }
				| LlmError::QuotaExceeded { .. }
				| LlmError::RateLimited { .. }
		)
	}

	/// Whether the adapter should be marked degraded after this error.
	pub fn degrades_provider(&self) -> bool {
		matches!(
			self,
			LlmError::Authentication { .. } | LlmError::QuotaExceeded { .. }
		)
	}

	/// Stable snake_case label, safe to persist or log.
	pub fn kind(&self) -> &'static str {
		match self {
			LlmError::Authentication { .. } => "authentication",
			LlmError::RateLimited { .. } => "rate_limited",
			LlmError::QuotaExceeded { .. } => "quota_exceeded",
			LlmError::ModelNotFound { .. } => "model_not_found",
			LlmError::Connectivity { .. } => "connectivity",
			LlmError::Timeout { .. } => "timeout",
			LlmError::Provider { .. } => "provider",
			LlmError::InvalidRequest(_) => "invalid_request",
			LlmError::NoProvidersAvailable { .. } => "no_providers_available",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn all_kinds(provider: Provider) -> Vec<LlmError> {
		vec![
			LlmError::Authentication {
				provider,
				message: "bad key".into(),
			},
			LlmError::RateLimited {
				provider,
				retry_after_secs: Some(3),
			},
			LlmError::QuotaExceeded {
				provider,
				message: "insufficient_quota".into(),
			},
			LlmError::ModelNotFound {
				provider,
				model: "gpt-9".into(),
			},
			LlmError::Connectivity {
				provider,
				message: "dns".into(),
			},
			LlmError::Timeout { provider },
			LlmError::Provider {
				provider,
				status: Some(503),
				message: "overloaded".into(),
			},
		]
	}

	#[test]
	fn configuration_errors_do_not_fall_back() {
		let auth = LlmError::Authentication {
			provider: Provider::OpenAi,
			message: "invalid".into(),
		};
		let model = LlmError::ModelNotFound {
			provider: Provider::OpenAi,
			model: "nope".into(),
		};
		assert!(!auth.is_fallback_eligible());
		assert!(!model.is_fallback_eligible());
		assert!(!LlmError::InvalidRequest("empty prompt".into()).is_fallback_eligible());
	}

	#[test]
	fn transient_errors_fall_back() {
		assert!(LlmError::Timeout {
			provider: Provider::Google
		}
		.is_fallback_eligible());
		assert!(LlmError::Provider {
			provider: Provider::Anthropic,
			status: Some(529),
			message: "overloaded".into()
		}
		.is_fallback_eligible());
	}

	#[test]
	fn quota_and_auth_degrade() {
		let degrading: Vec<_> = all_kinds(Provider::Anthropic)
			.into_iter()
			.filter(|e| e.degrades_provider())
			.map(|e| e.kind())
			.collect();
		assert_eq!(degrading, vec!["authentication", "quota_exceeded"]);
	}

	#[test]
	fn no_providers_has_no_origin() {
		let err = LlmError::NoProvidersAvailable {
			registered: 2,
			active: 0,
		};
		assert_eq!(err.provider(), None);
		assert_eq!(
			err.to_string(),
			"no providers available (2 registered, 0 active)"
		);
	}

	#[test]
	fn rate_limit_message_shows_plain_seconds() {
		let timed = LlmError::RateLimited {
			provider: Provider::OpenAi,
			retry_after_secs: Some(7),
		};
		assert_eq!(timed.to_string(), "openai rate limited: retry after 7 seconds");

		let open = LlmError::RateLimited {
			provider: Provider::Google,
			retry_after_secs: None,
		};
		assert_eq!(open.to_string(), "google rate limited");
	}

	proptest! {
		#[test]
		fn vendor_errors_carry_their_provider(idx in 0usize..3) {
			let provider = Provider::ALL[idx];
			for err in all_kinds(provider) {
				prop_assert_eq!(err.provider(), Some(provider));
				prop_assert!(err.to_string().starts_with(provider.as_str()));
			}
		}
	}
}
