// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_TOKENS;
use crate::error::LlmError;

/// A single-turn text generation request, independent of vendor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
	pub prompt: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub system_message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_tokens: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub frequency_penalty: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub presence_penalty: Option<f32>,
}

impl GenerationRequest {
	pub fn new(prompt: impl Into<String>) -> Self {
		Self {
			prompt: prompt.into(),
			..Default::default()
		}
	}

	pub fn with_system_message(mut self, system: impl Into<String>) -> Self {
		self.system_message = Some(system.into());
		self
	}

	pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
		self.max_tokens = Some(max_tokens);
		self
	}

	pub fn with_temperature(mut self, temperature: f32) -> Self {
		self.temperature = Some(temperature);
		self
	}

	pub fn with_top_p(mut self, top_p: f32) -> Self {
		self.top_p = Some(top_p);
		self
	}

	pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
		self.frequency_penalty = Some(penalty);
		self
	}

	pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
		self.presence_penalty = Some(penalty);
		self
	}

	/// `max_tokens` or the fallback used for cost estimates.
	pub fn expected_output_tokens(&self) -> u32 {
		self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
	}

	/// Text that counts toward input tokens: system message then prompt.
	pub fn input_text(&self) -> String {
		match &self.system_message {
			Some(system) => format!("{system}\n\n{}", self.prompt),
			None => self.prompt.clone(),
		}
	}

	/// Checks parameter bounds. Runs before any vendor call or rate-limit
	/// reservation.
	pub fn validate(&self) -> Result<(), LlmError> {
		if self.prompt.trim().is_empty() {
			return Err(LlmError::InvalidRequest("prompt must not be empty".into()));
		}
		if self.max_tokens == Some(0) {
			return Err(LlmError::InvalidRequest(
				"max_tokens must be greater than zero".into(),
			));
		}
		check_range("temperature", self.temperature, 0.0, 2.0)?;
		check_range("top_p", self.top_p, 0.0, 1.0)?;
		check_range("frequency_penalty", self.frequency_penalty, -2.0, 2.0)?;
		check_range("presence_penalty", self.presence_penalty, -2.0, 2.0)?;
		Ok(())
	}
}

fn check_range(name: &str, value: Option<f32>, min: f32, max: f32) -> Result<(), LlmError> {
	match value {
		Some(v) if !(min..=max).contains(&v) => Err(LlmError::InvalidRequest(format!(
			"{name} must be between {min} and {max}, got {v}"
		))),
		_ => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn minimal_request_is_valid() {
		assert!(GenerationRequest::new("Summarize week 3").validate().is_ok());
	}

	#[test]
	fn blank_prompt_is_rejected() {
		let err = GenerationRequest::new("   ").validate().unwrap_err();
		assert!(matches!(err, LlmError::InvalidRequest(_)));
	}

	#[test]
	fn zero_max_tokens_is_rejected() {
		let req = GenerationRequest::new("hi").with_max_tokens(0);
		assert!(req.validate().is_err());
	}

	#[test]
	fn nan_temperature_is_rejected() {
		let req = GenerationRequest::new("hi").with_temperature(f32::NAN);
		assert!(req.validate().is_err());
	}

	#[test]
	fn input_text_includes_system_message() {
		let req = GenerationRequest::new("prompt").with_system_message("system");
		assert_eq!(req.input_text(), "system\n\nprompt");
		assert_eq!(GenerationRequest::new("prompt").input_text(), "prompt");
	}

	#[test]
	fn expected_output_tokens_defaults() {
		assert_eq!(GenerationRequest::new("x").expected_output_tokens(), 1000);
		assert_eq!(
			GenerationRequest::new("x")
				.with_max_tokens(256)
				.expected_output_tokens(),
			256
		);
	}

	proptest! {
		#[test]
		fn temperature_bounds(t in -5.0f32..5.0) {
			let req = GenerationRequest::new("hi").with_temperature(t);
			prop_assert_eq!(req.validate().is_ok(), (0.0..=2.0).contains(&t));
		}

		#[test]
		fn top_p_bounds(p in -1.0f32..2.0) {
			let req = GenerationRequest::new("hi").with_top_p(p);
			prop_assert_eq!(req.validate().is_ok(), (0.0..=1.0).contains(&p));
		}

		#[test]
		fn penalty_bounds(f in -4.0f32..4.0, p in -4.0f32..4.0) {
			let req = GenerationRequest::new("hi")
				.with_frequency_penalty(f)
				.with_presence_penalty(p);
			let expected = (-2.0..=2.0).contains(&f) && (-2.0..=2.0).contains(&p);
			prop_assert_eq!(req.validate().is_ok(), expected);
		}
	}
}
