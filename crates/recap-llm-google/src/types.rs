// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gemini `generateContent` wire types.

use recap_llm_core::FinishReason;
use serde::{Deserialize, Serialize};

/// Categories sent with a medium-and-above block threshold on every request.
pub const SAFETY_CATEGORIES: [&str; 4] = [
	"HARM_CATEGORY_HATE_SPEECH",
	"HARM_CATEGORY_DANGEROUS_CONTENT",
	"HARM_CATEGORY_SEXUALLY_EXPLICIT",
	"HARM_CATEGORY_HARASSMENT",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
	pub contents: Vec<Content>,
	pub generation_config: GenerationConfig,
	pub safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	#[serde(default)]
	pub parts: Vec<Part>,
}

impl Content {
	pub fn user(text: impl Into<String>) -> Self {
		Self {
			role: Some("user".to_string()),
			parts: vec![Part {
				text: Some(text.into()),
			}],
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
	pub max_output_tokens: u32,
	pub temperature: f32,
	pub top_p: f32,
	pub top_k: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub frequency_penalty: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub presence_penalty: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetySetting {
	pub category: String,
	pub threshold: String,
}

impl SafetySetting {
	pub fn defaults() -> Vec<SafetySetting> {
		SAFETY_CATEGORIES
			.iter()
			.map(|category| SafetySetting {
				category: category.to_string(),
				threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
			})
			.collect()
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
	#[serde(default)]
	pub candidates: Vec<Candidate>,
	#[serde(default)]
	pub usage_metadata: Option<UsageMetadata>,
	#[serde(default)]
	pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
	pub fn block_reason(&self) -> Option<&str> {
		self.prompt_feedback
			.as_ref()
			.and_then(|f| f.block_reason.as_deref())
	}

	/// Text of the first candidate, parts concatenated.
	pub fn text(&self) -> Option<String> {
		let candidate = self.candidates.first()?;
		let content = candidate.content.as_ref()?;
		let text: String = content
			.parts
			.iter()
			.filter_map(|p| p.text.as_deref())
			.collect();
		Some(text)
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
	#[serde(default)]
	pub content: Option<Content>,
	#[serde(default)]
	pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
	#[serde(default)]
	pub prompt_token_count: u32,
	#[serde(default)]
	pub candidates_token_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
	#[serde(default)]
	pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
	pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
	#[serde(default)]
	pub message: String,
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default)]
	pub details: Vec<serde_json::Value>,
}

impl ErrorDetail {
	/// Gemini reports a bad key as a 400 `INVALID_ARGUMENT` with reason
	/// `API_KEY_INVALID`.
	pub fn is_invalid_key(&self) -> bool {
		self.details
			.iter()
			.any(|d| d.get("reason").and_then(|r| r.as_str()) == Some("API_KEY_INVALID"))
			|| self.message.contains("API key not valid")
	}

	pub fn is_billing(&self) -> bool {
		let message = self.message.to_lowercase();
		message.contains("billing") || message.contains("exceeded your current quota")
	}
}

pub fn finish_reason(raw: Option<&str>) -> FinishReason {
	match raw {
		None | Some("STOP") => FinishReason::Stop,
		Some("MAX_TOKENS") => FinishReason::Length,
		Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT")
		| Some("SPII") => FinishReason::ContentFilter,
		Some(other) => FinishReason::Other(other.to_lowercase()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_uses_camel_case() {
		let request = GenerateContentRequest {
			contents: vec![Content::user("hello")],
			generation_config: GenerationConfig {
				max_output_tokens: 64,
				temperature: 0.7,
				top_p: 0.95,
				top_k: 40,
				frequency_penalty: None,
				presence_penalty: None,
			},
			safety_settings: SafetySetting::defaults(),
		};
		let json = serde_json::to_value(&request).unwrap();
		assert_eq!(json["generationConfig"]["maxOutputTokens"], 64);
		assert_eq!(json["generationConfig"]["topK"], 40);
		assert_eq!(json["safetySettings"].as_array().unwrap().len(), 4);
		assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
	}

	#[test]
	fn blocked_prompt_has_no_text() {
		let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
		let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
		assert_eq!(response.block_reason(), Some("SAFETY"));
		assert!(response.text().is_none());
		assert!(response.usage_metadata.is_none());
	}

	#[test]
	fn invalid_key_detected_from_details() {
		let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT", "details": [{"@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID"}]}}"#;
		let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap();
		assert!(envelope.error.is_invalid_key());
	}

	#[test]
	fn safety_finish_is_content_filter() {
		assert_eq!(finish_reason(Some("SAFETY")), FinishReason::ContentFilter);
		assert_eq!(finish_reason(Some("MAX_TOKENS")), FinishReason::Length);
		assert_eq!(
			finish_reason(Some("MALFORMED_FUNCTION_CALL")),
			FinishReason::Other("malformed_function_call".into())
		);
	}
}
