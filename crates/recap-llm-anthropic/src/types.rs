// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Anthropic Messages API wire types.

use recap_llm_core::FinishReason;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
	pub model: String,
	pub max_tokens: u32,
	pub messages: Vec<Message>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub system: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
	pub role: String,
	pub content: String,
}

impl Message {
	pub fn user(content: impl Into<String>) -> Self {
		Self {
			role: "user".to_string(),
			content: content.into(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
	pub content: Vec<ContentBlock>,
	#[serde(default)]
	pub stop_reason: Option<String>,
	pub usage: Usage,
}

impl MessagesResponse {
	/// Concatenated text of all text blocks.
	pub fn text(&self) -> String {
		self.content
			.iter()
			.filter_map(|block| match block {
				ContentBlock::Text { text } => Some(text.as_str()),
				ContentBlock::Other => None,
			})
			.collect()
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
	#[serde(rename = "text")]
	Text { text: String },
	#[serde(other)]
	Other,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
	pub input_tokens: u32,
	pub output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
	pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
	#[serde(rename = "type", default)]
	pub error_type: String,
	#[serde(default)]
	pub message: String,
}

impl ErrorDetail {
	/// Anthropic reports an exhausted prepaid balance as a 400 with this
	/// wording rather than a dedicated status.
	pub fn is_credit_exhausted(&self) -> bool {
		self.message.to_lowercase().contains("credit balance")
	}
}

pub fn finish_reason(raw: Option<&str>) -> FinishReason {
	match raw {
		None | Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
		Some("max_tokens") => FinishReason::Length,
		Some("tool_use") => FinishReason::ToolUse,
		Some("refusal") => FinishReason::ContentFilter,
		Some(other) => FinishReason::Other(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn response_text_skips_non_text_blocks() {
		let body = r#"{
			"id": "msg_1",
			"type": "message",
			"role": "assistant",
			"model": "claude-3-5-sonnet-20241022",
			"content": [
				{"type": "text", "text": "Hello "},
				{"type": "tool_use", "id": "t1", "name": "lookup", "input": {}},
				{"type": "text", "text": "league"}
			],
			"stop_reason": "end_turn",
			"usage": {"input_tokens": 12, "output_tokens": 4}
		}"#;
		let response: MessagesResponse = serde_json::from_str(body).unwrap();
		assert_eq!(response.text(), "Hello league");
		assert_eq!(response.usage.output_tokens, 4);
	}

	#[test]
	fn system_is_a_top_level_field() {
		let request = MessagesRequest {
			model: "claude-3-haiku-20240307".into(),
			max_tokens: 1,
			messages: vec![Message::user("hi")],
			system: Some("You are terse".into()),
			temperature: None,
			top_p: None,
		};
		let json = serde_json::to_value(&request).unwrap();
		assert_eq!(json["system"], "You are terse");
		assert_eq!(json["messages"].as_array().unwrap().len(), 1);
		assert!(json.get("temperature").is_none());
	}

	#[test]
	fn credit_exhaustion_detected() {
		let detail = ErrorDetail {
			error_type: "invalid_request_error".into(),
			message: "Your credit balance is too low to access the Anthropic API.".into(),
		};
		assert!(detail.is_credit_exhausted());
	}

	#[test]
	fn stop_reasons_are_normalized() {
		assert_eq!(finish_reason(Some("end_turn")), FinishReason::Stop);
		assert_eq!(finish_reason(Some("max_tokens")), FinishReason::Length);
		assert_eq!(finish_reason(Some("refusal")), FinishReason::ContentFilter);
	}
}
