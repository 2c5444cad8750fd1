// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OpenAI Chat Completions wire types.

use recap_llm_core::FinishReason;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
	pub model: String,
	pub messages: Vec<ChatMessage>,
	pub max_tokens: u32,
	pub temperature: f32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub frequency_penalty: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub presence_penalty: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: String,
	#[serde(default)]
	pub content: Option<String>,
}

impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self {
			role: "system".to_string(),
			content: Some(content.into()),
		}
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self {
			role: "user".to_string(),
			content: Some(content.into()),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
	#[serde(default)]
	pub model: Option<String>,
	pub choices: Vec<ChatChoice>,
	#[serde(default)]
	pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
	pub message: ChatMessage,
	#[serde(default)]
	pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ChatUsage {
	pub prompt_tokens: u32,
	pub completion_tokens: u32,
}

/// `{"error": {...}}` envelope returned on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
	pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
	#[serde(default)]
	pub message: String,
	#[serde(rename = "type", default)]
	pub error_type: Option<String>,
	#[serde(default)]
	pub code: Option<String>,
}

impl ErrorDetail {
	pub fn is_quota(&self) -> bool {
		self.code.as_deref() == Some("insufficient_quota")
			|| self.error_type.as_deref() == Some("insufficient_quota")
	}
}

pub fn finish_reason(raw: Option<&str>) -> FinishReason {
	match raw {
		None | Some("stop") => FinishReason::Stop,
		Some("length") => FinishReason::Length,
		Some("content_filter") => FinishReason::ContentFilter,
		Some("tool_calls") | Some("function_call") => FinishReason::ToolUse,
		Some(other) => FinishReason::Other(other.to_string()),
	}
}
