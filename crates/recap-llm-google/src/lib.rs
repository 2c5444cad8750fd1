// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Google Gemini adapter.
//!
//! Gemini has no separate system field in this integration; the system
//! instruction is folded into the user turn. Prompt-feedback blocks and
//! safety finishes surface as [`recap_llm_core::FinishReason::ContentFilter`].

mod client;
pub mod models;
pub mod types;

pub use client::{fold_system_message, GoogleClient, DEFAULT_BASE_URL};
pub use models::{CATALOG, DEFAULT_MODEL};
