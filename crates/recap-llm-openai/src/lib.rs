// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OpenAI adapter.
//!
//! Translates [`recap_llm_core::GenerationRequest`] into a Chat Completions
//! call and maps every vendor failure into [`recap_llm_core::LlmError`].

mod client;
pub mod models;
pub mod types;

pub use client::{OpenAiClient, DEFAULT_BASE_URL};
pub use models::{CATALOG, DEFAULT_MODEL};
