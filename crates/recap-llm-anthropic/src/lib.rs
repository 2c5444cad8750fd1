// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Anthropic Messages API adapter.

mod client;
pub mod models;
pub mod types;

pub use client::{AnthropicClient, ANTHROPIC_VERSION, DEFAULT_BASE_URL};
pub use models::{CATALOG, DEFAULT_MODEL, VALIDATION_MODEL};
