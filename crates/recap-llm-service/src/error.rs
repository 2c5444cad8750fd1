// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Error types for provider routing.

use recap_llm_core::{LlmError, Provider};

/// A generation that produced no result.
#[derive(Debug, Clone, thiserror::Error)]
#[error("generation failed after trying {attempted:?} (fallback used: {fallback_used}): {error}")]
pub struct GenerationFailure {
	/// Providers called, in order. Empty when the request never reached a vendor.
	pub attempted: Vec<Provider>,
	pub fallback_used: bool,
	#[source]
	pub error: LlmError,
}

impl GenerationFailure {
	pub(crate) fn before_dispatch(error: LlmError) -> Self {
		Self {
			attempted: Vec::new(),
			fallback_used: false,
			error,
		}
	}
}
