// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Provider routing for Recap.
//!
//! A [`ProviderManager`] owns the adapters registered for one tenant. It
//! tracks per-provider health and usage, picks a provider for each request
//! from the caller's [`RouteHint`], and spends at most one fallback hop when
//! the selected provider fails with a transient error.

mod adapter;
mod error;
mod manager;
mod status;

pub use adapter::{catalog, reference_pricing, validate_key, ProviderAdapter};
pub use error::GenerationFailure;
pub use manager::{
	cheapest, ManagerConfig, ProviderManager, RouteHint, DEFAULT_HEALTH_CHECK_INTERVAL,
};
pub use status::{Availability, ProviderStatus, OUTCOME_WINDOW};

pub use recap_llm_core::{
	FinishReason, GenerationRequest, GenerationResult, LlmError, ModelPricing, Provider,
	ProviderCapabilities, ProviderConfig, TokenUsage,
};
