// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Core types shared by the vendor adapters and the provider manager.
//!
//! Nothing in this crate performs I/O. Vendor crates translate their wire
//! formats into these types; the manager routes on them.

pub mod config;
pub mod error;
pub mod pricing;
pub mod provider;
pub mod rate_limit;
pub mod request;
pub mod response;

pub use config::{ProviderConfig, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT};
pub use error::LlmError;
pub use pricing::{
	estimate_tokens_by_ratio, round_usd, ModelCatalog, ModelPricing, ModelSpec, ProviderCapabilities,
};
pub use provider::{ParseProviderError, Provider};
pub use rate_limit::{retry_after_secs, RateLimitPermit, RateLimiter};
pub use request::GenerationRequest;
pub use response::{FinishReason, GenerationResult, TokenUsage};
