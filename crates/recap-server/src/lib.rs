// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Multi-tenant LLM gateway.
//!
//! [`LlmGateway`] is built once at startup and passed to whatever serves
//! requests. Each user gets a lazily built provider manager over their own
//! valid credentials; it is rebuilt whenever those credentials change.

mod error;
mod gateway;
pub mod logging;
mod validator;

pub use error::{GatewayError, Result};
pub use gateway::LlmGateway;
pub use validator::VendorValidator;

pub use recap_llm_service::{GenerationFailure, ProviderStatus};
pub use recap_server_preferences::{PreferencePatch, ProviderSelection, RequestType};
