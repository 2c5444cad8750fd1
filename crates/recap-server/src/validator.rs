// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use recap_common_secret::SecretString;
use recap_llm_core::{LlmError, Provider};
use recap_llm_service::validate_key;
use recap_server_config::LlmConfig;
use recap_server_credentials::CredentialValidator;

/// Checks keys against the live vendor APIs using the configured
/// per-provider settings.
pub struct VendorValidator {
	llm: LlmConfig,
}

impl VendorValidator {
	pub fn new(llm: LlmConfig) -> Self {
		Self { llm }
	}
}

#[async_trait]
impl CredentialValidator for VendorValidator {
	async fn validate(&self, provider: Provider, secret: &SecretString) -> Result<bool, LlmError> {
		let config = self.llm.settings(provider).provider_config(provider, secret.clone());
		validate_key(config).await
	}
}
