// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use recap_llm_core::Provider;
use recap_server_credentials::CredentialError;
use recap_server_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
	#[error("{0} cannot be both the preferred provider and a fallback")]
	PreferredInFallbacks(Provider),

	#[error("{0} appears more than once in the fallback list")]
	DuplicateFallback(Provider),

	#[error("no valid {0} API key stored")]
	ProviderUnavailable(Provider),

	#[error(transparent)]
	Credential(#[from] CredentialError),

	#[error(transparent)]
	Db(#[from] DbError),
}

impl PreferenceError {
	/// True for errors caused by the caller's input rather than storage.
	pub fn is_invalid_input(&self) -> bool {
		matches!(
			self,
			PreferenceError::PreferredInFallbacks(_)
				| PreferenceError::DuplicateFallback(_)
				| PreferenceError::ProviderUnavailable(_)
		)
	}
}

pub type Result<T> = std::result::Result<T, PreferenceError>;
