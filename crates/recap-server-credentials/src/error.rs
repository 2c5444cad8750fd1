// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use recap_llm_core::{LlmError, Provider};
use recap_server_db::DbError;
use recap_server_secrets::EncryptionError;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
	#[error("invalid API key: {0}")]
	InvalidSecret(String),

	/// The credential was stored as invalid; the vendor error is attached.
	#[error("{provider} key validation failed: {source}")]
	Validation {
		provider: Provider,
		#[source]
		source: LlmError,
	},

	#[error("no {provider} credential stored")]
	NotFound { provider: Provider },

	#[error(transparent)]
	Encryption(#[from] EncryptionError),

	#[error(transparent)]
	Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, CredentialError>;
