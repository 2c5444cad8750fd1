// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use recap_llm_service::GenerationFailure;
use recap_server_credentials::CredentialError;
use recap_server_db::DbError;
use recap_server_preferences::PreferenceError;
use recap_server_secrets::EncryptionError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
	#[error("encryption self-test failed")]
	EncryptionSelfTest,

	#[error(transparent)]
	Encryption(#[from] EncryptionError),

	#[error(transparent)]
	Db(#[from] DbError),

	#[error(transparent)]
	Credential(#[from] CredentialError),

	#[error(transparent)]
	Preference(#[from] PreferenceError),

	#[error(transparent)]
	Generation(#[from] GenerationFailure),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
