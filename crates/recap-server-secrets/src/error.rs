// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for credential encryption.

use thiserror::Error;

pub type EncryptionResult<T> = Result<T, EncryptionError>;

#[derive(Debug, Error)]
pub enum EncryptionError {
	// =========================================================================
	// Configuration Errors
	// =========================================================================
	#[error("no encryption key configured: set RECAP_ENCRYPTION_MASTER_KEY or RECAP_SECRET_KEY")]
	KeyNotConfigured,

	#[error("invalid master key: {0}")]
	InvalidMasterKey(String),

	#[error("key derivation failed: {0}")]
	KeyDerivation(String),

	// =========================================================================
	// Encryption Errors
	// =========================================================================
	#[error("refusing to encrypt an empty value")]
	EmptyPlaintext,

	#[error("plaintext too large: {actual} bytes exceeds {max}")]
	PlaintextTooLarge { max: usize, actual: usize },

	#[error("encryption failed: {0}")]
	Encryption(String),

	// =========================================================================
	// Decryption Errors
	// =========================================================================
	#[error("malformed ciphertext: {0}")]
	Malformed(String),

	#[error("unsupported ciphertext version {0}")]
	UnsupportedVersion(u8),

	#[error("decryption failed: {0}")]
	Decryption(String),

	#[error("decrypted value is not valid UTF-8")]
	InvalidUtf8,
}

impl EncryptionError {
	/// Configuration problems, as opposed to failures on one value.
	pub fn is_configuration(&self) -> bool {
		matches!(
			self,
			EncryptionError::KeyNotConfigured
				| EncryptionError::InvalidMasterKey(_)
				| EncryptionError::KeyDerivation(_)
		)
	}
}
