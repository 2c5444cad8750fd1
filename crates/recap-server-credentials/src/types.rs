// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recap_common_secret::SecretString;
use recap_llm_core::{LlmError, Provider};
use recap_server_db::CredentialRecord;
use serde::Serialize;
use serde_json::Value;

pub const STORAGE_METHOD: &str = "aes-256-gcm";

/// Shortest accepted API key after trimming.
pub const MIN_SECRET_CHARS: usize = 10;

/// Checks a raw key against its vendor.
///
/// `Ok(true)` means the vendor accepted the key and `Ok(false)` means the
/// check was inconclusive. The store treats anything but `Ok(true)` as a
/// rejection.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
	async fn validate(&self, provider: Provider, secret: &SecretString) -> Result<bool, LlmError>;
}

/// A stored credential without its ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialMetadata {
	pub user_id: String,
	pub provider: Provider,
	pub fingerprint: String,
	pub is_valid: bool,
	pub last_validated: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub metadata: Value,
}

impl From<CredentialRecord> for CredentialMetadata {
	fn from(record: CredentialRecord) -> Self {
		Self {
			user_id: record.user_id,
			provider: record.provider,
			fingerprint: record.fingerprint,
			is_valid: record.is_valid,
			last_validated: record.last_validated,
			created_at: record.created_at,
			updated_at: record.updated_at,
			metadata: record.metadata,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
	Skipped,
	Valid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreOutcome {
	pub credential: CredentialMetadata,
	pub validation: ValidationStatus,
}
