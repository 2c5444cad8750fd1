// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-user LLM API key storage.
//!
//! Keys are encrypted with [`recap_server_secrets::EncryptionService`]
//! before they reach the database and are only decrypted on demand. Vendor
//! validation is injected through [`CredentialValidator`].

mod error;
mod store;
mod types;

pub use error::{CredentialError, Result};
pub use store::CredentialStore;
pub use types::{
	CredentialMetadata, CredentialValidator, StoreOutcome, ValidationStatus, MIN_SECRET_CHARS,
	STORAGE_METHOD,
};
