// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential encryption for Recap.
//!
//! User API keys are encrypted at rest with AES-256-GCM under a single
//! service key. The key is either supplied directly
//! (`RECAP_ENCRYPTION_MASTER_KEY`) or derived with Argon2id from the
//! application secret (`RECAP_SECRET_KEY`).

pub mod encryption;
pub mod error;
pub mod service;

pub use encryption::{generate_key, KEY_SIZE, NONCE_SIZE};
pub use error::{EncryptionError, EncryptionResult};
pub use service::{
	fingerprint, EncryptionService, KeySource, FORMAT_VERSION, MAX_PLAINTEXT_BYTES,
};
