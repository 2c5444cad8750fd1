// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential encryption service.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use recap_common_secret::SecretString;
use sha2::{Digest, Sha256};
use tracing::{error, info, instrument};
use zeroize::Zeroizing;

use crate::encryption::{self, KEY_SIZE, NONCE_SIZE};
use crate::error::{EncryptionError, EncryptionResult};

/// Leading byte of every stored ciphertext.
pub const FORMAT_VERSION: u8 = 1;

/// Largest plaintext accepted by [`EncryptionService::encrypt`].
pub const MAX_PLAINTEXT_BYTES: usize = 64 * 1024;

/// Characters from the end of a secret that feed its fingerprint.
pub const FINGERPRINT_SUFFIX_CHARS: usize = 8;

/// Where the service key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
	MasterKey,
	DerivedFromAppSecret,
}

/// Encrypts credentials at rest with AES-256-GCM.
///
/// Stored values are URL-safe base64 of `version || nonce || ciphertext+tag`.
pub struct EncryptionService {
	key: Zeroizing<[u8; KEY_SIZE]>,
	source: KeySource,
}

impl fmt::Debug for EncryptionService {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EncryptionService")
			.field("key", &"[REDACTED]")
			.field("source", &self.source)
			.finish()
	}
}

impl EncryptionService {
	/// Prefers the master key; falls back to deriving one from the app
	/// secret. Neither configured is an error.
	pub fn from_sources(
		master_key: Option<&SecretString>,
		app_secret: Option<&SecretString>,
	) -> EncryptionResult<Self> {
		match (master_key, app_secret) {
			(Some(master), _) => Self::from_master_key(master),
			(None, Some(secret)) => Self::from_app_secret(secret),
			(None, None) => Err(EncryptionError::KeyNotConfigured),
		}
	}

	pub fn from_master_key(encoded: &SecretString) -> EncryptionResult<Self> {
		let key = encryption::key_from_base64(encoded)?;
		info!("Credential encryption initialized from master key");
		Ok(Self {
			key,
			source: KeySource::MasterKey,
		})
	}

	pub fn from_app_secret(secret: &SecretString) -> EncryptionResult<Self> {
		if secret.expose().trim().is_empty() {
			return Err(EncryptionError::KeyNotConfigured);
		}
		let key = encryption::derive_key(secret)?;
		info!("Credential encryption initialized from derived key");
		Ok(Self {
			key,
			source: KeySource::DerivedFromAppSecret,
		})
	}

	/// Test constructor with a fresh random key.
	pub fn ephemeral() -> Self {
		Self {
			key: encryption::generate_key(),
			source: KeySource::MasterKey,
		}
	}

	pub fn key_source(&self) -> KeySource {
		self.source
	}

	#[instrument(skip_all)]
	pub fn encrypt(&self, plaintext: &str) -> EncryptionResult<String> {
		if plaintext.is_empty() {
			return Err(EncryptionError::EmptyPlaintext);
		}
		if plaintext.len() > MAX_PLAINTEXT_BYTES {
			return Err(EncryptionError::PlaintextTooLarge {
				max: MAX_PLAINTEXT_BYTES,
				actual: plaintext.len(),
			});
		}

		let (nonce, ciphertext) = encryption::encrypt_bytes(&self.key, plaintext.as_bytes())?;

		let mut envelope = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
		envelope.push(FORMAT_VERSION);
		envelope.extend_from_slice(&nonce);
		envelope.extend_from_slice(&ciphertext);
		Ok(BASE64URL.encode(envelope))
	}

	#[instrument(skip_all)]
	pub fn decrypt(&self, stored: &str) -> EncryptionResult<SecretString> {
		let envelope = BASE64URL
			.decode(stored.trim().as_bytes())
			.map_err(|e| EncryptionError::Malformed(format!("invalid base64: {e}")))?;

		let (&version, rest) = envelope
			.split_first()
			.ok_or_else(|| EncryptionError::Malformed("empty ciphertext".to_string()))?;
		if version != FORMAT_VERSION {
			return Err(EncryptionError::UnsupportedVersion(version));
		}
		if rest.len() <= NONCE_SIZE {
			return Err(EncryptionError::Malformed(format!(
				"ciphertext too short: {} bytes",
				envelope.len()
			)));
		}

		let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
		let mut nonce = [0u8; NONCE_SIZE];
		nonce.copy_from_slice(nonce_bytes);

		let plaintext = encryption::decrypt_bytes(&self.key, &nonce, ciphertext)?;
		let text = std::str::from_utf8(&plaintext).map_err(|_| EncryptionError::InvalidUtf8)?;
		Ok(SecretString::new(text.to_string()))
	}

	/// Round-trips a random probe. Startup refuses to continue when this
	/// fails.
	pub fn self_test(&self) -> bool {
		let probe = hex::encode(encryption::generate_nonce());
		let outcome = self
			.encrypt(&probe)
			.and_then(|stored| self.decrypt(&stored));
		match outcome {
			Ok(value) if value.expose() == &probe => true,
			Ok(_) => {
				error!("Encryption self-test returned a different value");
				false
			}
			Err(e) => {
				error!(error = %e, "Encryption self-test failed");
				false
			}
		}
	}
}

/// Short, non-reversible identifier for a secret.
///
/// First 16 hex chars of SHA-256 over `"{context}:{suffix}"`, where the
/// suffix is the last eight characters of `secret` (all of it when shorter).
pub fn fingerprint(secret: &str, context: &str) -> String {
	let chars: Vec<char> = secret.chars().collect();
	let start = chars.len().saturating_sub(FINGERPRINT_SUFFIX_CHARS);
	let suffix: String = chars[start..].iter().collect();

	let mut hasher = Sha256::new();
	hasher.update(context.as_bytes());
	hasher.update(b":");
	hasher.update(suffix.as_bytes());
	let digest = hex::encode(hasher.finalize());
	digest[..16].to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use base64::engine::general_purpose::STANDARD as BASE64;
	use proptest::prelude::*;

	#[test]
	fn roundtrips_api_key() {
		let service = EncryptionService::ephemeral();
		let stored = service.encrypt("sk-test-1234567890").unwrap();
		assert_ne!(stored, "sk-test-1234567890");
		assert_eq!(service.decrypt(&stored).unwrap().expose(), "sk-test-1234567890");
	}

	#[test]
	fn same_secret_encrypts_differently() {
		let service = EncryptionService::ephemeral();
		let a = service.encrypt("sk-test-1234567890").unwrap();
		let b = service.encrypt("sk-test-1234567890").unwrap();
		assert_ne!(a, b);
		assert_eq!(
			fingerprint("sk-test-1234567890", "openai"),
			fingerprint("sk-test-1234567890", "openai")
		);
	}

	#[test]
	fn fingerprint_uses_only_context_and_suffix() {
		assert_eq!(
			fingerprint("sk-aaaa-1234567890", "openai"),
			fingerprint("sk-bbbb-1234567890", "openai")
		);
		assert_ne!(
			fingerprint("sk-test-1234567890", "openai"),
			fingerprint("sk-test-1234567890", "anthropic")
		);
		assert_eq!(fingerprint("short", "google").len(), 16);

		let expected = hex::encode(Sha256::digest(b"openai:34567890"));
		assert_eq!(fingerprint("sk-test-1234567890", "openai"), expected[..16]);
	}

	#[test]
	fn rejects_empty_and_oversized() {
		let service = EncryptionService::ephemeral();
		assert!(matches!(
			service.encrypt(""),
			Err(EncryptionError::EmptyPlaintext)
		));
		let big = "x".repeat(MAX_PLAINTEXT_BYTES + 1);
		assert!(matches!(
			service.encrypt(&big),
			Err(EncryptionError::PlaintextTooLarge { .. })
		));
	}

	#[test]
	fn tampered_value_is_rejected() {
		let service = EncryptionService::ephemeral();
		let stored = service.encrypt("sk-test-1234567890").unwrap();
		let mut bytes = BASE64URL.decode(&stored).unwrap();
		let last = bytes.len() - 1;
		bytes[last] ^= 0x01;
		let tampered = BASE64URL.encode(bytes);
		assert!(matches!(
			service.decrypt(&tampered),
			Err(EncryptionError::Decryption(_))
		));
	}

	#[test]
	fn unknown_version_is_rejected() {
		let service = EncryptionService::ephemeral();
		let mut bytes = BASE64URL
			.decode(service.encrypt("sk-test-1234567890").unwrap())
			.unwrap();
		bytes[0] = 9;
		assert!(matches!(
			service.decrypt(&BASE64URL.encode(bytes)),
			Err(EncryptionError::UnsupportedVersion(9))
		));
		assert!(matches!(
			service.decrypt("AQ"),
			Err(EncryptionError::Malformed(_))
		));
		assert!(service.decrypt("***").is_err());
	}

	#[test]
	fn other_key_cannot_decrypt() {
		let stored = EncryptionService::ephemeral()
			.encrypt("sk-test-1234567890")
			.unwrap();
		assert!(EncryptionService::ephemeral().decrypt(&stored).is_err());
	}

	#[test]
	fn sources_prefer_master_key() {
		let master = SecretString::new(BASE64.encode([1u8; KEY_SIZE]));
		let app = SecretString::new("app-secret".to_string());

		let service = EncryptionService::from_sources(Some(&master), Some(&app)).unwrap();
		assert_eq!(service.key_source(), KeySource::MasterKey);

		let service = EncryptionService::from_sources(None, Some(&app)).unwrap();
		assert_eq!(service.key_source(), KeySource::DerivedFromAppSecret);

		assert!(matches!(
			EncryptionService::from_sources(None, None),
			Err(EncryptionError::KeyNotConfigured)
		));
	}

	#[test]
	fn derived_keys_decrypt_across_instances() {
		let app = SecretString::new("app-secret".to_string());
		let stored = EncryptionService::from_app_secret(&app)
			.unwrap()
			.encrypt("sk-ant-0123456789")
			.unwrap();
		let reopened = EncryptionService::from_app_secret(&app).unwrap();
		assert_eq!(reopened.decrypt(&stored).unwrap().expose(), "sk-ant-0123456789");
	}

	#[test]
	fn self_test_passes() {
		assert!(EncryptionService::ephemeral().self_test());
	}

	#[test]
	fn debug_hides_key() {
		let debug = format!("{:?}", EncryptionService::ephemeral());
		assert!(debug.contains("[REDACTED]"));
	}

	proptest! {
		#[test]
		fn prop_printable_roundtrip(s in "[ -~]{1,512}") {
			let service = EncryptionService::ephemeral();
			let stored = service.encrypt(&s).unwrap();
			let decrypted = service.decrypt(&stored).unwrap();
			prop_assert_eq!(decrypted.expose(), &s);
		}

		#[test]
		fn prop_fingerprint_is_16_hex(s in ".{0,64}", context in "[a-z]{1,10}") {
			let fp = fingerprint(&s, &context);
			prop_assert_eq!(fp.len(), 16);
			prop_assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
		}
	}
}
