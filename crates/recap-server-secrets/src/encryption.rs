// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AES-256-GCM primitives and key sourcing.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use recap_common_secret::SecretString;
use zeroize::Zeroizing;

use crate::error::{EncryptionError, EncryptionResult};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Salt for deriving the credential key from the application secret.
/// Changing it orphans every stored credential.
pub const KDF_SALT: &[u8] = b"recap-llm-credentials-v1";

/// Generate a random encryption key.
pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	OsRng.fill_bytes(key.as_mut());
	key
}

/// Generate a random 96-bit nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
	let mut nonce = [0u8; NONCE_SIZE];
	OsRng.fill_bytes(&mut nonce);
	nonce
}

/// Decode a base64 master key, which must be exactly [`KEY_SIZE`] bytes.
pub fn key_from_base64(encoded: &SecretString) -> EncryptionResult<Zeroizing<[u8; KEY_SIZE]>> {
	let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
		BASE64
			.decode(encoded.expose().trim().as_bytes())
			.map_err(|e| EncryptionError::InvalidMasterKey(format!("invalid base64: {e}")))?,
	);

	if bytes.len() != KEY_SIZE {
		return Err(EncryptionError::InvalidMasterKey(format!(
			"must be {} bytes, got {}",
			KEY_SIZE,
			bytes.len()
		)));
	}

	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	key.copy_from_slice(&bytes);
	Ok(key)
}

/// Derive a key from the application secret with Argon2id.
pub fn derive_key(app_secret: &SecretString) -> EncryptionResult<Zeroizing<[u8; KEY_SIZE]>> {
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	Argon2::default()
		.hash_password_into(app_secret.expose().as_bytes(), KDF_SALT, key.as_mut())
		.map_err(|e| EncryptionError::KeyDerivation(e.to_string()))?;
	Ok(key)
}

pub fn encrypt_bytes(
	key: &[u8; KEY_SIZE],
	plaintext: &[u8],
) -> EncryptionResult<([u8; NONCE_SIZE], Vec<u8>)> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
	let nonce_bytes = generate_nonce();
	let ciphertext = cipher
		.encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
		.map_err(|e| EncryptionError::Encryption(e.to_string()))?;
	Ok((nonce_bytes, ciphertext))
}

pub fn decrypt_bytes(
	key: &[u8; KEY_SIZE],
	nonce: &[u8; NONCE_SIZE],
	ciphertext: &[u8],
) -> EncryptionResult<Zeroizing<Vec<u8>>> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
	let plaintext = cipher
		.decrypt(Nonce::from_slice(nonce), ciphertext)
		.map_err(|e| EncryptionError::Decryption(e.to_string()))?;
	Ok(Zeroizing::new(plaintext))
}
