// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential lifecycle: encrypt, validate, persist, revalidate, delete.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use recap_common_secret::SecretString;
use recap_llm_core::{LlmError, Provider};
use recap_server_db::{CredentialRecord, CredentialRecordStore};
use recap_server_secrets::{fingerprint, EncryptionService};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::error::{CredentialError, Result};
use crate::types::{
	CredentialMetadata, CredentialValidator, StoreOutcome, ValidationStatus, MIN_SECRET_CHARS,
	STORAGE_METHOD,
};

type LockKey = (String, Provider);
type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Holds the write lock for one `(user, provider)`. On drop the map entry is
/// removed once no other task holds or waits on it.
struct KeyGuard<'a> {
	locks: &'a Mutex<HashMap<LockKey, KeyLock>>,
	key: LockKey,
	guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
	fn drop(&mut self) {
		self.guard.take();
		let mut locks = self.locks.lock();
		if locks
			.get(&self.key)
			.is_some_and(|lock| Arc::strong_count(lock) == 1)
		{
			locks.remove(&self.key);
		}
	}
}

/// Per-user encrypted API keys. Writes to the same `(user, provider)` are
/// serialized; different keys proceed independently.
pub struct CredentialStore {
	records: Arc<dyn CredentialRecordStore>,
	encryption: Arc<EncryptionService>,
	validator: Arc<dyn CredentialValidator>,
	locks: Mutex<HashMap<LockKey, KeyLock>>,
}

impl CredentialStore {
	pub fn new(
		records: Arc<dyn CredentialRecordStore>,
		encryption: Arc<EncryptionService>,
		validator: Arc<dyn CredentialValidator>,
	) -> Self {
		Self {
			records,
			encryption,
			validator,
			locks: Mutex::new(HashMap::new()),
		}
	}

	async fn lock_key(&self, user_id: &str, provider: Provider) -> KeyGuard<'_> {
		let key = (user_id.to_string(), provider);
		let lock = Arc::clone(self.locks.lock().entry(key.clone()).or_default());
		let guard = lock.lock_owned().await;
		KeyGuard {
			locks: &self.locks,
			key,
			guard: Some(guard),
		}
	}

	/// Runs the vendor check. An inconclusive answer counts as a rejection
	/// so a key is only ever marked valid on an explicit acceptance.
	async fn check(&self, provider: Provider, secret: &SecretString) -> std::result::Result<(), LlmError> {
		match self.validator.validate(provider, secret).await {
			Ok(true) => Ok(()),
			Ok(false) => Err(LlmError::Authentication {
				provider,
				message: "key was not accepted".to_string(),
			}),
			Err(e) => Err(e),
		}
	}

	fn metadata_json(key_length: usize, validation_attempted: bool, error: Option<&LlmError>) -> Value {
		let mut metadata = json!({
			"key_length": key_length,
			"validation_attempted": validation_attempted,
			"storage_method": STORAGE_METHOD,
		});
		if let Some(e) = error {
			metadata["last_validation_error"] = json!(e.kind());
		}
		metadata
	}

	/// Encrypts and upserts a key. With `validate`, the vendor is asked
	/// first; a rejected key is still stored, marked invalid, and the vendor
	/// error is returned.
	#[instrument(skip(self, secret), fields(user_id = %user_id, provider = %provider))]
	pub async fn store(
		&self,
		user_id: &str,
		provider: Provider,
		secret: &SecretString,
		validate: bool,
	) -> Result<StoreOutcome> {
		let secret = secret.trimmed();
		if secret.char_len() < MIN_SECRET_CHARS {
			return Err(CredentialError::InvalidSecret(format!(
				"must be at least {MIN_SECRET_CHARS} characters"
			)));
		}

		let _guard = self.lock_key(user_id, provider).await;

		let encrypted_secret = self.encryption.encrypt(secret.expose())?;
		let fingerprint = fingerprint(secret.expose(), provider.as_str());

		let failure = if validate {
			self.check(provider, &secret).await.err()
		} else {
			None
		};
		let validation = if validate && failure.is_none() {
			ValidationStatus::Valid
		} else {
			ValidationStatus::Skipped
		};

		let now = Utc::now();
		let record = CredentialRecord {
			user_id: user_id.to_string(),
			provider,
			encrypted_secret,
			fingerprint,
			is_valid: validation == ValidationStatus::Valid,
			last_validated: (validation == ValidationStatus::Valid).then_some(now),
			created_at: now,
			updated_at: now,
			metadata: Self::metadata_json(secret.char_len(), validate, failure.as_ref()),
		};
		self.records.upsert_credential(&record).await?;

		if let Some(source) = failure {
			warn!(error = %source, "Credential stored as invalid after failed validation");
			return Err(CredentialError::Validation { provider, source });
		}

		info!(
			fingerprint = %record.fingerprint,
			is_valid = record.is_valid,
			"Credential stored"
		);

		// Re-read so created_at reflects the original insert.
		let credential = self
			.records
			.get_credential(user_id, provider)
			.await?
			.map(CredentialMetadata::from)
			.unwrap_or_else(|| CredentialMetadata::from(record));

		Ok(StoreOutcome {
			credential,
			validation,
		})
	}

	/// Decrypts on demand. A stored value that fails to decrypt is an error.
	#[instrument(skip(self), fields(user_id = %user_id, provider = %provider))]
	pub async fn get_secret(&self, user_id: &str, provider: Provider) -> Result<Option<SecretString>> {
		let Some(record) = self.records.get_credential(user_id, provider).await? else {
			return Ok(None);
		};
		Ok(Some(self.encryption.decrypt(&record.encrypted_secret)?))
	}

	pub async fn get_metadata(
		&self,
		user_id: &str,
		provider: Provider,
	) -> Result<Option<CredentialMetadata>> {
		Ok(self
			.records
			.get_credential(user_id, provider)
			.await?
			.map(CredentialMetadata::from))
	}

	pub async fn list(&self, user_id: &str) -> Result<Vec<CredentialMetadata>> {
		Ok(self
			.records
			.list_credentials(user_id)
			.await?
			.into_iter()
			.map(CredentialMetadata::from)
			.collect())
	}

	/// Providers with a currently valid credential, in default priority order.
	pub async fn valid_providers(&self, user_id: &str) -> Result<Vec<Provider>> {
		let valid: Vec<Provider> = self
			.records
			.list_credentials(user_id)
			.await?
			.into_iter()
			.filter(|r| r.is_valid)
			.map(|r| r.provider)
			.collect();
		Ok(Provider::PRIORITY
			.into_iter()
			.filter(|p| valid.contains(p))
			.collect())
	}

	#[instrument(skip(self), fields(user_id = %user_id, provider = %provider))]
	pub async fn delete(&self, user_id: &str, provider: Provider) -> Result<bool> {
		let _guard = self.lock_key(user_id, provider).await;
		let deleted = self.records.delete_credential(user_id, provider).await?;
		if deleted {
			info!("Credential deleted");
		}
		Ok(deleted)
	}

	/// Re-checks a stored key with its vendor and records the result. Any
	/// validation error marks the key invalid.
	#[instrument(skip(self), fields(user_id = %user_id, provider = %provider))]
	pub async fn revalidate(&self, user_id: &str, provider: Provider) -> Result<bool> {
		let _guard = self.lock_key(user_id, provider).await;

		let record = self
			.records
			.get_credential(user_id, provider)
			.await?
			.ok_or(CredentialError::NotFound { provider })?;
		let secret = self.encryption.decrypt(&record.encrypted_secret)?;

		let (is_valid, failure) = match self.check(provider, &secret).await {
			Ok(()) => (true, None),
			Err(e) => (false, Some(e)),
		};

		let mut metadata = if record.metadata.is_object() {
			record.metadata
		} else {
			json!({})
		};
		metadata["validation_attempted"] = json!(true);
		match &failure {
			Some(e) => {
				warn!(error = %e, "Credential revalidation failed");
				metadata["last_validation_error"] = json!(e.kind());
			}
			None => {
				if let Some(obj) = metadata.as_object_mut() {
					obj.remove("last_validation_error");
				}
			}
		}

		self.records
			.update_validation(user_id, provider, is_valid, Utc::now(), &metadata)
			.await?;
		info!(is_valid, "Credential revalidated");
		Ok(is_valid)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use recap_server_db::testing::create_test_pool;
	use recap_server_db::CredentialRepository;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;
	use proptest::prelude::*;

	/// Accepts keys starting with `good-`, rejects `bad-`, and is
	/// inconclusive otherwise.
	#[derive(Default)]
	struct PrefixValidator {
		calls: AtomicUsize,
		delay: Option<Duration>,
	}

	#[async_trait]
	impl CredentialValidator for PrefixValidator {
		async fn validate(&self, provider: Provider, secret: &SecretString) -> std::result::Result<bool, LlmError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			let secret = secret.expose();
			if secret.starts_with("good-") {
				Ok(true)
			} else if secret.starts_with("bad-") {
				Err(LlmError::Authentication {
					provider,
					message: "invalid x-api-key".into(),
				})
			} else {
				Ok(false)
			}
		}
	}

	async fn make_store(validator: Arc<PrefixValidator>) -> (CredentialStore, CredentialRepository) {
		let repo = CredentialRepository::new(create_test_pool().await.unwrap());
		let store = CredentialStore::new(
			Arc::new(repo.clone()),
			Arc::new(EncryptionService::ephemeral()),
			validator,
		);
		(store, repo)
	}

	#[tokio::test]
	async fn store_and_decrypt() {
		let (store, repo) = make_store(Arc::default()).await;
		let outcome = store
			.store("u1", Provider::OpenAi, &"  good-sk-1234567890 ".into(), true)
			.await
			.unwrap();
		assert_eq!(outcome.validation, ValidationStatus::Valid);
		assert!(outcome.credential.is_valid);
		assert_eq!(outcome.credential.metadata["storage_method"], "aes-256-gcm");
		assert_eq!(outcome.credential.metadata["key_length"], 18);

		let secret = store.get_secret("u1", Provider::OpenAi).await.unwrap().unwrap();
		assert_eq!(secret.expose(), "good-sk-1234567890");

		let row = repo.get_credential("u1", Provider::OpenAi).await.unwrap().unwrap();
		assert!(!row.encrypted_secret.contains("1234567890"));
		assert_eq!(
			row.fingerprint,
			fingerprint("good-sk-1234567890", "openai")
		);
	}

	#[tokio::test]
	async fn short_keys_are_rejected() {
		let (store, repo) = make_store(Arc::default()).await;
		let err = store
			.store("u1", Provider::OpenAi, &"  good-1  ".into(), false)
			.await
			.unwrap_err();
		assert!(matches!(err, CredentialError::InvalidSecret(_)));
		assert!(repo.list_credentials("u1").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn unvalidated_store_is_not_valid() {
		let validator = Arc::new(PrefixValidator::default());
		let (store, _) = make_store(Arc::clone(&validator)).await;
		let outcome = store
			.store("u1", Provider::Google, &"good-AIza-0123456789".into(), false)
			.await
			.unwrap();
		assert_eq!(outcome.validation, ValidationStatus::Skipped);
		assert!(!outcome.credential.is_valid);
		assert_eq!(outcome.credential.metadata["validation_attempted"], false);
		assert!(outcome.credential.last_validated.is_none());
		assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
		assert!(store.valid_providers("u1").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn rejected_key_is_persisted_invalid() {
		let (store, _) = make_store(Arc::default()).await;
		let err = store
			.store("u1", Provider::Anthropic, &"bad-sk-ant-0123456789".into(), true)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			CredentialError::Validation {
				provider: Provider::Anthropic,
				source: LlmError::Authentication { .. }
			}
		));

		let meta = store
			.get_metadata("u1", Provider::Anthropic)
			.await
			.unwrap()
			.unwrap();
		assert!(!meta.is_valid);
		assert!(meta.last_validated.is_none());
		assert_eq!(meta.metadata["last_validation_error"], "authentication");
	}

	#[tokio::test]
	async fn inconclusive_check_is_a_rejection() {
		let (store, _) = make_store(Arc::default()).await;
		let err = store
			.store("u1", Provider::OpenAi, &"unknown-sk-123456".into(), true)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			CredentialError::Validation {
				provider: Provider::OpenAi,
				source: LlmError::Authentication { .. }
			}
		));

		let meta = store.get_metadata("u1", Provider::OpenAi).await.unwrap().unwrap();
		assert!(!meta.is_valid);
		assert!(meta.last_validated.is_none());
		assert_eq!(meta.metadata["validation_attempted"], true);
		assert_eq!(meta.metadata["last_validation_error"], "authentication");
		assert!(store.valid_providers("u1").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn key_locks_are_released() {
		let (store, _) = make_store(Arc::default()).await;
		for i in 0..50 {
			let user = format!("user-{i}");
			store
				.store(&user, Provider::OpenAi, &"good-sk-1234567890".into(), true)
				.await
				.unwrap();
			store.delete(&user, Provider::OpenAi).await.unwrap();
		}
		let _ = store
			.store("u1", Provider::Google, &"bad-AIza-0123456789".into(), true)
			.await;
		let _ = store.revalidate("u1", Provider::Anthropic).await;
		assert!(store.locks.lock().is_empty());
	}

	#[tokio::test]
	async fn failure_for_one_provider_leaves_others() {
		let (store, _) = make_store(Arc::default()).await;
		store
			.store("u1", Provider::OpenAi, &"good-sk-1234567890".into(), true)
			.await
			.unwrap();
		let _ = store
			.store("u1", Provider::Google, &"bad-AIza-0123456789".into(), true)
			.await;

		assert_eq!(
			store.valid_providers("u1").await.unwrap(),
			vec![Provider::OpenAi]
		);
		assert_eq!(store.list("u1").await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn restore_replaces_secret_and_keeps_created_at() {
		let (store, _) = make_store(Arc::default()).await;
		let first = store
			.store("u1", Provider::OpenAi, &"good-first-123456".into(), true)
			.await
			.unwrap();
		let second = store
			.store("u1", Provider::OpenAi, &"good-second-123456".into(), true)
			.await
			.unwrap();

		assert_eq!(store.list("u1").await.unwrap().len(), 1);
		assert_eq!(first.credential.created_at, second.credential.created_at);
		assert_eq!(
			store
				.get_secret("u1", Provider::OpenAi)
				.await
				.unwrap()
				.unwrap()
				.expose(),
			"good-second-123456"
		);
	}

	#[tokio::test]
	async fn concurrent_writes_leave_one_row() {
		let validator = Arc::new(PrefixValidator {
			calls: AtomicUsize::new(0),
			delay: Some(Duration::from_millis(20)),
		});
		let (store, _) = make_store(validator).await;
		let store = Arc::new(store);

		let handles: Vec<_> = (0..8)
			.map(|i| {
				let store = Arc::clone(&store);
				tokio::spawn(async move {
					store
						.store(
							"u1",
							Provider::OpenAi,
							&format!("good-key-{i:04}-abcdef").into(),
							true,
						)
						.await
						.unwrap();
				})
			})
			.collect();
		for handle in handles {
			handle.await.unwrap();
		}

		let rows = store.list("u1").await.unwrap();
		assert_eq!(rows.len(), 1);
		let secret = store.get_secret("u1", Provider::OpenAi).await.unwrap().unwrap();
		assert_eq!(rows[0].fingerprint, fingerprint(secret.expose(), "openai"));
	}

	#[tokio::test]
	async fn revalidate_updates_validity() {
		let (store, _) = make_store(Arc::default()).await;
		store
			.store("u1", Provider::OpenAi, &"unknown-sk-123456".into(), false)
			.await
			.unwrap();
		assert!(!store.revalidate("u1", Provider::OpenAi).await.unwrap());
		let rejected = store.get_metadata("u1", Provider::OpenAi).await.unwrap().unwrap();
		assert!(rejected.last_validated.is_none());
		assert_eq!(rejected.metadata["last_validation_error"], "authentication");

		store
			.store("u1", Provider::Google, &"good-AIza-0123456789".into(), false)
			.await
			.unwrap();
		assert!(store.revalidate("u1", Provider::Google).await.unwrap());
		let meta = store.get_metadata("u1", Provider::Google).await.unwrap().unwrap();
		assert!(meta.is_valid);
		assert!(meta.last_validated.is_some());
		assert_eq!(meta.metadata["validation_attempted"], true);

		let err = store.revalidate("u1", Provider::Anthropic).await.unwrap_err();
		assert!(matches!(err, CredentialError::NotFound { .. }));
	}

	#[tokio::test]
	async fn delete_removes_only_target() {
		let (store, _) = make_store(Arc::default()).await;
		store
			.store("u1", Provider::OpenAi, &"good-sk-1234567890".into(), true)
			.await
			.unwrap();
		assert!(store.delete("u1", Provider::OpenAi).await.unwrap());
		assert!(!store.delete("u1", Provider::OpenAi).await.unwrap());
		assert!(store.get_secret("u1", Provider::OpenAi).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn undecryptable_secret_is_an_error() {
		let validator: Arc<PrefixValidator> = Arc::default();
		let repo = CredentialRepository::new(create_test_pool().await.unwrap());
		let writer = CredentialStore::new(
			Arc::new(repo.clone()),
			Arc::new(EncryptionService::ephemeral()),
			validator.clone(),
		);
		writer
			.store("u1", Provider::OpenAi, &"good-sk-1234567890".into(), false)
			.await
			.unwrap();

		let reader = CredentialStore::new(
			Arc::new(repo),
			Arc::new(EncryptionService::ephemeral()),
			validator,
		);
		let err = reader.get_secret("u1", Provider::OpenAi).await.unwrap_err();
		assert!(matches!(err, CredentialError::Encryption(_)));
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(32))]

		#[test]
		fn stored_secret_is_the_trimmed_input(
			pad in "[ \t]{0,3}",
			body in "[A-Za-z0-9_-]{1,24}",
		) {
			let runtime = tokio::runtime::Builder::new_current_thread()
				.enable_all()
				.build()
				.unwrap();
			let input = format!("{pad}{body}{pad}");
			let outcome = runtime.block_on(async {
				let (store, _) = make_store(Arc::default()).await;
				let stored = store
					.store("u1", Provider::Google, &input.as_str().into(), false)
					.await;
				let secret = store.get_secret("u1", Provider::Google).await.unwrap();
				(stored, secret)
			});

			match outcome {
				(Ok(stored), Some(secret)) => {
					prop_assert!(body.len() >= MIN_SECRET_CHARS);
					prop_assert_eq!(secret.expose(), &body);
					prop_assert_eq!(&stored.credential.fingerprint, &fingerprint(&body, "google"));
				}
				(Err(CredentialError::InvalidSecret(_)), None) => {
					prop_assert!(body.len() < MIN_SECRET_CHARS);
				}
				(other, secret) => {
					prop_assert!(false, "unexpected {:?} / {:?}", other.map(|o| o.validation), secret.is_some());
				}
			}
		}
	}
}
