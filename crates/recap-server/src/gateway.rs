// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The gateway handle that wires encryption, credential storage,
//! preference resolution and per-user provider routing together.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use recap_common_secret::SecretString;
use recap_llm_core::{GenerationRequest, GenerationResult, Provider, ProviderCapabilities};
use recap_llm_service::{
	reference_pricing, ManagerConfig, ProviderManager, ProviderStatus, RouteHint,
};
use recap_server_config::{LlmConfig, ServerConfig};
use recap_server_credentials::{
	CredentialMetadata, CredentialStore, CredentialValidator, StoreOutcome,
};
use recap_server_db::{create_pool, run_migrations, CredentialRepository, PreferenceRepository};
use recap_server_preferences::{
	PreferencePatch, PreferenceRecord, PreferenceResolver, ProviderSelection, RequestType,
};
use recap_server_secrets::EncryptionService;
use sqlx::sqlite::SqlitePool;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::error::{GatewayError, Result};
use crate::validator::VendorValidator;

type ManagerSlot = Arc<OnceCell<Arc<ProviderManager>>>;

pub struct LlmGateway {
	encryption: Arc<EncryptionService>,
	credentials: Arc<CredentialStore>,
	preferences: PreferenceResolver,
	llm: LlmConfig,
	managers: Mutex<LruCache<String, ManagerSlot>>,
}

impl LlmGateway {
	/// Opens the database, applies migrations and builds the gateway with
	/// live vendor validation. Fails when no encryption key is configured or
	/// the encryption self-test fails.
	pub async fn start(config: &ServerConfig) -> Result<Self> {
		let encryption = EncryptionService::from_sources(
			config.encryption.master_key.as_ref(),
			config.encryption.app_secret.as_ref(),
		)?;
		info!(key_source = ?encryption.key_source(), "Encryption key loaded");

		let pool = create_pool(&config.database.url).await?;
		run_migrations(&pool).await?;

		let validator = Arc::new(VendorValidator::new(config.llm.clone()));
		Self::from_parts(pool, encryption, config.llm.clone(), validator)
	}

	/// Builds the gateway over an already migrated pool.
	pub fn from_parts(
		pool: SqlitePool,
		encryption: EncryptionService,
		llm: LlmConfig,
		validator: Arc<dyn CredentialValidator>,
	) -> Result<Self> {
		if !encryption.self_test() {
			return Err(GatewayError::EncryptionSelfTest);
		}
		let encryption = Arc::new(encryption);

		let credentials = Arc::new(CredentialStore::new(
			Arc::new(CredentialRepository::new(pool.clone())),
			Arc::clone(&encryption),
			validator,
		));

		let pricing = Provider::ALL
			.into_iter()
			.map(|provider| {
				let model = llm.settings(provider).model;
				(provider, reference_pricing(provider, model.as_deref()))
			})
			.collect();
		let preferences = PreferenceResolver::new(
			Arc::new(PreferenceRepository::new(pool)),
			Arc::clone(&credentials) as _,
		)
		.with_reference_pricing(pricing);

		let capacity = NonZeroUsize::new(llm.max_cached_managers).unwrap_or(NonZeroUsize::MIN);
		info!(
			health_check_interval_secs = llm.health_check_interval.as_secs(),
			max_cached_managers = capacity.get(),
			"LLM gateway started"
		);

		Ok(Self {
			encryption,
			credentials,
			preferences,
			llm,
			managers: Mutex::new(LruCache::new(capacity)),
		})
	}

	/// Number of users with a cached provider manager.
	pub fn cached_managers(&self) -> usize {
		self.managers.lock().len()
	}

	pub fn encryption_healthy(&self) -> bool {
		self.encryption.self_test()
	}

	/// The user's cached manager, built on first use. Beyond
	/// `max_cached_managers` users the least recently used manager is
	/// dropped and rebuilt on its next request.
	async fn manager_for(&self, user_id: &str) -> Result<Arc<ProviderManager>> {
		let slot = {
			let mut managers = self.managers.lock();
			match managers.get(user_id) {
				Some(slot) => Arc::clone(slot),
				None => {
					let slot = ManagerSlot::default();
					if let Some((evicted, _)) = managers.push(user_id.to_string(), Arc::clone(&slot)) {
						debug!(user_id = %evicted, "Least recently used provider manager dropped");
					}
					slot
				}
			}
		};
		let manager = slot.get_or_try_init(|| self.build_manager(user_id)).await?;
		Ok(Arc::clone(manager))
	}

	/// Registers every valid credential the vendor still accepts. Keys that
	/// fail to decrypt or validate are skipped.
	#[instrument(skip(self), fields(user_id = %user_id))]
	async fn build_manager(&self, user_id: &str) -> Result<Arc<ProviderManager>> {
		let manager = ProviderManager::new(ManagerConfig {
			health_check_interval: self.llm.health_check_interval,
		});

		for provider in self.credentials.valid_providers(user_id).await? {
			let secret = match self.credentials.get_secret(user_id, provider).await {
				Ok(Some(secret)) => secret,
				Ok(None) => continue,
				Err(e) => {
					warn!(provider = %provider, error = %e, "Skipping unreadable credential");
					continue;
				}
			};
			let config = self.llm.settings(provider).provider_config(provider, secret);
			if let Err(e) = manager.add(config).await {
				warn!(provider = %provider, error = %e, "Skipping provider");
			}
		}

		if let Some(default) = self.llm.default_provider {
			manager.set_default(default).await;
		}
		manager.set_fallback_order(self.llm.fallback_order.clone()).await;

		debug!(providers = ?manager.providers().await, "Provider manager built");
		Ok(Arc::new(manager))
	}

	/// Drops the cached manager so the next request rebuilds it from the
	/// current credentials.
	fn evict(&self, user_id: &str) {
		if self.managers.lock().pop(user_id).is_some() {
			debug!(user_id = %user_id, "Provider manager evicted");
		}
	}

	#[instrument(skip(self, secret), fields(user_id = %user_id, provider = %provider))]
	pub async fn store_credential(
		&self,
		user_id: &str,
		provider: Provider,
		secret: &SecretString,
		validate: bool,
	) -> Result<StoreOutcome> {
		let outcome = self
			.credentials
			.store(user_id, provider, secret, validate)
			.await;
		self.evict(user_id);
		Ok(outcome?)
	}

	pub async fn list_credentials(&self, user_id: &str) -> Result<Vec<CredentialMetadata>> {
		Ok(self.credentials.list(user_id).await?)
	}

	#[instrument(skip(self), fields(user_id = %user_id, provider = %provider))]
	pub async fn delete_credential(&self, user_id: &str, provider: Provider) -> Result<bool> {
		let deleted = self.credentials.delete(user_id, provider).await?;
		self.evict(user_id);
		Ok(deleted)
	}

	#[instrument(skip(self), fields(user_id = %user_id, provider = %provider))]
	pub async fn revalidate_credential(&self, user_id: &str, provider: Provider) -> Result<bool> {
		let outcome = self.credentials.revalidate(user_id, provider).await;
		self.evict(user_id);
		Ok(outcome?)
	}

	pub async fn resolve_providers(
		&self,
		user_id: &str,
		request_type: RequestType,
	) -> Result<ProviderSelection> {
		Ok(self.preferences.resolve(user_id, request_type).await?)
	}

	/// Resolves the user's route and generates through their manager.
	#[instrument(skip(self, request), fields(user_id = %user_id, request_type = %request_type))]
	pub async fn generate(
		&self,
		user_id: &str,
		request: &GenerationRequest,
		request_type: RequestType,
	) -> Result<GenerationResult> {
		let selection = self.preferences.resolve(user_id, request_type).await?;
		let manager = self.manager_for(user_id).await?;

		let route = RouteHint {
			preferred: selection.preferred,
			fallbacks: selection.fallbacks,
		};
		let result = manager.generate(request, &route).await?;

		info!(
			provider = %result.provider,
			model = %result.model,
			input_tokens = result.usage.input_tokens,
			output_tokens = result.usage.output_tokens,
			cost_usd = result.cost_usd,
			fallback_from = ?result.fallback_from,
			"Generation completed"
		);
		Ok(result)
	}

	/// Estimated USD cost per active provider, optionally restricted to
	/// `providers`.
	pub async fn estimate_cost(
		&self,
		user_id: &str,
		request: &GenerationRequest,
		providers: Option<&[Provider]>,
	) -> Result<BTreeMap<Provider, f64>> {
		let manager = self.manager_for(user_id).await?;
		Ok(manager.estimate_cost_matrix(request, providers).await)
	}

	pub async fn provider_statuses(&self, user_id: &str) -> Result<BTreeMap<Provider, ProviderStatus>> {
		let manager = self.manager_for(user_id).await?;
		Ok(manager.statuses().await)
	}

	pub async fn provider_capabilities(
		&self,
		user_id: &str,
	) -> Result<BTreeMap<Provider, ProviderCapabilities>> {
		let manager = self.manager_for(user_id).await?;
		Ok(manager.capabilities().await)
	}

	pub async fn get_preferences(&self, user_id: &str) -> Result<Option<PreferenceRecord>> {
		Ok(self.preferences.get(user_id).await?)
	}

	pub async fn update_preferences(
		&self,
		user_id: &str,
		patch: PreferencePatch,
	) -> Result<PreferenceRecord> {
		Ok(self.preferences.update(user_id, patch).await?)
	}

	pub async fn reset_preferences(&self, user_id: &str) -> Result<bool> {
		Ok(self.preferences.reset(user_id).await?)
	}

	/// Shuts down every cached manager.
	pub async fn shutdown(&self) {
		let slots: Vec<ManagerSlot> = {
			let mut managers = self.managers.lock();
			let slots = managers.iter().map(|(_, slot)| Arc::clone(slot)).collect();
			managers.clear();
			slots
		};
		for slot in slots {
			if let Some(manager) = slot.get() {
				manager.shutdown().await;
			}
		}
		info!("LLM gateway shut down");
	}
}
