// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use recap_llm_core::{ModelPricing, Provider};
use recap_server_credentials::{CredentialError, CredentialStore};
use recap_server_db::{DbError, PreferenceRecord, PreferenceRecordStore, QualityPreference};
use tracing::{debug, info, instrument};

use crate::error::{PreferenceError, Result};
use crate::types::{
	PolicyOverride, PreferencePatch, ProviderSelection, RequestType, SelectionPolicy,
};

/// Providers eligible for the quality override on recap requests, in order.
pub const QUALITY_PROVIDERS: [Provider; 2] = [Provider::Anthropic, Provider::OpenAi];

/// Stored as preferred when a user has no valid credentials yet.
const NO_CREDENTIAL_DEFAULT: Provider = Provider::OpenAi;

/// Source of the providers a user currently holds a valid key for.
#[async_trait]
pub trait ProviderAvailability: Send + Sync {
	/// Valid providers in [`Provider::PRIORITY`] order.
	async fn valid_providers(&self, user_id: &str) -> std::result::Result<Vec<Provider>, CredentialError>;
}

#[async_trait]
impl ProviderAvailability for CredentialStore {
	async fn valid_providers(&self, user_id: &str) -> std::result::Result<Vec<Provider>, CredentialError> {
		CredentialStore::valid_providers(self, user_id).await
	}
}

pub struct PreferenceResolver {
	records: Arc<dyn PreferenceRecordStore>,
	availability: Arc<dyn ProviderAvailability>,
	reference_pricing: HashMap<Provider, ModelPricing>,
}

impl PreferenceResolver {
	pub fn new(
		records: Arc<dyn PreferenceRecordStore>,
		availability: Arc<dyn ProviderAvailability>,
	) -> Self {
		Self {
			records,
			availability,
			reference_pricing: HashMap::new(),
		}
	}

	/// Static per-provider prices used by the cost override. Providers
	/// without an entry are never chosen by it.
	pub fn with_reference_pricing(mut self, pricing: HashMap<Provider, ModelPricing>) -> Self {
		self.reference_pricing = pricing;
		self
	}

	#[instrument(skip(self), fields(user_id = %user_id, request_type = %request_type))]
	pub async fn resolve(
		&self,
		user_id: &str,
		request_type: RequestType,
	) -> Result<ProviderSelection> {
		let available = self.availability.valid_providers(user_id).await?;
		let stored = self.records.get_preference(user_id).await?;
		let has_preferences = stored.is_some();
		let preference = stored.unwrap_or_else(|| Self::default_for(user_id, &available));

		let selection = self.select(&preference, &available, request_type, has_preferences);
		debug!(
			preferred = ?selection.preferred,
			fallbacks = ?selection.fallbacks,
			applied = ?selection.policy.applied,
			"providers resolved"
		);
		Ok(selection)
	}

	fn select(
		&self,
		preference: &PreferenceRecord,
		available: &[Provider],
		request_type: RequestType,
		has_preferences: bool,
	) -> ProviderSelection {
		let mut fallbacks: Vec<Provider> = Vec::with_capacity(preference.fallback_providers.len());
		for provider in &preference.fallback_providers {
			if available.contains(provider)
				&& *provider != preference.preferred_provider
				&& !fallbacks.contains(provider)
			{
				fallbacks.push(*provider);
			}
		}

		let mut preferred = if available.contains(&preference.preferred_provider) {
			Some(preference.preferred_provider)
		} else if !fallbacks.is_empty() {
			Some(fallbacks.remove(0))
		} else {
			available.first().copied()
		};

		let mut applied = None;
		if let Some((rule, target)) = self.override_target(preference, available, request_type) {
			if preferred != Some(target) {
				fallbacks.retain(|p| *p != target);
				if let Some(displaced) = preferred {
					fallbacks.insert(0, displaced);
				}
				preferred = Some(target);
				applied = Some(rule);
			}
		}

		ProviderSelection {
			preferred,
			fallbacks,
			available: available.to_vec(),
			policy: SelectionPolicy {
				cost_optimization: preference.cost_optimization,
				quality_preference: preference.quality_preference,
				applied,
			},
			has_preferences,
		}
	}

	fn override_target(
		&self,
		preference: &PreferenceRecord,
		available: &[Provider],
		request_type: RequestType,
	) -> Option<(PolicyOverride, Provider)> {
		if request_type == RequestType::Recap
			&& preference.quality_preference == QualityPreference::Quality
		{
			if let Some(provider) = QUALITY_PROVIDERS
				.into_iter()
				.find(|p| available.contains(p))
			{
				return Some((PolicyOverride::Quality, provider));
			}
		}

		if preference.cost_optimization {
			return self
				.cheapest(available)
				.map(|provider| (PolicyOverride::Cost, provider));
		}

		None
	}

	/// Lowest combined input and output price per 1K tokens. Ties keep the
	/// earlier provider in `available`.
	fn cheapest(&self, available: &[Provider]) -> Option<Provider> {
		let mut best: Option<(Provider, f64)> = None;
		for provider in available {
			let Some(pricing) = self.reference_pricing.get(provider) else {
				continue;
			};
			let blended = pricing.input_per_1k + pricing.output_per_1k;
			if best.map_or(true, |(_, current)| blended < current) {
				best = Some((*provider, blended));
			}
		}
		best.map(|(provider, _)| provider)
	}

	pub async fn get(&self, user_id: &str) -> Result<Option<PreferenceRecord>> {
		Ok(self.records.get_preference(user_id).await?)
	}

	/// Validates and stores `record`, returning the persisted row.
	#[instrument(skip(self, record), fields(user_id = %record.user_id))]
	pub async fn save(&self, mut record: PreferenceRecord) -> Result<PreferenceRecord> {
		validate(&record)?;
		record.updated_at = Utc::now();
		self.records.upsert_preference(&record).await?;

		let stored = self
			.records
			.get_preference(&record.user_id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("preference for {}", record.user_id)))?;
		info!(preferred = %stored.preferred_provider, "provider preference saved");
		Ok(stored)
	}

	/// Applies `patch` on top of the stored preference, or on top of the
	/// defaults when none is stored. Every provider named in the patch must
	/// have a valid key.
	#[instrument(skip(self, patch), fields(user_id = %user_id))]
	pub async fn update(&self, user_id: &str, patch: PreferencePatch) -> Result<PreferenceRecord> {
		let available = self.availability.valid_providers(user_id).await?;
		if let Some(missing) = patch.providers().find(|p| !available.contains(p)) {
			return Err(PreferenceError::ProviderUnavailable(missing));
		}

		let mut record = match self.records.get_preference(user_id).await? {
			Some(record) => record,
			None => Self::default_for(user_id, &available),
		};

		if let Some(preferred) = patch.preferred_provider {
			record.preferred_provider = preferred;
			if patch.fallback_providers.is_none() {
				record.fallback_providers.retain(|p| *p != preferred);
			}
		}
		if let Some(fallbacks) = patch.fallback_providers {
			record.fallback_providers = fallbacks;
		}
		if let Some(cost_optimization) = patch.cost_optimization {
			record.cost_optimization = cost_optimization;
		}
		if let Some(quality) = patch.quality_preference {
			record.quality_preference = quality;
		}

		self.save(record).await
	}

	/// Deletes the stored preference. Returns false if there was none.
	#[instrument(skip(self), fields(user_id = %user_id))]
	pub async fn reset(&self, user_id: &str) -> Result<bool> {
		let deleted = self.records.delete_preference(user_id).await?;
		if deleted {
			info!("provider preference reset");
		}
		Ok(deleted)
	}

	/// Preference synthesized from [`Provider::PRIORITY`]: the first
	/// available provider is preferred and the rest follow as fallbacks.
	pub fn default_for(user_id: &str, available: &[Provider]) -> PreferenceRecord {
		let preferred = Provider::PRIORITY
			.into_iter()
			.find(|p| available.contains(p))
			.or_else(|| available.first().copied());

		let mut fallbacks = Vec::with_capacity(available.len());
		for provider in available {
			if Some(*provider) != preferred && !fallbacks.contains(provider) {
				fallbacks.push(*provider);
			}
		}

		let now = Utc::now();
		PreferenceRecord {
			user_id: user_id.to_string(),
			preferred_provider: preferred.unwrap_or(NO_CREDENTIAL_DEFAULT),
			fallback_providers: fallbacks,
			cost_optimization: false,
			quality_preference: QualityPreference::default(),
			created_at: now,
			updated_at: now,
		}
	}
}

fn validate(record: &PreferenceRecord) -> Result<()> {
	let mut seen = Vec::with_capacity(record.fallback_providers.len());
	for provider in &record.fallback_providers {
		if *provider == record.preferred_provider {
			return Err(PreferenceError::PreferredInFallbacks(*provider));
		}
		if seen.contains(provider) {
			return Err(PreferenceError::DuplicateFallback(*provider));
		}
		seen.push(*provider);
	}
	Ok(())
}
