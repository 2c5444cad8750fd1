// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Provider registry with lazy health checks and single-hop fallback.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use recap_llm_core::{
	GenerationRequest, GenerationResult, LlmError, Provider, ProviderCapabilities, ProviderConfig,
};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::adapter::ProviderAdapter;
use crate::error::GenerationFailure;
use crate::status::{Availability, ProviderStatus, RuntimeStatus};

pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ManagerConfig {
	pub health_check_interval: Duration,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
		}
	}
}

/// Caller routing preference for one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteHint {
	pub preferred: Option<Provider>,
	pub fallbacks: Vec<Provider>,
}

impl RouteHint {
	pub fn preferred(provider: Provider) -> Self {
		Self {
			preferred: Some(provider),
			fallbacks: Vec::new(),
		}
	}

	pub fn with_fallbacks(mut self, fallbacks: Vec<Provider>) -> Self {
		self.fallbacks = fallbacks;
		self
	}
}

#[derive(Debug)]
struct RegisteredProvider {
	adapter: ProviderAdapter,
	status: Mutex<RuntimeStatus>,
}

impl RegisteredProvider {
	fn provider(&self) -> Provider {
		self.adapter.provider()
	}

	fn is_active(&self) -> bool {
		self.status.lock().is_active()
	}
}

#[derive(Debug, Default)]
struct Registry {
	providers: HashMap<Provider, Arc<RegisteredProvider>>,
	default: Option<Provider>,
	fallback_order: Vec<Provider>,
}

impl Registry {
	fn active_count(&self) -> usize {
		self.providers.values().filter(|p| p.is_active()).count()
	}

	fn no_providers(&self) -> LlmError {
		LlmError::NoProvidersAvailable {
			registered: self.providers.len(),
			active: self.active_count(),
		}
	}

	/// Fallback order, then any registered provider missing from it.
	fn ordered(&self) -> Vec<Provider> {
		let mut out = self.fallback_order.clone();
		let mut rest: Vec<Provider> = self
			.providers
			.keys()
			.filter(|p| !out.contains(p))
			.copied()
			.collect();
		rest.sort();
		out.extend(rest);
		out
	}

	fn active(&self, provider: Provider, exclude: Option<Provider>) -> Option<Arc<RegisteredProvider>> {
		if Some(provider) == exclude {
			return None;
		}
		self.providers
			.get(&provider)
			.filter(|p| p.is_active())
			.cloned()
	}

	/// Preferred, then default, then the route's fallbacks (or the
	/// configured order when the route names none).
	fn select(&self, route: &RouteHint, exclude: Option<Provider>) -> Option<Arc<RegisteredProvider>> {
		if let Some(found) = route.preferred.and_then(|p| self.active(p, exclude)) {
			return Some(found);
		}
		if let Some(found) = self.default.and_then(|p| self.active(p, exclude)) {
			return Some(found);
		}
		let order = if route.fallbacks.is_empty() {
			&self.fallback_order
		} else {
			&route.fallbacks
		};
		order.iter().find_map(|p| self.active(*p, exclude))
	}
}

/// Owns the adapters registered for one tenant and routes generations
/// across them.
pub struct ProviderManager {
	config: ManagerConfig,
	registry: RwLock<Registry>,
	last_health_check: Mutex<Instant>,
}

impl ProviderManager {
	pub fn new(config: ManagerConfig) -> Self {
		Self {
			config,
			registry: RwLock::new(Registry::default()),
			last_health_check: Mutex::new(Instant::now()),
		}
	}

	/// Builds and validates an adapter, registering it only when the vendor
	/// accepts the key. Re-adding a provider replaces its adapter in place.
	#[instrument(skip(self, config), fields(provider = %config.provider))]
	pub async fn add(&self, config: ProviderConfig) -> Result<Provider, LlmError> {
		let provider = config.provider;
		let adapter = ProviderAdapter::build(config)?;

		let started = Instant::now();
		match adapter.validate().await {
			Ok(true) => {}
			Ok(false) => {
				warn!("Provider validation inconclusive, not registering");
				return Err(LlmError::Provider {
					provider,
					status: None,
					message: "key validation was inconclusive".to_string(),
				});
			}
			Err(e) => {
				warn!(error = %e, "Provider validation failed, not registering");
				return Err(e);
			}
		}

		let mut status = RuntimeStatus::active();
		status.health_latency_ms = Some(started.elapsed().as_millis() as u64);
		let registered = Arc::new(RegisteredProvider {
			adapter,
			status: Mutex::new(status),
		});

		let mut registry = self.registry.write().await;
		registry.providers.insert(provider, registered);
		if registry.default.is_none() {
			registry.default = Some(provider);
		}
		if !registry.fallback_order.contains(&provider) {
			registry.fallback_order.push(provider);
		}
		info!(
			default = ?registry.default,
			registered = registry.providers.len(),
			"Provider registered"
		);
		Ok(provider)
	}

	#[instrument(skip(self), fields(provider = %provider))]
	pub async fn remove(&self, provider: Provider) -> bool {
		let mut registry = self.registry.write().await;
		if registry.providers.remove(&provider).is_none() {
			return false;
		}
		registry.fallback_order.retain(|p| *p != provider);
		if registry.default == Some(provider) {
			registry.default = registry.fallback_order.first().copied();
		}
		info!(default = ?registry.default, "Provider removed");
		true
	}

	/// Returns false when `provider` is not registered.
	pub async fn set_default(&self, provider: Provider) -> bool {
		let mut registry = self.registry.write().await;
		if !registry.providers.contains_key(&provider) {
			return false;
		}
		registry.default = Some(provider);
		true
	}

	/// Unregistered and repeated entries are dropped.
	pub async fn set_fallback_order(&self, order: Vec<Provider>) {
		let mut registry = self.registry.write().await;
		let mut kept = Vec::with_capacity(order.len());
		for provider in order {
			if registry.providers.contains_key(&provider) && !kept.contains(&provider) {
				kept.push(provider);
			}
		}
		registry.fallback_order = kept;
	}

	pub async fn default_provider(&self) -> Option<Provider> {
		self.registry.read().await.default
	}

	/// Registered providers in fallback order.
	pub async fn providers(&self) -> Vec<Provider> {
		self.registry.read().await.ordered()
	}

	/// Active providers in fallback order.
	pub async fn available_providers(&self) -> Vec<Provider> {
		self.refresh_health_if_stale().await;
		let registry = self.registry.read().await;
		registry
			.ordered()
			.into_iter()
			.filter(|p| registry.active(*p, None).is_some())
			.collect()
	}

	pub async fn shutdown(&self) {
		let mut registry = self.registry.write().await;
		let count = registry.providers.len();
		*registry = Registry::default();
		info!(count, "Provider manager shut down");
	}

	/// Claims the health sweep if the interval has elapsed, then validates
	/// every adapter concurrently. Callers that lose the claim return
	/// immediately.
	async fn refresh_health_if_stale(&self) {
		{
			let mut last = self.last_health_check.lock();
			if last.elapsed() < self.config.health_check_interval {
				return;
			}
			*last = Instant::now();
		}

		let targets: Vec<Arc<RegisteredProvider>> =
			self.registry.read().await.providers.values().cloned().collect();
		if targets.is_empty() {
			return;
		}
		debug!(count = targets.len(), "Running provider health check");

		join_all(targets.iter().map(|entry| async move {
			let started = Instant::now();
			let outcome = entry.adapter.validate().await;
			let latency_ms = started.elapsed().as_millis() as u64;

			let mut status = entry.status.lock();
			status.last_check = Some(Utc::now());
			status.health_latency_ms = Some(latency_ms);
			let next = match &outcome {
				Ok(true) => Availability::Active,
				Ok(false) => Availability::Degraded,
				Err(e) => {
					status.last_error = Some(e.to_string());
					Availability::Degraded
				}
			};
			if status.availability != next {
				info!(
					provider = %entry.provider(),
					from = ?status.availability,
					to = ?next,
					"Provider availability changed"
				);
			}
			status.availability = next;
		}))
		.await;
	}

	async fn attempt(
		&self,
		entry: &RegisteredProvider,
		request: &GenerationRequest,
	) -> Result<GenerationResult, LlmError> {
		let outcome = entry.adapter.generate(request).await;
		let mut status = entry.status.lock();
		match &outcome {
			Ok(result) => status.record_success(result.usage, result.cost_usd),
			Err(e) => {
				if e.degrades_provider() {
					warn!(provider = %entry.provider(), error = %e, "Marking provider degraded");
				}
				status.record_failure(e.to_string(), e.degrades_provider());
			}
		}
		outcome
	}

	/// Routes one generation, spending at most one fallback hop on an
	/// eligible failure.
	#[instrument(skip(self, request, route), fields(preferred = ?route.preferred))]
	pub async fn generate(
		&self,
		request: &GenerationRequest,
		route: &RouteHint,
	) -> Result<GenerationResult, GenerationFailure> {
		request
			.validate()
			.map_err(GenerationFailure::before_dispatch)?;
		self.refresh_health_if_stale().await;

		let first = {
			let registry = self.registry.read().await;
			registry
				.select(route, None)
				.ok_or_else(|| GenerationFailure::before_dispatch(registry.no_providers()))?
		};
		let first_provider = first.provider();

		let error = match self.attempt(&first, request).await {
			Ok(result) => return Ok(result),
			Err(e) => e,
		};

		if !error.is_fallback_eligible() {
			return Err(GenerationFailure {
				attempted: vec![first_provider],
				fallback_used: false,
				error,
			});
		}

		let second = {
			let registry = self.registry.read().await;
			registry.select(route, Some(first_provider))
		};
		let Some(second) = second else {
			return Err(GenerationFailure {
				attempted: vec![first_provider],
				fallback_used: false,
				error,
			});
		};

		let second_provider = second.provider();
		warn!(
			from = %first_provider,
			to = %second_provider,
			error = %error,
			"Falling back to next provider"
		);

		match self.attempt(&second, request).await {
			Ok(mut result) => {
				result.fallback_from = Some(first_provider);
				Ok(result)
			}
			Err(error) => Err(GenerationFailure {
				attempted: vec![first_provider, second_provider],
				fallback_used: true,
				error,
			}),
		}
	}

	/// Estimated cost per Active provider, optionally restricted to
	/// `only`. Output tokens are `max_tokens` or the default budget.
	pub async fn estimate_cost_matrix(
		&self,
		request: &GenerationRequest,
		only: Option<&[Provider]>,
	) -> BTreeMap<Provider, f64> {
		let input_text = request.input_text();
		let output_tokens = request.expected_output_tokens();
		let registry = self.registry.read().await;
		registry
			.providers
			.iter()
			.filter(|(provider, _)| only.map_or(true, |only| only.contains(*provider)))
			.filter(|(_, entry)| entry.is_active())
			.map(|(provider, entry)| {
				let input_tokens = entry.adapter.estimate_tokens(&input_text);
				(*provider, entry.adapter.estimate_cost(input_tokens, output_tokens))
			})
			.collect()
	}

	/// Health-refreshed snapshot of every registered provider.
	pub async fn statuses(&self) -> BTreeMap<Provider, ProviderStatus> {
		self.refresh_health_if_stale().await;
		let registry = self.registry.read().await;
		registry
			.providers
			.iter()
			.map(|(provider, entry)| {
				let snapshot = entry.status.lock().snapshot(*provider, entry.adapter.model());
				(*provider, snapshot)
			})
			.collect()
	}

	pub async fn capabilities(&self) -> BTreeMap<Provider, ProviderCapabilities> {
		let registry = self.registry.read().await;
		registry
			.providers
			.iter()
			.map(|(provider, entry)| (*provider, entry.adapter.capabilities()))
			.collect()
	}
}

/// Lowest-cost provider in an estimate matrix.
pub fn cheapest(estimates: &BTreeMap<Provider, f64>) -> Option<Provider> {
	estimates
		.iter()
		.min_by(|a, b| a.1.total_cmp(b.1))
		.map(|(provider, _)| *provider)
}
