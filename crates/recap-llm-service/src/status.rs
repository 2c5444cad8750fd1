// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Per-provider runtime health and usage accounting.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use recap_llm_core::{Provider, TokenUsage};
use serde::Serialize;

/// Number of recent outcomes the success rate is computed over.
pub const OUTCOME_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
	Active,
	Degraded,
}

/// Fixed-capacity ring of recent call outcomes.
#[derive(Debug, Clone)]
pub(crate) struct OutcomeRing {
	outcomes: VecDeque<bool>,
	capacity: usize,
}

impl OutcomeRing {
	pub(crate) fn new(capacity: usize) -> Self {
		Self {
			outcomes: VecDeque::with_capacity(capacity),
			capacity,
		}
	}

	pub(crate) fn push(&mut self, success: bool) {
		if self.outcomes.len() == self.capacity {
			self.outcomes.pop_front();
		}
		self.outcomes.push_back(success);
	}

	pub(crate) fn len(&self) -> usize {
		self.outcomes.len()
	}

	/// 1.0 until the first outcome is recorded.
	pub(crate) fn success_rate(&self) -> f64 {
		if self.outcomes.is_empty() {
			return 1.0;
		}
		let ok = self.outcomes.iter().filter(|o| **o).count();
		ok as f64 / self.outcomes.len() as f64
	}
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeStatus {
	pub(crate) availability: Availability,
	pub(crate) last_check: Option<DateTime<Utc>>,
	pub(crate) outcomes: OutcomeRing,
	pub(crate) request_count: u64,
	pub(crate) input_tokens: u64,
	pub(crate) output_tokens: u64,
	pub(crate) total_cost_usd: f64,
	pub(crate) last_error: Option<String>,
	pub(crate) health_latency_ms: Option<u64>,
}

impl RuntimeStatus {
	pub(crate) fn active() -> Self {
		Self {
			availability: Availability::Active,
			last_check: Some(Utc::now()),
			outcomes: OutcomeRing::new(OUTCOME_WINDOW),
			request_count: 0,
			input_tokens: 0,
			output_tokens: 0,
			total_cost_usd: 0.0,
			last_error: None,
			health_latency_ms: None,
		}
	}

	pub(crate) fn is_active(&self) -> bool {
		self.availability == Availability::Active
	}

	pub(crate) fn record_success(&mut self, usage: TokenUsage, cost_usd: f64) {
		self.request_count += 1;
		self.outcomes.push(true);
		self.input_tokens += u64::from(usage.input_tokens);
		self.output_tokens += u64::from(usage.output_tokens);
		self.total_cost_usd += cost_usd;
	}

	pub(crate) fn record_failure(&mut self, error: String, degrade: bool) {
		self.request_count += 1;
		self.outcomes.push(false);
		self.last_error = Some(error);
		if degrade {
			self.availability = Availability::Degraded;
		}
	}

	pub(crate) fn snapshot(&self, provider: Provider, model: &str) -> ProviderStatus {
		ProviderStatus {
			provider,
			model: model.to_string(),
			availability: self.availability,
			last_check: self.last_check,
			success_rate: self.outcomes.success_rate(),
			request_count: self.request_count,
			input_tokens: self.input_tokens,
			output_tokens: self.output_tokens,
			total_cost_usd: recap_llm_core::round_usd(self.total_cost_usd),
			last_error: self.last_error.clone(),
			health_latency_ms: self.health_latency_ms,
		}
	}
}

/// Point-in-time view of one provider, safe to serialize to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
	pub provider: Provider,
	pub model: String,
	pub availability: Availability,
	pub last_check: Option<DateTime<Utc>>,
	pub success_rate: f64,
	pub request_count: u64,
	pub input_tokens: u64,
	pub output_tokens: u64,
	pub total_cost_usd: f64,
	pub last_error: Option<String>,
	pub health_latency_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn empty_ring_reports_full_success() {
		assert_eq!(OutcomeRing::new(OUTCOME_WINDOW).success_rate(), 1.0);
	}

	#[test]
	fn ring_forgets_oldest_outcome() {
		let mut ring = OutcomeRing::new(3);
		ring.push(false);
		ring.push(true);
		ring.push(true);
		ring.push(true);
		assert_eq!(ring.len(), 3);
		assert_eq!(ring.success_rate(), 1.0);
	}

	#[test]
	fn failures_only_accumulate_requests() {
		let mut status = RuntimeStatus::active();
		status.record_failure("timeout".into(), false);
		status.record_success(
			TokenUsage {
				input_tokens: 10,
				output_tokens: 5,
			},
			0.25,
		);
		assert_eq!(status.request_count, 2);
		assert_eq!(status.input_tokens, 10);
		assert_eq!(status.total_cost_usd, 0.25);
		assert!(status.is_active());

		status.record_failure("quota".into(), true);
		assert_eq!(status.availability, Availability::Degraded);
	}

	proptest! {
		#[test]
		fn ring_never_exceeds_capacity(outcomes in proptest::collection::vec(any::<bool>(), 0..400)) {
			let mut ring = OutcomeRing::new(OUTCOME_WINDOW);
			for o in &outcomes {
				ring.push(*o);
			}
			prop_assert!(ring.len() <= OUTCOME_WINDOW);
			let rate = ring.success_rate();
			prop_assert!((0.0..=1.0).contains(&rate));
		}
	}
}
