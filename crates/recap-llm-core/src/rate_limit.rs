// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Sliding-window request limiter, one per adapter.
//!
//! Pruning, the limit check and the insert of a new timestamp happen under
//! one lock, so concurrent callers can never jointly exceed the limit. The
//! slot taken by [`RateLimiter::try_acquire`] is held by a
//! [`RateLimitPermit`]; dropping the permit without calling
//! [`RateLimitPermit::commit`] gives the slot back, which is what happens
//! when the calling future is cancelled mid-request.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RateLimiter {
	limit: Option<u32>,
	window: Duration,
	state: Mutex<WindowState>,
}

#[derive(Debug, Default)]
struct WindowState {
	entries: VecDeque<(u64, Instant)>,
	next_id: u64,
}

impl RateLimiter {
	/// `None` or `Some(0)` means unlimited.
	pub fn per_minute(limit: Option<u32>) -> Self {
		Self::with_window(limit, DEFAULT_WINDOW)
	}

	pub fn with_window(limit: Option<u32>, window: Duration) -> Self {
		Self {
			limit: limit.filter(|l| *l > 0),
			window,
			state: Mutex::new(WindowState::default()),
		}
	}

	pub fn limit(&self) -> Option<u32> {
		self.limit
	}

	/// Requests currently counted in the window.
	pub fn in_window(&self) -> usize {
		let mut state = self.state.lock();
		prune(&mut state.entries, self.window, Instant::now());
		state.entries.len()
	}

	/// Reserve a slot, or return how long until the oldest entry leaves the
	/// window.
	pub fn try_acquire(&self) -> Result<RateLimitPermit<'_>, Duration> {
		let Some(limit) = self.limit else {
			return Ok(RateLimitPermit {
				limiter: self,
				id: None,
			});
		};

		let now = Instant::now();
		let mut state = self.state.lock();
		prune(&mut state.entries, self.window, now);

		if state.entries.len() >= limit as usize {
			let oldest = state.entries.front().map(|(_, at)| *at).unwrap_or(now);
			let retry_after = self.window.saturating_sub(now.duration_since(oldest));
			return Err(retry_after);
		}

		let id = state.next_id;
		state.next_id = state.next_id.wrapping_add(1);
		state.entries.push_back((id, now));

		Ok(RateLimitPermit {
			limiter: self,
			id: Some(id),
		})
	}

	fn release(&self, id: u64) {
		let mut state = self.state.lock();
		if let Some(pos) = state.entries.iter().position(|(entry, _)| *entry == id) {
			state.entries.remove(pos);
		}
	}
}

fn prune(entries: &mut VecDeque<(u64, Instant)>, window: Duration, now: Instant) {
	while let Some((_, at)) = entries.front() {
		if now.duration_since(*at) >= window {
			entries.pop_front();
		} else {
			break;
		}
	}
}

/// A reserved rate-limit slot.
#[must_use = "dropping the permit releases the reserved slot"]
#[derive(Debug)]
pub struct RateLimitPermit<'a> {
	limiter: &'a RateLimiter,
	id: Option<u64>,
}

impl RateLimitPermit<'_> {
	/// Keep the slot counted: the vendor call reached a definite outcome.
	pub fn commit(mut self) {
		self.id = None;
	}
}

impl Drop for RateLimitPermit<'_> {
	fn drop(&mut self) {
		if let Some(id) = self.id.take() {
			self.limiter.release(id);
		}
	}
}

/// Whole seconds, rounded up, for `retry_after` reporting.
pub fn retry_after_secs(wait: Duration) -> u64 {
	let secs = wait.as_secs();
	if wait.subsec_nanos() > 0 {
		secs + 1
	} else {
		secs
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::thread;

	#[test]
	fn unlimited_never_rejects() {
		let limiter = RateLimiter::per_minute(None);
		for _ in 0..1000 {
			limiter.try_acquire().unwrap().commit();
		}
		assert_eq!(limiter.in_window(), 0);

		let zero = RateLimiter::per_minute(Some(0));
		assert!(zero.limit().is_none());
	}

	#[test]
	fn request_over_limit_is_rejected_until_window_rolls() {
		let limiter = RateLimiter::with_window(Some(3), Duration::from_millis(80));
		for _ in 0..3 {
			limiter.try_acquire().unwrap().commit();
		}

		let wait = limiter.try_acquire().unwrap_err();
		assert!(wait <= Duration::from_millis(80));

		thread::sleep(Duration::from_millis(100));
		assert!(limiter.try_acquire().is_ok());
	}

	#[test]
	fn dropped_permit_releases_slot() {
		let limiter = RateLimiter::with_window(Some(1), Duration::from_secs(60));
		{
			let _permit = limiter.try_acquire().unwrap();
			assert!(limiter.try_acquire().is_err());
		}
		assert_eq!(limiter.in_window(), 0);
		limiter.try_acquire().unwrap().commit();
		assert_eq!(limiter.in_window(), 1);
	}

	#[test]
	fn concurrent_acquires_never_exceed_limit() {
		let limiter = Arc::new(RateLimiter::with_window(Some(25), Duration::from_secs(60)));
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let limiter = Arc::clone(&limiter);
				thread::spawn(move || {
					let mut granted = 0;
					for _ in 0..10 {
						if let Ok(permit) = limiter.try_acquire() {
							permit.commit();
							granted += 1;
						}
					}
					granted
				})
			})
			.collect();

		let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
		assert_eq!(total, 25);
		assert_eq!(limiter.in_window(), 25);
	}

	#[test]
	fn retry_after_rounds_up() {
		assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
		assert_eq!(retry_after_secs(Duration::from_secs(4)), 4);
		assert_eq!(retry_after_secs(Duration::ZERO), 0);
	}
}
