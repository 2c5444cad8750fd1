// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client construction for the vendor adapters.
//!
//! Every outbound vendor call goes through a client built here so that the
//! `User-Agent` is consistent and every request carries a bounded timeout.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Connect timeout applied to every client; the overall request timeout is
/// per provider.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns the `User-Agent` sent to vendors: `recap/{version}`.
pub fn user_agent() -> String {
	format!("recap/{}", env!("CARGO_PKG_VERSION"))
}

/// Client builder preconfigured with the shared `User-Agent` and connect
/// timeout.
pub fn builder() -> ClientBuilder {
	Client::builder()
		.user_agent(user_agent())
		.connect_timeout(CONNECT_TIMEOUT)
}

/// Build a client whose requests time out after `timeout`.
pub fn client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
	builder().timeout(timeout).build()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_version() {
		let ua = user_agent();
		assert!(ua.starts_with("recap/"));
		assert_eq!(ua.split('/').count(), 2);
	}

	#[test]
	fn client_with_timeout_builds() {
		assert!(client_with_timeout(Duration::from_secs(5)).is_ok());
	}
}
