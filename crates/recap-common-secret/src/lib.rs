// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for credential material.
//!
//! Every vendor API key and the encryption master key travel through the
//! process inside [`Secret<T>`]. The wrapper:
//!
//! - prints `[REDACTED]` for both `Debug` and `Display`, so `tracing` fields
//!   such as `info!(api_key = %key)` never leak the value
//! - serializes as `"[REDACTED]"` (deserialization reads the real value)
//! - zeroes its memory on drop
//! - has no `Deref`; callers opt in with [`Secret::expose`]
//!
//! ```
//! use recap_common_secret::SecretString;
//!
//! let key = SecretString::new("sk-test-1234567890".to_string());
//! assert_eq!(format!("{key}"), "[REDACTED]");
//! assert_eq!(key.expose(), "sk-test-1234567890");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// Placeholder written wherever a secret would otherwise be printed.
pub const REDACTED: &str = "[REDACTED]";

/// A value that must never appear in logs, responses, or config dumps.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// The common case: a secret string such as an API key.
pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the wrapped value. Each call site is an explicit disclosure point.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl SecretString {
	/// Number of characters in the secret; safe to log.
	pub fn char_len(&self) -> usize {
		self.inner.chars().count()
	}

	/// Returns a new secret with surrounding whitespace removed.
	pub fn trimmed(&self) -> SecretString {
		Secret::new(self.inner.trim().to_string())
	}

	/// The trailing `n` characters, used for fingerprinting.
	pub fn suffix(&self, n: usize) -> &str {
		let count = self.inner.chars().count();
		if count <= n {
			return &self.inner;
		}
		let start = self
			.inner
			.char_indices()
			.nth(count - n)
			.map(|(idx, _)| idx)
			.unwrap_or(0);
		&self.inner[start..]
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Secret::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Secret::new(value.to_string())
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
