// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential encryption keys. Environment only.

use recap_common_config::SecretString;

#[derive(Debug, Clone, Default)]
pub struct EncryptionConfigLayer {
	pub master_key: Option<SecretString>,
	pub app_secret: Option<SecretString>,
}

impl EncryptionConfigLayer {
	pub fn merge(&mut self, other: EncryptionConfigLayer) {
		if other.master_key.is_some() {
			self.master_key = other.master_key;
		}
		if other.app_secret.is_some() {
			self.app_secret = other.app_secret;
		}
	}

	pub fn finalize(self) -> EncryptionConfig {
		EncryptionConfig {
			master_key: self.master_key,
			app_secret: self.app_secret,
		}
	}
}

/// Resolved key material. The master key wins when both are set.
#[derive(Debug, Clone, Default)]
pub struct EncryptionConfig {
	/// Base64 of 32 random bytes.
	pub master_key: Option<SecretString>,
	/// Application secret the key is derived from when no master key is set.
	pub app_secret: Option<SecretString>,
}

impl EncryptionConfig {
	pub fn is_configured(&self) -> bool {
		self.master_key.is_some() || self.app_secret.is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_keeps_base_secret() {
		let mut base = EncryptionConfigLayer {
			app_secret: Some(SecretString::new("app-secret".to_string())),
			..Default::default()
		};
		base.merge(EncryptionConfigLayer {
			master_key: Some(SecretString::new("bWFzdGVy".to_string())),
			..Default::default()
		});
		let config = base.finalize();
		assert!(config.master_key.is_some());
		assert_eq!(config.app_secret.unwrap().expose(), "app-secret");
	}

	#[test]
	fn unconfigured_by_default() {
		assert!(!EncryptionConfig::default().is_configured());
	}

	#[test]
	fn debug_redacts_keys() {
		let config = EncryptionConfigLayer {
			master_key: Some(SecretString::new("top-secret-master".to_string())),
			app_secret: Some(SecretString::new("top-secret-app".to_string())),
		}
		.finalize();
		let debug = format!("{config:?}");
		assert!(!debug.contains("top-secret-master"));
		assert!(!debug.contains("top-secret-app"));
	}
}
