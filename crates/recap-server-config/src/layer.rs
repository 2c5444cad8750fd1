// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	DatabaseConfigLayer, EncryptionConfigLayer, LlmConfigLayer, LoggingConfigLayer,
};

/// Server configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	/// Only ever populated from the environment.
	#[serde(skip)]
	pub encryption: Option<EncryptionConfigLayer>,
	#[serde(default)]
	pub llm: Option<LlmConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_option(
			&mut self.database,
			other.database,
			DatabaseConfigLayer::merge,
		);
		merge_option(
			&mut self.encryption,
			other.encryption,
			EncryptionConfigLayer::merge,
		);
		merge_option(&mut self.llm, other.llm, LlmConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

pub(crate) fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_empty_layers() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer::default());
		assert!(base.database.is_none());
		assert!(base.llm.is_none());
	}

	#[test]
	fn test_merge_other_overwrites() {
		let mut base = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite:./a.db".to_string()),
			}),
			logging: Some(LoggingConfigLayer {
				level: Some("info".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		let other = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite:./b.db".to_string()),
			}),
			..Default::default()
		};
		base.merge(other);
		assert_eq!(
			base.database.as_ref().unwrap().url,
			Some("sqlite:./b.db".to_string())
		);
		assert_eq!(
			base.logging.as_ref().unwrap().level,
			Some("info".to_string())
		);
	}

	#[test]
	fn test_toml_cannot_carry_encryption_section() {
		let result = toml::from_str::<ServerConfigLayer>(
			r#"
			[encryption]
			master_key = "not-allowed"
			"#,
		);
		assert!(result.is_err());
	}
}
