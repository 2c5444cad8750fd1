// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration for the recap LLM gateway.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`RECAP_*`)
//!
//! Encryption keys are only accepted from the environment (`VAR` or
//! `VAR_FILE`), never from the TOML file.

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub encryption: EncryptionConfig,
	pub llm: LlmConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`RECAP_*`)
/// 2. Config file (`/etc/recap/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge `sources` in precedence order and resolve the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let encryption = layer.encryption.unwrap_or_default().finalize();
	let llm = layer.llm.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	llm.validate()?;

	info!(
		database = %database.url,
		encryption_configured = encryption.is_configured(),
		health_check_interval_secs = llm.health_check_interval.as_secs(),
		default_provider = ?llm.default_provider,
		log_format = %logging.format,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		encryption,
		llm,
		logging,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use recap_llm_core::Provider;
	use std::io::Write;

	struct FixedSource(Precedence, fn() -> ServerConfigLayer);

	impl ConfigSource for FixedSource {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.0
		}

		fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
			Ok((self.1)())
		}
	}

	fn env_layer() -> ServerConfigLayer {
		let mut llm = LlmConfigLayer::default();
		llm.provider_mut(Provider::OpenAi).model = Some("gpt-4o-mini".to_string());
		ServerConfigLayer {
			llm: Some(llm),
			..Default::default()
		}
	}

	fn file_layer() -> ServerConfigLayer {
		let mut llm = LlmConfigLayer {
			default_provider: Some(Provider::Google),
			..Default::default()
		};
		llm.provider_mut(Provider::OpenAi).model = Some("gpt-4o".to_string());
		llm.provider_mut(Provider::OpenAi).rate_limit_per_minute = Some(20);
		ServerConfigLayer {
			llm: Some(llm),
			..Default::default()
		}
	}

	#[test]
	fn test_environment_overrides_file_regardless_of_order() {
		let config = load_from_sources(vec![
			Box::new(FixedSource(Precedence::Environment, env_layer)),
			Box::new(FixedSource(Precedence::ConfigFile, file_layer)),
			Box::new(DefaultsSource),
		])
		.unwrap();

		let openai = config.llm.settings(Provider::OpenAi);
		assert_eq!(openai.model.as_deref(), Some("gpt-4o-mini"));
		assert_eq!(openai.rate_limit_per_minute, Some(20));
		assert_eq!(config.llm.default_provider, Some(Provider::Google));
	}

	#[test]
	fn test_defaults_only() {
		let config = load_from_sources(vec![Box::new(DefaultsSource)]).unwrap();
		assert_eq!(config.database.url, "sqlite:./recap.db");
		assert!(!config.encryption.is_configured());
		assert_eq!(config.logging.format, LogFormat::Pretty);
	}

	#[test]
	fn test_invalid_llm_section_fails_load() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[llm]\nfallback_order = [\"openai\", \"openai\"]").unwrap();

		let result = load_from_sources(vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new(file.path())),
		]);
		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}
}
