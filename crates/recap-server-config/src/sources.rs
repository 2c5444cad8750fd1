// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use recap_common_config::load_secret_env;
use recap_llm_core::Provider;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, EncryptionConfigLayer, LlmConfigLayer, LogFormat, LoggingConfigLayer,
	ProviderSettingsLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/recap/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: RECAP_<SECTION>_<FIELD>, and
/// RECAP_LLM_<PROVIDER>_<FIELD> for per-vendor settings.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()?),
			encryption: Some(load_encryption_from_env()?),
			llm: Some(load_llm_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_provider(name: &str) -> Result<Option<Provider>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|e| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("{e}"),
		}),
		None => Ok(None),
	}
}

/// Comma-separated provider names; blank entries are ignored.
fn env_provider_list(name: &str) -> Result<Option<Vec<Provider>>, ConfigError> {
	let Some(raw) = env_var(name) else {
		return Ok(None);
	};

	raw.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|s| {
			s.parse().map_err(|e| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("{e}"),
			})
		})
		.collect::<Result<Vec<_>, _>>()
		.map(Some)
}

fn secret_env(name: &str) -> Result<Option<recap_common_config::SecretString>, ConfigError> {
	load_secret_env(name).map_err(|e| ConfigError::Secret(e.to_string()))
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("RECAP_DATABASE_URL"),
	})
}

fn load_encryption_from_env() -> Result<EncryptionConfigLayer, ConfigError> {
	Ok(EncryptionConfigLayer {
		master_key: secret_env("RECAP_ENCRYPTION_MASTER_KEY")?,
		app_secret: secret_env("RECAP_SECRET_KEY")?,
	})
}

fn load_provider_from_env(provider: Provider) -> Result<ProviderSettingsLayer, ConfigError> {
	let prefix = format!("RECAP_LLM_{}", provider.as_str().to_uppercase());
	Ok(ProviderSettingsLayer {
		model: env_var(&format!("{prefix}_MODEL")),
		base_url: env_var(&format!("{prefix}_BASE_URL")),
		rate_limit_per_minute: env_parse(&format!("{prefix}_RATE_LIMIT_PER_MINUTE"), "u32")?,
		timeout_secs: env_parse(&format!("{prefix}_TIMEOUT_SECS"), "u64")?,
		max_tokens: env_parse(&format!("{prefix}_MAX_TOKENS"), "u32")?,
		temperature: env_parse(&format!("{prefix}_TEMPERATURE"), "f32")?,
		organization: env_var(&format!("{prefix}_ORGANIZATION")),
	})
}

fn load_llm_from_env() -> Result<LlmConfigLayer, ConfigError> {
	Ok(LlmConfigLayer {
		health_check_interval_secs: env_parse("RECAP_LLM_HEALTH_CHECK_INTERVAL_SECS", "u64")?,
		max_cached_managers: env_parse("RECAP_LLM_MAX_CACHED_MANAGERS", "usize")?,
		default_provider: env_provider("RECAP_LLM_DEFAULT_PROVIDER")?,
		fallback_order: env_provider_list("RECAP_LLM_FALLBACK_ORDER")?,
		openai: Some(load_provider_from_env(Provider::OpenAi)?),
		anthropic: Some(load_provider_from_env(Provider::Anthropic)?),
		google: Some(load_provider_from_env(Provider::Google)?),
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	Ok(LoggingConfigLayer {
		level: env_var("RECAP_LOG_LEVEL"),
		format: env_var("RECAP_LOG_FORMAT")
			.map(|v| v.parse::<LogFormat>())
			.transpose()?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.database.is_none());
		assert!(layer.llm.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/recap.toml").load().unwrap();
		assert!(layer.database.is_none());
	}

	#[test]
	fn test_toml_source_reads_sections() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
			[database]
			url = "sqlite:/tmp/recap-test.db"

			[llm.google]
			model = "gemini-1.5-flash"

			[logging]
			format = "json"
			"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(
			layer.database.unwrap().url.as_deref(),
			Some("sqlite:/tmp/recap-test.db")
		);
		assert_eq!(
			layer.llm.unwrap().google.unwrap().model.as_deref(),
			Some("gemini-1.5-flash")
		);
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn test_toml_source_parse_error_names_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[database\nurl = 1").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
		assert!(err.to_string().contains(&file.path().display().to_string()));
	}

	#[test]
	fn test_env_provider_list() {
		std::env::set_var("RECAP_TEST_SOURCES_ORDER", " google, ,openai ");
		let order = env_provider_list("RECAP_TEST_SOURCES_ORDER").unwrap();
		assert_eq!(order, Some(vec![Provider::Google, Provider::OpenAi]));

		std::env::set_var("RECAP_TEST_SOURCES_ORDER_BAD", "google,vertex");
		let err = env_provider_list("RECAP_TEST_SOURCES_ORDER_BAD").unwrap_err();
		assert!(err.to_string().contains("vertex"));
	}

	#[test]
	fn test_env_parse_rejects_garbage() {
		std::env::set_var("RECAP_TEST_SOURCES_U32", "lots");
		let err = env_parse::<u32>("RECAP_TEST_SOURCES_U32", "u32").unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
		assert!(env_parse::<u32>("RECAP_TEST_SOURCES_UNSET", "u32")
			.unwrap()
			.is_none());
	}
}
