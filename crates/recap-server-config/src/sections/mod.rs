// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for recap-server.

pub mod database;
pub mod encryption;
pub mod llm;
pub mod logging;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use encryption::{EncryptionConfig, EncryptionConfigLayer};
pub use llm::{LlmConfig, LlmConfigLayer, ProviderSettings, ProviderSettingsLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
