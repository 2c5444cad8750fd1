// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Maps a user to an ordered provider route.
//!
//! Stored preferences are intersected with the providers the user holds a
//! valid key for. Request-type and cost policies reorder the result at
//! resolution time and are never written back.

mod error;
mod resolver;
mod types;

pub use error::{PreferenceError, Result};
pub use recap_server_db::{PreferenceRecord, QualityPreference};
pub use resolver::{PreferenceResolver, ProviderAvailability, QUALITY_PROVIDERS};
pub use types::{
	ParseRequestTypeError, PolicyOverride, PreferencePatch, ProviderSelection, RequestType,
	SelectionPolicy,
};
