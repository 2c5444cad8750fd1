// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # recap-server-db
//!
//! Persistence for user LLM credentials and provider preferences, using
//! SQLite via sqlx.
//!
//! ## Repository Pattern
//!
//! Each table has a `*RecordStore` trait describing the interface and a
//! `*Repository` struct holding a `SqlitePool` that implements it. Services
//! depend on the trait so tests can swap the backing store.
//!
//! ## Return Type Conventions
//!
//! | Operation | Return type |
//! |-----------|-------------|
//! | Get by key | `Result<Option<T>>` |
//! | List | `Result<Vec<T>>` |
//! | Upsert | `Result<()>` |
//! | Delete / update by key | `Result<bool>` (true if a row matched) |
//!
//! ## Testing
//!
//! [`testing::create_test_pool`] returns a single-connection in-memory pool
//! with migrations applied.

pub mod credential;
mod error;
pub mod pool;
pub mod preference;
pub mod testing;

pub use credential::{CredentialRecord, CredentialRecordStore, CredentialRepository};
pub use error::{DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use preference::{
	PreferenceRecord, PreferenceRecordStore, PreferenceRepository, QualityPreference,
};
