// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory pools for tests in this and downstream crates.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::DbError;
use crate::pool::run_migrations;

/// Single-connection in-memory database with the schema applied. One
/// connection keeps every query on the same database.
pub async fn create_test_pool() -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?;

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await?;

	run_migrations(&pool).await?;
	Ok(pool)
}
