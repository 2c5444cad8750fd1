// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::DbError;

const MIGRATIONS: &[(&str, &str)] = &[
	(
		"001_user_llm_credentials",
		include_str!("../migrations/001_user_llm_credentials.sql"),
	),
	(
		"002_user_provider_preferences",
		include_str!("../migrations/002_user_provider_preferences.sql"),
	),
];

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./recap.db")
///
/// # Errors
/// Returns `DbError::Internal` if the URL is invalid or connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

/// Apply every schema migration. Safe to run repeatedly.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	for (name, sql) in MIGRATIONS {
		for stmt in sql.split(';').filter(|s| !s.trim().is_empty()) {
			sqlx::query(stmt).execute(pool).await?;
		}
		tracing::debug!(migration = name, "migration applied");
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn file_database_uses_wal_and_migrates_twice() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("recap.db").display());
		let pool = create_pool(&url).await.unwrap();

		run_migrations(&pool).await.unwrap();
		run_migrations(&pool).await.unwrap();

		let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(mode.to_lowercase(), "wal");

		let (tables,): (i64,) = sqlx::query_as(
			"SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('user_llm_credentials', 'user_provider_preferences')",
		)
		.fetch_one(&pool)
		.await
		.unwrap();
		assert_eq!(tables, 2);
	}

	#[tokio::test]
	async fn unreachable_path_fails() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("missing/recap.db").display());
		assert!(create_pool(&url).await.is_err());
	}
}
