// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository for per-user provider routing preferences.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recap_llm_core::Provider;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use crate::credential::{parse_provider, parse_timestamp};
use crate::error::DbError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreference {
	Speed,
	#[default]
	Balanced,
	Quality,
}

impl QualityPreference {
	pub fn as_str(&self) -> &'static str {
		match self {
			QualityPreference::Speed => "speed",
			QualityPreference::Balanced => "balanced",
			QualityPreference::Quality => "quality",
		}
	}
}

impl fmt::Display for QualityPreference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for QualityPreference {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"speed" => Ok(QualityPreference::Speed),
			"balanced" => Ok(QualityPreference::Balanced),
			"quality" => Ok(QualityPreference::Quality),
			other => Err(format!(
				"unknown quality preference '{other}', expected 'speed', 'balanced', or 'quality'"
			)),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
	pub user_id: String,
	pub preferred_provider: Provider,
	pub fallback_providers: Vec<Provider>,
	pub cost_optimization: bool,
	pub quality_preference: QualityPreference,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

type PreferenceRow = (String, String, String, bool, String, String, String);

impl TryFrom<PreferenceRow> for PreferenceRecord {
	type Error = DbError;

	fn try_from(row: PreferenceRow) -> Result<Self, Self::Error> {
		let (user_id, preferred, fallbacks, cost_optimization, quality, created_at, updated_at) = row;
		let fallback_names: Vec<String> = serde_json::from_str(&fallbacks)?;

		Ok(Self {
			user_id,
			preferred_provider: parse_provider(&preferred)?,
			fallback_providers: fallback_names
				.iter()
				.map(|p| parse_provider(p))
				.collect::<Result<_, _>>()?,
			cost_optimization,
			quality_preference: quality.parse().map_err(DbError::Internal)?,
			created_at: parse_timestamp("created_at", &created_at)?,
			updated_at: parse_timestamp("updated_at", &updated_at)?,
		})
	}
}

#[async_trait]
pub trait PreferenceRecordStore: Send + Sync {
	async fn get_preference(&self, user_id: &str) -> Result<Option<PreferenceRecord>, DbError>;

	/// Insert or replace; an existing row keeps its `created_at`.
	async fn upsert_preference(&self, record: &PreferenceRecord) -> Result<(), DbError>;

	async fn delete_preference(&self, user_id: &str) -> Result<bool, DbError>;
}

#[derive(Clone)]
pub struct PreferenceRepository {
	pool: SqlitePool,
}

impl PreferenceRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn get_preference(&self, user_id: &str) -> Result<Option<PreferenceRecord>, DbError> {
		let row: Option<PreferenceRow> = sqlx::query_as(
			r#"
			SELECT user_id, preferred_provider, fallback_providers, cost_optimization,
			       quality_preference, created_at, updated_at
			FROM user_provider_preferences
			WHERE user_id = ?1
			"#,
		)
		.bind(user_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(PreferenceRecord::try_from).transpose()
	}

	#[tracing::instrument(
		skip(self, record),
		fields(user_id = %record.user_id, preferred = %record.preferred_provider)
	)]
	pub async fn upsert_preference(&self, record: &PreferenceRecord) -> Result<(), DbError> {
		let fallbacks: Vec<&str> = record.fallback_providers.iter().map(|p| p.as_str()).collect();

		sqlx::query(
			r#"
			INSERT INTO user_provider_preferences (
				user_id, preferred_provider, fallback_providers, cost_optimization,
				quality_preference, created_at, updated_at
			)
			VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
			ON CONFLICT(user_id) DO UPDATE SET
				preferred_provider = excluded.preferred_provider,
				fallback_providers = excluded.fallback_providers,
				cost_optimization  = excluded.cost_optimization,
				quality_preference = excluded.quality_preference,
				updated_at         = excluded.updated_at
			"#,
		)
		.bind(&record.user_id)
		.bind(record.preferred_provider.as_str())
		.bind(serde_json::to_string(&fallbacks)?)
		.bind(record.cost_optimization)
		.bind(record.quality_preference.as_str())
		.bind(record.created_at.to_rfc3339())
		.bind(record.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		tracing::debug!("preference stored");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn delete_preference(&self, user_id: &str) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM user_provider_preferences WHERE user_id = ?1")
			.bind(user_id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}
}

#[async_trait]
impl PreferenceRecordStore for PreferenceRepository {
	async fn get_preference(&self, user_id: &str) -> Result<Option<PreferenceRecord>, DbError> {
		self.get_preference(user_id).await
	}

	async fn upsert_preference(&self, record: &PreferenceRecord) -> Result<(), DbError> {
		self.upsert_preference(record).await
	}

	async fn delete_preference(&self, user_id: &str) -> Result<bool, DbError> {
		self.delete_preference(user_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use proptest::prelude::*;

	fn record(user_id: &str) -> PreferenceRecord {
		let now = Utc::now();
		PreferenceRecord {
			user_id: user_id.to_string(),
			preferred_provider: Provider::Anthropic,
			fallback_providers: vec![Provider::OpenAi, Provider::Google],
			cost_optimization: false,
			quality_preference: QualityPreference::Quality,
			created_at: now,
			updated_at: now,
		}
	}

	#[tokio::test]
	async fn upsert_and_get() {
		let repo = PreferenceRepository::new(create_test_pool().await.unwrap());
		let stored = record("u1");
		repo.upsert_preference(&stored).await.unwrap();

		let fetched = repo.get_preference("u1").await.unwrap().unwrap();
		assert_eq!(fetched.preferred_provider, Provider::Anthropic);
		assert_eq!(
			fetched.fallback_providers,
			vec![Provider::OpenAi, Provider::Google]
		);
		assert_eq!(fetched.quality_preference, QualityPreference::Quality);
		assert!(repo.get_preference("u2").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn upsert_replaces_existing() {
		let repo = PreferenceRepository::new(create_test_pool().await.unwrap());
		let first = record("u1");
		repo.upsert_preference(&first).await.unwrap();

		let mut second = record("u1");
		second.preferred_provider = Provider::Google;
		second.fallback_providers = vec![];
		second.cost_optimization = true;
		repo.upsert_preference(&second).await.unwrap();

		let fetched = repo.get_preference("u1").await.unwrap().unwrap();
		assert_eq!(fetched.preferred_provider, Provider::Google);
		assert!(fetched.fallback_providers.is_empty());
		assert!(fetched.cost_optimization);
		assert_eq!(
			fetched.created_at.timestamp_millis(),
			first.created_at.timestamp_millis()
		);
	}

	#[tokio::test]
	async fn delete_preference() {
		let repo = PreferenceRepository::new(create_test_pool().await.unwrap());
		repo.upsert_preference(&record("u1")).await.unwrap();
		assert!(repo.delete_preference("u1").await.unwrap());
		assert!(!repo.delete_preference("u1").await.unwrap());
	}

	proptest! {
		#[test]
		fn quality_parse_roundtrips(q in prop_oneof![
			Just(QualityPreference::Speed),
			Just(QualityPreference::Balanced),
			Just(QualityPreference::Quality),
		]) {
			prop_assert_eq!(q.as_str().to_uppercase().parse::<QualityPreference>(), Ok(q));
		}
	}
}
