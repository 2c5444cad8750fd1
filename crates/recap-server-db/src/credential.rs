// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository for encrypted per-user LLM credentials.
//!
//! One row per `(user_id, provider)`. Rows only ever hold ciphertext; the
//! secret is encrypted and decrypted above this layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recap_llm_core::Provider;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRecord {
	pub user_id: String,
	pub provider: Provider,
	pub encrypted_secret: String,
	pub fingerprint: String,
	pub is_valid: bool,
	pub last_validated: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub metadata: Value,
}

type CredentialRow = (
	String,
	String,
	String,
	String,
	bool,
	Option<String>,
	String,
	String,
	String,
);

const SELECT_COLUMNS: &str = "user_id, provider, encrypted_secret, fingerprint, is_valid, \
	last_validated, created_at, updated_at, metadata";

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|t| t.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("invalid {column} timestamp '{value}': {e}")))
}

pub(crate) fn parse_provider(value: &str) -> Result<Provider, DbError> {
	value
		.parse()
		.map_err(|e| DbError::Internal(format!("invalid stored provider: {e}")))
}

impl TryFrom<CredentialRow> for CredentialRecord {
	type Error = DbError;

	fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
		let (
			user_id,
			provider,
			encrypted_secret,
			fingerprint,
			is_valid,
			last_validated,
			created_at,
			updated_at,
			metadata,
		) = row;

		Ok(Self {
			user_id,
			provider: parse_provider(&provider)?,
			encrypted_secret,
			fingerprint,
			is_valid,
			last_validated: last_validated
				.as_deref()
				.map(|t| parse_timestamp("last_validated", t))
				.transpose()?,
			created_at: parse_timestamp("created_at", &created_at)?,
			updated_at: parse_timestamp("updated_at", &updated_at)?,
			metadata: serde_json::from_str(&metadata)?,
		})
	}
}

#[async_trait]
pub trait CredentialRecordStore: Send + Sync {
	async fn get_credential(
		&self,
		user_id: &str,
		provider: Provider,
	) -> Result<Option<CredentialRecord>, DbError>;

	/// Insert or replace the row for `(user_id, provider)`. An existing
	/// row keeps its `created_at`.
	async fn upsert_credential(&self, record: &CredentialRecord) -> Result<(), DbError>;

	async fn list_credentials(&self, user_id: &str) -> Result<Vec<CredentialRecord>, DbError>;

	async fn delete_credential(&self, user_id: &str, provider: Provider) -> Result<bool, DbError>;

	/// Returns false when no row exists. `validated_at` is only recorded
	/// when `is_valid` is true.
	async fn update_validation(
		&self,
		user_id: &str,
		provider: Provider,
		is_valid: bool,
		validated_at: DateTime<Utc>,
		metadata: &Value,
	) -> Result<bool, DbError>;
}

#[derive(Clone)]
pub struct CredentialRepository {
	pool: SqlitePool,
}

impl CredentialRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, provider = %provider))]
	pub async fn get_credential(
		&self,
		user_id: &str,
		provider: Provider,
	) -> Result<Option<CredentialRecord>, DbError> {
		let row: Option<CredentialRow> = sqlx::query_as(&format!(
			"SELECT {SELECT_COLUMNS} FROM user_llm_credentials WHERE user_id = ?1 AND provider = ?2"
		))
		.bind(user_id)
		.bind(provider.as_str())
		.fetch_optional(&self.pool)
		.await?;

		row.map(CredentialRecord::try_from).transpose()
	}

	#[tracing::instrument(
		skip(self, record),
		fields(user_id = %record.user_id, provider = %record.provider, is_valid = record.is_valid)
	)]
	pub async fn upsert_credential(&self, record: &CredentialRecord) -> Result<(), DbError> {
		let metadata = serde_json::to_string(&record.metadata)?;

		sqlx::query(
			r#"
			INSERT INTO user_llm_credentials (
				user_id, provider, encrypted_secret, fingerprint, is_valid,
				last_validated, created_at, updated_at, metadata
			)
			VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
			ON CONFLICT(user_id, provider) DO UPDATE SET
				encrypted_secret = excluded.encrypted_secret,
				fingerprint      = excluded.fingerprint,
				is_valid         = excluded.is_valid,
				last_validated   = excluded.last_validated,
				updated_at       = excluded.updated_at,
				metadata         = excluded.metadata
			"#,
		)
		.bind(&record.user_id)
		.bind(record.provider.as_str())
		.bind(&record.encrypted_secret)
		.bind(&record.fingerprint)
		.bind(record.is_valid)
		.bind(record.last_validated.map(|t| t.to_rfc3339()))
		.bind(record.created_at.to_rfc3339())
		.bind(record.updated_at.to_rfc3339())
		.bind(metadata)
		.execute(&self.pool)
		.await?;

		tracing::debug!("credential stored");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_credentials(&self, user_id: &str) -> Result<Vec<CredentialRecord>, DbError> {
		let rows: Vec<CredentialRow> = sqlx::query_as(&format!(
			"SELECT {SELECT_COLUMNS} FROM user_llm_credentials WHERE user_id = ?1 ORDER BY provider"
		))
		.bind(user_id)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(CredentialRecord::try_from).collect()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, provider = %provider))]
	pub async fn delete_credential(&self, user_id: &str, provider: Provider) -> Result<bool, DbError> {
		let result =
			sqlx::query("DELETE FROM user_llm_credentials WHERE user_id = ?1 AND provider = ?2")
				.bind(user_id)
				.bind(provider.as_str())
				.execute(&self.pool)
				.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(
		skip(self, metadata),
		fields(user_id = %user_id, provider = %provider, is_valid = is_valid)
	)]
	pub async fn update_validation(
		&self,
		user_id: &str,
		provider: Provider,
		is_valid: bool,
		validated_at: DateTime<Utc>,
		metadata: &Value,
	) -> Result<bool, DbError> {
		let validated_at = validated_at.to_rfc3339();
		let result = sqlx::query(
			r#"
			UPDATE user_llm_credentials
			SET is_valid = ?3,
				last_validated = CASE WHEN ?3 THEN ?4 ELSE last_validated END,
				updated_at = ?4,
				metadata = ?5
			WHERE user_id = ?1 AND provider = ?2
			"#,
		)
		.bind(user_id)
		.bind(provider.as_str())
		.bind(is_valid)
		.bind(&validated_at)
		.bind(serde_json::to_string(metadata)?)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}
}

#[async_trait]
impl CredentialRecordStore for CredentialRepository {
	async fn get_credential(
		&self,
		user_id: &str,
		provider: Provider,
	) -> Result<Option<CredentialRecord>, DbError> {
		self.get_credential(user_id, provider).await
	}

	async fn upsert_credential(&self, record: &CredentialRecord) -> Result<(), DbError> {
		self.upsert_credential(record).await
	}

	async fn list_credentials(&self, user_id: &str) -> Result<Vec<CredentialRecord>, DbError> {
		self.list_credentials(user_id).await
	}

	async fn delete_credential(&self, user_id: &str, provider: Provider) -> Result<bool, DbError> {
		self.delete_credential(user_id, provider).await
	}

	async fn update_validation(
		&self,
		user_id: &str,
		provider: Provider,
		is_valid: bool,
		validated_at: DateTime<Utc>,
		metadata: &Value,
	) -> Result<bool, DbError> {
		self.update_validation(user_id, provider, is_valid, validated_at, metadata)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use chrono::Duration;
	use serde_json::json;

	fn record(user_id: &str, provider: Provider, secret: &str) -> CredentialRecord {
		let now = Utc::now();
		CredentialRecord {
			user_id: user_id.to_string(),
			provider,
			encrypted_secret: format!("enc:{secret}"),
			fingerprint: "0123456789abcdef".to_string(),
			is_valid: true,
			last_validated: Some(now),
			created_at: now,
			updated_at: now,
			metadata: json!({"key_length": secret.len(), "storage_method": "aes-256-gcm"}),
		}
	}

	async fn make_repo() -> CredentialRepository {
		CredentialRepository::new(create_test_pool().await.unwrap())
	}

	#[tokio::test]
	async fn upsert_keeps_one_row_with_latest_secret() {
		let repo = make_repo().await;
		let first = record("u1", Provider::OpenAi, "first");
		repo.upsert_credential(&first).await.unwrap();

		let mut second = record("u1", Provider::OpenAi, "second");
		second.created_at = first.created_at + Duration::hours(1);
		repo.upsert_credential(&second).await.unwrap();

		let rows = repo.list_credentials("u1").await.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].encrypted_secret, "enc:second");
		assert_eq!(
			rows[0].created_at.timestamp_millis(),
			first.created_at.timestamp_millis()
		);
	}

	#[tokio::test]
	async fn rows_are_scoped_by_user_and_provider() {
		let repo = make_repo().await;
		repo.upsert_credential(&record("u1", Provider::OpenAi, "a"))
			.await
			.unwrap();
		repo.upsert_credential(&record("u1", Provider::Google, "b"))
			.await
			.unwrap();
		repo.upsert_credential(&record("u2", Provider::OpenAi, "c"))
			.await
			.unwrap();

		assert_eq!(repo.list_credentials("u1").await.unwrap().len(), 2);
		let fetched = repo
			.get_credential("u2", Provider::OpenAi)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(fetched.encrypted_secret, "enc:c");
		assert_eq!(fetched.metadata["storage_method"], "aes-256-gcm");
		assert!(repo
			.get_credential("u2", Provider::Google)
			.await
			.unwrap()
			.is_none());
	}

	#[tokio::test]
	async fn delete_reports_whether_row_existed() {
		let repo = make_repo().await;
		repo.upsert_credential(&record("u1", Provider::Anthropic, "a"))
			.await
			.unwrap();
		assert!(repo.delete_credential("u1", Provider::Anthropic).await.unwrap());
		assert!(!repo.delete_credential("u1", Provider::Anthropic).await.unwrap());
	}

	#[tokio::test]
	async fn update_validation_touches_only_target_row() {
		let repo = make_repo().await;
		repo.upsert_credential(&record("u1", Provider::OpenAi, "a"))
			.await
			.unwrap();
		repo.upsert_credential(&record("u1", Provider::Google, "b"))
			.await
			.unwrap();

		let before = repo.get_credential("u1", Provider::OpenAi).await.unwrap().unwrap();
		let updated = repo
			.update_validation(
				"u1",
				Provider::OpenAi,
				false,
				Utc::now(),
				&json!({"last_validation_error": "authentication"}),
			)
			.await
			.unwrap();
		assert!(updated);

		let openai = repo.get_credential("u1", Provider::OpenAi).await.unwrap().unwrap();
		let google = repo.get_credential("u1", Provider::Google).await.unwrap().unwrap();
		assert!(!openai.is_valid);
		assert_eq!(openai.metadata["last_validation_error"], "authentication");
		assert_eq!(openai.last_validated, before.last_validated);
		assert!(google.is_valid);

		assert!(!repo
			.update_validation("u1", Provider::Anthropic, true, Utc::now(), &json!({}))
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn corrupt_provider_is_internal_error() {
		let repo = make_repo().await;
		let now = Utc::now().to_rfc3339();
		sqlx::query(
			"INSERT INTO user_llm_credentials (user_id, provider, encrypted_secret, fingerprint, is_valid, created_at, updated_at) VALUES ('u1', 'mistral', 'x', 'y', 1, ?1, ?1)",
		)
		.bind(&now)
		.execute(repo.pool())
		.await
		.unwrap();

		let err = repo.list_credentials("u1").await.unwrap_err();
		assert!(matches!(err, DbError::Internal(_)));
	}
}
