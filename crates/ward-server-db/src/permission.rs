// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission record repository.
//!
//! Records live in one flat table keyed by id, with a secondary index on the
//! resolution key `(user_id, resource_type, resource_id)`. Rows never point at
//! each other.
//!
//! Mutations that touch more than one row for a key ([`PermissionRepository::collapse`])
//! run inside a single transaction. Callers are still expected to hold the
//! per-key lock so reads and writes for one key never interleave.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;
use ward_core::{
	resolution::sort_for_resolution, GroupId, PermissionLevel, PermissionRecord, RecordId,
	ResolutionKey, ResourceId, ResourceType, SourceType, UserId,
};

use crate::error::DbError;

pub(crate) const RECORD_COLUMNS: &str = "id, user_id, resource_type, resource_id, permission, source_type, source_id, priority, created_by_id, created_at, updated_at";

#[async_trait]
pub trait PermissionStore: Send + Sync {
	async fn insert(&self, record: &PermissionRecord) -> Result<(), DbError>;
	async fn get(&self, id: &RecordId) -> Result<Option<PermissionRecord>, DbError>;
	async fn list_for_key(&self, key: &ResolutionKey) -> Result<Vec<PermissionRecord>, DbError>;
	async fn list_by_group_source(
		&self,
		group_id: &GroupId,
		user_id: Option<&UserId>,
	) -> Result<Vec<PermissionRecord>, DbError>;
	async fn update_priority(&self, id: &RecordId, priority: i64) -> Result<bool, DbError>;
	async fn collapse(
		&self,
		key: &ResolutionKey,
		keep: &RecordId,
		rewrite: Option<PermissionLevel>,
	) -> Result<u64, DbError>;
	async fn delete(&self, id: &RecordId) -> Result<bool, DbError>;
}

/// Repository for permission record operations.
#[derive(Clone)]
pub struct PermissionRepository {
	pool: SqlitePool,
}

impl PermissionRepository {
	/// Create a new repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a record as-is, including its stored `priority`.
	///
	/// # Errors
	/// Returns `DbError::Sqlx` if the id already exists.
	#[tracing::instrument(skip(self, record), fields(record_id = %record.id, source = %record.source_type))]
	pub async fn insert(&self, record: &PermissionRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO permission_records (id, user_id, resource_type, resource_id, permission, source_type, source_id, priority, created_by_id, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(record.id.to_string())
		.bind(record.user_id.map(|u| u.to_string()))
		.bind(record.resource_type.as_str())
		.bind(record.resource_id.to_string())
		.bind(record.permission.as_str())
		.bind(record.source_type.as_str())
		.bind(record.source_id.map(|s| s.to_string()))
		.bind(record.priority)
		.bind(record.created_by_id.map(|u| u.to_string()))
		.bind(format_timestamp(&record.created_at))
		.bind(format_timestamp(&record.updated_at))
		.execute(&self.pool)
		.await?;

		tracing::debug!(record_id = %record.id, "permission record inserted");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(record_id = %id))]
	pub async fn get(&self, id: &RecordId) -> Result<Option<PermissionRecord>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {RECORD_COLUMNS} FROM permission_records WHERE id = ?"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_record(&r)).transpose()
	}

	/// All records for one key, by `priority` ascending then `updated_at`
	/// descending.
	#[tracing::instrument(skip(self), fields(key = %key))]
	pub async fn list_for_key(&self, key: &ResolutionKey) -> Result<Vec<PermissionRecord>, DbError> {
		let rows = sqlx::query(&format!(
			r#"
			SELECT {RECORD_COLUMNS}
			FROM permission_records
			WHERE user_id = ? AND resource_type = ? AND resource_id = ?
			ORDER BY priority ASC, updated_at DESC
			"#
		))
		.bind(key.user_id.to_string())
		.bind(key.resource_type.as_str())
		.bind(key.resource_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		let mut records = rows
			.iter()
			.map(row_to_record)
			.collect::<Result<Vec<_>, _>>()?;
		sort_for_resolution(&mut records);
		tracing::trace!(key = %key, count = records.len(), "listed records for key");
		Ok(records)
	}

	/// Records inherited from `group_id`, optionally narrowed to one user.
	#[tracing::instrument(skip(self), fields(group_id = %group_id))]
	pub async fn list_by_group_source(
		&self,
		group_id: &GroupId,
		user_id: Option<&UserId>,
	) -> Result<Vec<PermissionRecord>, DbError> {
		let rows = match user_id {
			Some(user_id) => {
				sqlx::query(&format!(
					r#"
					SELECT {RECORD_COLUMNS}
					FROM permission_records
					WHERE source_type = ? AND source_id = ? AND user_id = ?
					"#
				))
				.bind(SourceType::Group.as_str())
				.bind(group_id.to_string())
				.bind(user_id.to_string())
				.fetch_all(&self.pool)
				.await?
			}
			None => {
				sqlx::query(&format!(
					r#"
					SELECT {RECORD_COLUMNS}
					FROM permission_records
					WHERE source_type = ? AND source_id = ?
					"#
				))
				.bind(SourceType::Group.as_str())
				.bind(group_id.to_string())
				.fetch_all(&self.pool)
				.await?
			}
		};

		rows.iter().map(row_to_record).collect()
	}

	/// Overwrite a record's stored priority.
	///
	/// # Returns
	/// `false` if no record has this id.
	#[tracing::instrument(skip(self), fields(record_id = %id))]
	pub async fn update_priority(&self, id: &RecordId, priority: i64) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE permission_records
			SET priority = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(priority)
		.bind(format_timestamp(&Utc::now()))
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		let updated = result.rows_affected() > 0;
		if updated {
			tracing::debug!(record_id = %id, priority, "record priority corrected");
		}
		Ok(updated)
	}

	/// Keep exactly one record for `key` and delete the rest, atomically.
	///
	/// When `rewrite` is set the kept record's permission is overwritten first.
	///
	/// # Errors
	/// Returns `DbError::NotFound` (and writes nothing) if `keep` is not a
	/// record of `key`.
	///
	/// # Returns
	/// Number of records deleted.
	#[tracing::instrument(skip(self), fields(key = %key, keep = %keep))]
	pub async fn collapse(
		&self,
		key: &ResolutionKey,
		keep: &RecordId,
		rewrite: Option<PermissionLevel>,
	) -> Result<u64, DbError> {
		let mut tx = self.pool.begin().await?;

		let exists = sqlx::query(
			r#"
			SELECT 1 FROM permission_records
			WHERE id = ? AND user_id = ? AND resource_type = ? AND resource_id = ?
			"#,
		)
		.bind(keep.to_string())
		.bind(key.user_id.to_string())
		.bind(key.resource_type.as_str())
		.bind(key.resource_id.to_string())
		.fetch_optional(&mut *tx)
		.await?;

		if exists.is_none() {
			return Err(DbError::NotFound(format!(
				"record {keep} is not stored under {key}"
			)));
		}

		if let Some(permission) = rewrite {
			sqlx::query(
				r#"
				UPDATE permission_records
				SET permission = ?, updated_at = ?
				WHERE id = ?
				"#,
			)
			.bind(permission.as_str())
			.bind(format_timestamp(&Utc::now()))
			.bind(keep.to_string())
			.execute(&mut *tx)
			.await?;
		}

		let deleted = sqlx::query(
			r#"
			DELETE FROM permission_records
			WHERE user_id = ? AND resource_type = ? AND resource_id = ? AND id != ?
			"#,
		)
		.bind(key.user_id.to_string())
		.bind(key.resource_type.as_str())
		.bind(key.resource_id.to_string())
		.bind(keep.to_string())
		.execute(&mut *tx)
		.await?
		.rows_affected();

		tx.commit().await?;

		tracing::debug!(key = %key, keep = %keep, deleted, rewritten = rewrite.is_some(), "records collapsed");
		Ok(deleted)
	}

	#[tracing::instrument(skip(self), fields(record_id = %id))]
	pub async fn delete(&self, id: &RecordId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM permission_records WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}
}

#[async_trait]
impl PermissionStore for PermissionRepository {
	async fn insert(&self, record: &PermissionRecord) -> Result<(), DbError> {
		self.insert(record).await
	}

	async fn get(&self, id: &RecordId) -> Result<Option<PermissionRecord>, DbError> {
		self.get(id).await
	}

	async fn list_for_key(&self, key: &ResolutionKey) -> Result<Vec<PermissionRecord>, DbError> {
		self.list_for_key(key).await
	}

	async fn list_by_group_source(
		&self,
		group_id: &GroupId,
		user_id: Option<&UserId>,
	) -> Result<Vec<PermissionRecord>, DbError> {
		self.list_by_group_source(group_id, user_id).await
	}

	async fn update_priority(&self, id: &RecordId, priority: i64) -> Result<bool, DbError> {
		self.update_priority(id, priority).await
	}

	async fn collapse(
		&self,
		key: &ResolutionKey,
		keep: &RecordId,
		rewrite: Option<PermissionLevel>,
	) -> Result<u64, DbError> {
		self.collapse(key, keep, rewrite).await
	}

	async fn delete(&self, id: &RecordId) -> Result<bool, DbError> {
		self.delete(id).await
	}
}

// =========================================================================
// Row helpers
// =========================================================================

/// Fixed-width UTC timestamps so `ORDER BY updated_at` sorts chronologically.
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
	dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn parse_optional_id<T>(value: Option<String>) -> Result<Option<T>, DbError>
where
	T: FromStr<Err = uuid::Error>,
{
	value.map(|v| T::from_str(&v)).transpose().map_err(DbError::from)
}

pub(crate) fn row_to_record(row: &SqliteRow) -> Result<PermissionRecord, DbError> {
	let id: String = row.get("id");
	let resource_type: String = row.get("resource_type");
	let resource_id: String = row.get("resource_id");
	let permission: String = row.get("permission");
	let source_type: String = row.get("source_type");
	let source_id: Option<String> = row.get("source_id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(PermissionRecord {
		id: RecordId::from_str(&id)?,
		user_id: parse_optional_id(row.get("user_id"))?,
		resource_type: ResourceType::from_str(&resource_type)?,
		resource_id: ResourceId::from_str(&resource_id)?,
		permission: PermissionLevel::from_str(&permission)?,
		source_type: SourceType::from_str(&source_type)?,
		source_id: source_id.map(|s| Uuid::parse_str(&s)).transpose()?,
		priority: row.get("priority"),
		created_by_id: parse_optional_id(row.get("created_by_id"))?,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use chrono::Duration;

	async fn make_repo() -> PermissionRepository {
		PermissionRepository::new(create_test_pool().await)
	}

	fn doc_key() -> ResolutionKey {
		ResolutionKey::new(
			UserId::generate(),
			ResourceType::Document,
			ResourceId::generate(),
		)
	}

	fn record_for(key: &ResolutionKey, source: SourceType, permission: PermissionLevel) -> PermissionRecord {
		PermissionRecord::new(
			Some(key.user_id),
			key.resource_type,
			key.resource_id,
			permission,
			source,
			None,
		)
	}

	#[tokio::test]
	async fn insert_and_get_round_trips_every_field() {
		let repo = make_repo().await;
		let key = doc_key();
		let group = GroupId::generate();
		let record = PermissionRecord::via_group(
			key.user_id,
			group,
			key.resource_type,
			key.resource_id,
			PermissionLevel::Comment,
		)
		.with_created_by(UserId::generate());

		repo.insert(&record).await.unwrap();
		let fetched = repo.get(&record.id).await.unwrap().unwrap();

		assert_eq!(fetched.id, record.id);
		assert_eq!(fetched.user_id, record.user_id);
		assert_eq!(fetched.permission, PermissionLevel::Comment);
		assert_eq!(fetched.group_id(), Some(group));
		assert_eq!(fetched.priority, SourceType::Group.priority());
		assert_eq!(fetched.created_by_id, record.created_by_id);
	}

	#[tokio::test]
	async fn get_missing_returns_none() {
		let repo = make_repo().await;
		assert!(repo.get(&RecordId::generate()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn list_for_key_orders_by_priority_then_recency() {
		let repo = make_repo().await;
		let key = doc_key();
		let now = Utc::now();

		let guest = record_for(&key, SourceType::Guest, PermissionLevel::Read);
		let old_group = record_for(&key, SourceType::Group, PermissionLevel::Read)
			.with_updated_at(now - Duration::hours(1));
		let new_group = record_for(&key, SourceType::Group, PermissionLevel::Edit).with_updated_at(now);
		let direct = record_for(&key, SourceType::Direct, PermissionLevel::Comment);

		for r in [&guest, &old_group, &new_group, &direct] {
			repo.insert(r).await.unwrap();
		}
		// Another key must not leak in.
		repo
			.insert(&record_for(&doc_key(), SourceType::Direct, PermissionLevel::Owner))
			.await
			.unwrap();

		let ids: Vec<RecordId> = repo
			.list_for_key(&key)
			.await
			.unwrap()
			.into_iter()
			.map(|r| r.id)
			.collect();
		assert_eq!(ids, vec![direct.id, new_group.id, old_group.id, guest.id]);
	}

	#[tokio::test]
	async fn list_by_group_source_filters_by_group_and_user() {
		let repo = make_repo().await;
		let group = GroupId::generate();
		let other_group = GroupId::generate();
		let alice = UserId::generate();
		let bob = UserId::generate();
		let doc = ResourceId::generate();

		for (user, g) in [(alice, group), (bob, group), (alice, other_group)] {
			repo
				.insert(&PermissionRecord::via_group(
					user,
					g,
					ResourceType::Document,
					doc,
					PermissionLevel::Read,
				))
				.await
				.unwrap();
		}

		assert_eq!(repo.list_by_group_source(&group, None).await.unwrap().len(), 2);
		let alice_only = repo
			.list_by_group_source(&group, Some(&alice))
			.await
			.unwrap();
		assert_eq!(alice_only.len(), 1);
		assert_eq!(alice_only[0].user_id, Some(alice));
	}

	#[tokio::test]
	async fn update_priority_reports_missing_rows() {
		let repo = make_repo().await;
		let key = doc_key();
		let record = record_for(&key, SourceType::Direct, PermissionLevel::Read).with_priority(6);
		repo.insert(&record).await.unwrap();

		assert!(repo.update_priority(&record.id, 1).await.unwrap());
		assert_eq!(repo.get(&record.id).await.unwrap().unwrap().priority, 1);
		assert!(!repo.update_priority(&RecordId::generate(), 1).await.unwrap());
	}

	#[tokio::test]
	async fn collapse_keeps_one_record_and_rewrites_it() {
		let repo = make_repo().await;
		let key = doc_key();
		let keep = record_for(&key, SourceType::Direct, PermissionLevel::Read);
		let drop_a = record_for(&key, SourceType::Group, PermissionLevel::Edit);
		let drop_b = record_for(&key, SourceType::Guest, PermissionLevel::Comment);
		for r in [&keep, &drop_a, &drop_b] {
			repo.insert(r).await.unwrap();
		}

		let deleted = repo
			.collapse(&key, &keep.id, Some(PermissionLevel::Manage))
			.await
			.unwrap();
		assert_eq!(deleted, 2);

		let remaining = repo.list_for_key(&key).await.unwrap();
		assert_eq!(remaining.len(), 1);
		assert_eq!(remaining[0].id, keep.id);
		assert_eq!(remaining[0].permission, PermissionLevel::Manage);
	}

	#[tokio::test]
	async fn collapse_with_foreign_keep_writes_nothing() {
		let repo = make_repo().await;
		let key = doc_key();
		let a = record_for(&key, SourceType::Direct, PermissionLevel::Read);
		let b = record_for(&key, SourceType::Group, PermissionLevel::Edit);
		repo.insert(&a).await.unwrap();
		repo.insert(&b).await.unwrap();

		let result = repo.collapse(&key, &RecordId::generate(), None).await;
		assert!(matches!(result, Err(DbError::NotFound(_))));
		assert_eq!(repo.list_for_key(&key).await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn delete_removes_single_row() {
		let repo = make_repo().await;
		let record = record_for(&doc_key(), SourceType::Direct, PermissionLevel::Read);
		repo.insert(&record).await.unwrap();

		assert!(repo.delete(&record.id).await.unwrap());
		assert!(!repo.delete(&record.id).await.unwrap());
	}

	#[test]
	fn timestamps_are_fixed_width() {
		let a = format_timestamp(&Utc::now());
		let b = format_timestamp(&(Utc::now() + Duration::days(400)));
		assert_eq!(a.len(), b.len());
		assert!(a.ends_with('Z'));
	}
}
