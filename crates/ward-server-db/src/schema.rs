// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schema bootstrap.
//!
//! Every statement is idempotent so [`run_migrations`] can run on each start.
//! Ids are UUID strings and timestamps are RFC 3339 strings in UTC.

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS permission_records (
		id TEXT PRIMARY KEY,
		user_id TEXT,
		resource_type TEXT NOT NULL CHECK (resource_type IN ('workspace', 'subspace', 'document')),
		resource_id TEXT NOT NULL,
		permission TEXT NOT NULL,
		source_type TEXT NOT NULL,
		source_id TEXT,
		priority INTEGER NOT NULL,
		created_by_id TEXT,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_permission_records_key ON permission_records(user_id, resource_type, resource_id)",
	"CREATE INDEX IF NOT EXISTS idx_permission_records_source ON permission_records(source_type, source_id)",
	r#"
	CREATE TABLE IF NOT EXISTS workspaces (
		id TEXT PRIMARY KEY,
		name TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS workspace_members (
		workspace_id TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
		user_id TEXT NOT NULL,
		role TEXT NOT NULL CHECK (role IN ('admin', 'member')),
		created_at TEXT NOT NULL,
		PRIMARY KEY (workspace_id, user_id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS subspaces (
		id TEXT PRIMARY KEY,
		workspace_id TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
		name TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS subspace_members (
		subspace_id TEXT NOT NULL REFERENCES subspaces(id) ON DELETE CASCADE,
		user_id TEXT NOT NULL,
		role TEXT NOT NULL CHECK (role IN ('admin', 'member')),
		created_at TEXT NOT NULL,
		PRIMARY KEY (subspace_id, user_id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS documents (
		id TEXT PRIMARY KEY,
		workspace_id TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
		subspace_id TEXT REFERENCES subspaces(id) ON DELETE SET NULL,
		title TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS groups (
		id TEXT PRIMARY KEY,
		workspace_id TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
		name TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS group_members (
		group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
		user_id TEXT NOT NULL,
		created_at TEXT NOT NULL,
		PRIMARY KEY (group_id, user_id)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_id)",
];

/// Create every table and index the permission engine needs.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	let mut tx = pool.begin().await?;
	for statement in STATEMENTS {
		sqlx::query(statement).execute(&mut *tx).await?;
	}
	tx.commit().await?;

	tracing::info!(statements = STATEMENTS.len(), "database schema applied");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use sqlx::Row;

	#[tokio::test]
	async fn migrations_are_idempotent() {
		let pool = crate::testing::create_test_pool().await;
		run_migrations(&pool).await.unwrap();

		let row = sqlx::query(
			"SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = 'permission_records'",
		)
		.fetch_one(&pool)
		.await
		.unwrap();
		let n: i64 = row.get("n");
		assert_eq!(n, 1);
	}
}
