// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Membership and hierarchy repository.
//!
//! This module provides database access for:
//! - Workspaces, subspaces and documents (existence and hierarchy)
//! - Workspace and subspace membership with roles
//! - Groups and group membership
//! - The two cascade primitives that remove group-sourced permission records
//!   together with the membership rows backing them

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};
use std::str::FromStr;
use ward_core::{
	DocumentId, GroupId, ResourceId, ResourceType, SourceType, SubspaceId, UserId, WorkspaceId,
};

use crate::error::DbError;
use crate::permission::{
	format_timestamp, parse_optional_id, parse_timestamp, row_to_record, RECORD_COLUMNS,
};
use crate::types::{DocumentContext, Group, GroupDeletion, MemberRemoval, MemberRole};

#[async_trait]
pub trait MembershipStore: Send + Sync {
	async fn create_workspace(&self, id: &WorkspaceId, name: &str) -> Result<(), DbError>;
	async fn create_subspace(
		&self,
		id: &SubspaceId,
		workspace_id: &WorkspaceId,
		name: &str,
	) -> Result<(), DbError>;
	async fn create_document(
		&self,
		id: &DocumentId,
		workspace_id: &WorkspaceId,
		subspace_id: Option<&SubspaceId>,
		title: &str,
	) -> Result<(), DbError>;
	async fn resource_exists(
		&self,
		resource_type: ResourceType,
		resource_id: &ResourceId,
	) -> Result<bool, DbError>;
	async fn document_context(&self, id: &DocumentId) -> Result<Option<DocumentContext>, DbError>;
	async fn add_workspace_member(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		role: MemberRole,
	) -> Result<(), DbError>;
	async fn remove_workspace_member(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError>;
	async fn workspace_role(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> Result<Option<MemberRole>, DbError>;
	async fn is_workspace_member(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError>;
	async fn add_subspace_member(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
		role: MemberRole,
	) -> Result<(), DbError>;
	async fn remove_subspace_member(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError>;
	async fn subspace_role(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
	) -> Result<Option<MemberRole>, DbError>;
	async fn is_subspace_member(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError>;
	async fn create_group(&self, group: &Group) -> Result<(), DbError>;
	async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, DbError>;
	async fn group_exists(&self, id: &GroupId) -> Result<bool, DbError>;
	async fn add_group_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<(), DbError>;
	async fn list_group_members(&self, group_id: &GroupId) -> Result<Vec<UserId>, DbError>;
	async fn is_group_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, DbError>;
	async fn remove_group_member_cascade(
		&self,
		group_id: &GroupId,
		user_id: &UserId,
	) -> Result<MemberRemoval, DbError>;
	async fn delete_group_cascade(&self, group_id: &GroupId) -> Result<GroupDeletion, DbError>;
}

/// Repository for hierarchy and membership operations.
#[derive(Clone)]
pub struct MembershipRepository {
	pool: SqlitePool,
}

impl MembershipRepository {
	/// Create a new repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	// =========================================================================
	// Hierarchy
	// =========================================================================

	#[tracing::instrument(skip(self), fields(workspace_id = %id))]
	pub async fn create_workspace(&self, id: &WorkspaceId, name: &str) -> Result<(), DbError> {
		sqlx::query("INSERT INTO workspaces (id, name, created_at) VALUES (?, ?, ?)")
			.bind(id.to_string())
			.bind(name)
			.bind(format_timestamp(&Utc::now()))
			.execute(&self.pool)
			.await?;

		tracing::debug!(workspace_id = %id, "workspace created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(subspace_id = %id, workspace_id = %workspace_id))]
	pub async fn create_subspace(
		&self,
		id: &SubspaceId,
		workspace_id: &WorkspaceId,
		name: &str,
	) -> Result<(), DbError> {
		sqlx::query("INSERT INTO subspaces (id, workspace_id, name, created_at) VALUES (?, ?, ?, ?)")
			.bind(id.to_string())
			.bind(workspace_id.to_string())
			.bind(name)
			.bind(format_timestamp(&Utc::now()))
			.execute(&self.pool)
			.await?;

		tracing::debug!(subspace_id = %id, "subspace created");
		Ok(())
	}

	/// Register a document under a workspace and, optionally, a subspace.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the subspace belongs to another workspace.
	#[tracing::instrument(skip(self, title), fields(document_id = %id, workspace_id = %workspace_id))]
	pub async fn create_document(
		&self,
		id: &DocumentId,
		workspace_id: &WorkspaceId,
		subspace_id: Option<&SubspaceId>,
		title: &str,
	) -> Result<(), DbError> {
		if let Some(subspace_id) = subspace_id {
			let owner: Option<String> =
				sqlx::query_scalar("SELECT workspace_id FROM subspaces WHERE id = ?")
					.bind(subspace_id.to_string())
					.fetch_optional(&self.pool)
					.await?;
			match owner {
				Some(owner) if owner == workspace_id.to_string() => {}
				Some(_) => {
					return Err(DbError::Conflict(format!(
						"subspace {subspace_id} does not belong to workspace {workspace_id}"
					)))
				}
				None => return Err(DbError::NotFound(format!("subspace {subspace_id}"))),
			}
		}

		sqlx::query(
			"INSERT INTO documents (id, workspace_id, subspace_id, title, created_at) VALUES (?, ?, ?, ?, ?)",
		)
		.bind(id.to_string())
		.bind(workspace_id.to_string())
		.bind(subspace_id.map(|s| s.to_string()))
		.bind(title)
		.bind(format_timestamp(&Utc::now()))
		.execute(&self.pool)
		.await?;

		tracing::debug!(document_id = %id, "document created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(resource_type = %resource_type, resource_id = %resource_id))]
	pub async fn resource_exists(
		&self,
		resource_type: ResourceType,
		resource_id: &ResourceId,
	) -> Result<bool, DbError> {
		let table = match resource_type {
			ResourceType::Workspace => "workspaces",
			ResourceType::Subspace => "subspaces",
			ResourceType::Document => "documents",
		};
		let row = sqlx::query(&format!("SELECT 1 FROM {table} WHERE id = ?"))
			.bind(resource_id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.is_some())
	}

	/// Workspace and subspace that own a document.
	///
	/// # Returns
	/// `None` if the document does not exist.
	#[tracing::instrument(skip(self), fields(document_id = %id))]
	pub async fn document_context(
		&self,
		id: &DocumentId,
	) -> Result<Option<DocumentContext>, DbError> {
		let row = sqlx::query("SELECT id, workspace_id, subspace_id FROM documents WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		let Some(row) = row else {
			return Ok(None);
		};

		let document_id: String = row.get("id");
		let workspace_id: String = row.get("workspace_id");
		Ok(Some(DocumentContext {
			document_id: DocumentId::from_str(&document_id)?,
			workspace_id: WorkspaceId::from_str(&workspace_id)?,
			subspace_id: parse_optional_id(row.get("subspace_id"))?,
		}))
	}

	// =========================================================================
	// Workspace and subspace membership
	// =========================================================================

	#[tracing::instrument(skip(self), fields(workspace_id = %workspace_id, user_id = %user_id, role = %role))]
	pub async fn add_workspace_member(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		role: MemberRole,
	) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO workspace_members (workspace_id, user_id, role, created_at)
			VALUES (?, ?, ?, ?)
			ON CONFLICT (workspace_id, user_id) DO UPDATE SET role = excluded.role
			"#,
		)
		.bind(workspace_id.to_string())
		.bind(user_id.to_string())
		.bind(role.to_string())
		.bind(format_timestamp(&Utc::now()))
		.execute(&self.pool)
		.await?;

		tracing::debug!(workspace_id = %workspace_id, user_id = %user_id, "workspace member added");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(workspace_id = %workspace_id, user_id = %user_id))]
	pub async fn remove_workspace_member(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM workspace_members WHERE workspace_id = ? AND user_id = ?")
			.bind(workspace_id.to_string())
			.bind(user_id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(workspace_id = %workspace_id, user_id = %user_id))]
	pub async fn workspace_role(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> Result<Option<MemberRole>, DbError> {
		let role: Option<String> = sqlx::query_scalar(
			"SELECT role FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
		)
		.bind(workspace_id.to_string())
		.bind(user_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		Ok(role.map(|r| MemberRole::from_str(&r)).transpose()?)
	}

	pub async fn is_workspace_member(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError> {
		Ok(self.workspace_role(workspace_id, user_id).await?.is_some())
	}

	#[tracing::instrument(skip(self), fields(subspace_id = %subspace_id, user_id = %user_id, role = %role))]
	pub async fn add_subspace_member(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
		role: MemberRole,
	) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO subspace_members (subspace_id, user_id, role, created_at)
			VALUES (?, ?, ?, ?)
			ON CONFLICT (subspace_id, user_id) DO UPDATE SET role = excluded.role
			"#,
		)
		.bind(subspace_id.to_string())
		.bind(user_id.to_string())
		.bind(role.to_string())
		.bind(format_timestamp(&Utc::now()))
		.execute(&self.pool)
		.await?;

		tracing::debug!(subspace_id = %subspace_id, user_id = %user_id, "subspace member added");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(subspace_id = %subspace_id, user_id = %user_id))]
	pub async fn remove_subspace_member(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM subspace_members WHERE subspace_id = ? AND user_id = ?")
			.bind(subspace_id.to_string())
			.bind(user_id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(subspace_id = %subspace_id, user_id = %user_id))]
	pub async fn subspace_role(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
	) -> Result<Option<MemberRole>, DbError> {
		let role: Option<String> = sqlx::query_scalar(
			"SELECT role FROM subspace_members WHERE subspace_id = ? AND user_id = ?",
		)
		.bind(subspace_id.to_string())
		.bind(user_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		Ok(role.map(|r| MemberRole::from_str(&r)).transpose()?)
	}

	pub async fn is_subspace_member(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError> {
		Ok(self.subspace_role(subspace_id, user_id).await?.is_some())
	}

	// =========================================================================
	// Groups
	// =========================================================================

	#[tracing::instrument(skip(self, group), fields(group_id = %group.id))]
	pub async fn create_group(&self, group: &Group) -> Result<(), DbError> {
		sqlx::query("INSERT INTO groups (id, workspace_id, name, created_at) VALUES (?, ?, ?, ?)")
			.bind(group.id.to_string())
			.bind(group.workspace_id.to_string())
			.bind(&group.name)
			.bind(format_timestamp(&group.created_at))
			.execute(&self.pool)
			.await?;

		tracing::debug!(group_id = %group.id, "group created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, DbError> {
		let row = sqlx::query("SELECT id, workspace_id, name, created_at FROM groups WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		let Some(row) = row else {
			return Ok(None);
		};

		let id: String = row.get("id");
		let workspace_id: String = row.get("workspace_id");
		let created_at: String = row.get("created_at");
		Ok(Some(Group {
			id: GroupId::from_str(&id)?,
			workspace_id: WorkspaceId::from_str(&workspace_id)?,
			name: row.get("name"),
			created_at: parse_timestamp(&created_at, "created_at")?,
		}))
	}

	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn group_exists(&self, id: &GroupId) -> Result<bool, DbError> {
		let row = sqlx::query("SELECT 1 FROM groups WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.is_some())
	}

	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn add_group_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO group_members (group_id, user_id, created_at)
			VALUES (?, ?, ?)
			ON CONFLICT (group_id, user_id) DO NOTHING
			"#,
		)
		.bind(group_id.to_string())
		.bind(user_id.to_string())
		.bind(format_timestamp(&Utc::now()))
		.execute(&self.pool)
		.await?;

		tracing::debug!(group_id = %group_id, user_id = %user_id, "group member added");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(group_id = %group_id))]
	pub async fn list_group_members(&self, group_id: &GroupId) -> Result<Vec<UserId>, DbError> {
		let ids: Vec<String> = sqlx::query_scalar(
			"SELECT user_id FROM group_members WHERE group_id = ? ORDER BY created_at ASC",
		)
		.bind(group_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		ids.iter()
			.map(|id| UserId::from_str(id).map_err(DbError::from))
			.collect()
	}

	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn is_group_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, DbError> {
		let row = sqlx::query("SELECT 1 FROM group_members WHERE group_id = ? AND user_id = ?")
			.bind(group_id.to_string())
			.bind(user_id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.is_some())
	}

	// =========================================================================
	// Cascades
	// =========================================================================

	/// Remove `user_id` from `group_id` and delete every permission record the
	/// user inherited through that group, in one transaction.
	///
	/// Records from other groups or other sources are untouched. Running this
	/// twice is harmless: the second call removes nothing.
	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn remove_group_member_cascade(
		&self,
		group_id: &GroupId,
		user_id: &UserId,
	) -> Result<MemberRemoval, DbError> {
		let mut tx = self.pool.begin().await?;

		let rows = sqlx::query(&format!(
			r#"
			SELECT {RECORD_COLUMNS}
			FROM permission_records
			WHERE user_id = ? AND source_type = ? AND source_id = ?
			"#
		))
		.bind(user_id.to_string())
		.bind(SourceType::Group.as_str())
		.bind(group_id.to_string())
		.fetch_all(&mut *tx)
		.await?;
		let removed_records = rows
			.iter()
			.map(row_to_record)
			.collect::<Result<Vec<_>, _>>()?;

		sqlx::query(
			"DELETE FROM permission_records WHERE user_id = ? AND source_type = ? AND source_id = ?",
		)
		.bind(user_id.to_string())
		.bind(SourceType::Group.as_str())
		.bind(group_id.to_string())
		.execute(&mut *tx)
		.await?;

		let membership_removed = sqlx::query(
			"DELETE FROM group_members WHERE group_id = ? AND user_id = ?",
		)
		.bind(group_id.to_string())
		.bind(user_id.to_string())
		.execute(&mut *tx)
		.await?
		.rows_affected()
			> 0;

		tx.commit().await?;

		tracing::info!(
			group_id = %group_id,
			user_id = %user_id,
			membership_removed,
			removed_records = removed_records.len(),
			"group membership cascade applied"
		);
		Ok(MemberRemoval {
			membership_removed,
			removed_records,
		})
	}

	/// Delete a group, its membership rows and every permission record any
	/// former member inherited through it, in one transaction.
	///
	/// Grants from other groups on the same resources survive.
	#[tracing::instrument(skip(self), fields(group_id = %group_id))]
	pub async fn delete_group_cascade(&self, group_id: &GroupId) -> Result<GroupDeletion, DbError> {
		let mut tx = self.pool.begin().await?;

		let member_ids: Vec<String> =
			sqlx::query_scalar("SELECT user_id FROM group_members WHERE group_id = ?")
				.bind(group_id.to_string())
				.fetch_all(&mut *tx)
				.await?;
		let former_members = member_ids
			.iter()
			.map(|id| UserId::from_str(id))
			.collect::<Result<Vec<_>, _>>()?;

		sqlx::query("DELETE FROM group_members WHERE group_id = ?")
			.bind(group_id.to_string())
			.execute(&mut *tx)
			.await?;

		let mut removed_records = Vec::new();
		for member in &former_members {
			let rows = sqlx::query(&format!(
				r#"
				SELECT {RECORD_COLUMNS}
				FROM permission_records
				WHERE user_id = ? AND source_type = ? AND source_id = ?
				"#
			))
			.bind(member.to_string())
			.bind(SourceType::Group.as_str())
			.bind(group_id.to_string())
			.fetch_all(&mut *tx)
			.await?;
			for row in &rows {
				removed_records.push(row_to_record(row)?);
			}

			sqlx::query(
				"DELETE FROM permission_records WHERE user_id = ? AND source_type = ? AND source_id = ?",
			)
			.bind(member.to_string())
			.bind(SourceType::Group.as_str())
			.bind(group_id.to_string())
			.execute(&mut *tx)
			.await?;
		}

		let group_removed = sqlx::query("DELETE FROM groups WHERE id = ?")
			.bind(group_id.to_string())
			.execute(&mut *tx)
			.await?
			.rows_affected()
			> 0;

		tx.commit().await?;

		tracing::info!(
			group_id = %group_id,
			group_removed,
			former_members = former_members.len(),
			removed_records = removed_records.len(),
			"group deletion cascade applied"
		);
		Ok(GroupDeletion {
			group_removed,
			former_members,
			removed_records,
		})
	}
}

#[async_trait]
impl MembershipStore for MembershipRepository {
	async fn create_workspace(&self, id: &WorkspaceId, name: &str) -> Result<(), DbError> {
		self.create_workspace(id, name).await
	}

	async fn create_subspace(
		&self,
		id: &SubspaceId,
		workspace_id: &WorkspaceId,
		name: &str,
	) -> Result<(), DbError> {
		self.create_subspace(id, workspace_id, name).await
	}

	async fn create_document(
		&self,
		id: &DocumentId,
		workspace_id: &WorkspaceId,
		subspace_id: Option<&SubspaceId>,
		title: &str,
	) -> Result<(), DbError> {
		self.create_document(id, workspace_id, subspace_id, title).await
	}

	async fn resource_exists(
		&self,
		resource_type: ResourceType,
		resource_id: &ResourceId,
	) -> Result<bool, DbError> {
		self.resource_exists(resource_type, resource_id).await
	}

	async fn document_context(&self, id: &DocumentId) -> Result<Option<DocumentContext>, DbError> {
		self.document_context(id).await
	}

	async fn add_workspace_member(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		role: MemberRole,
	) -> Result<(), DbError> {
		self.add_workspace_member(workspace_id, user_id, role).await
	}

	async fn remove_workspace_member(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError> {
		self.remove_workspace_member(workspace_id, user_id).await
	}

	async fn workspace_role(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> Result<Option<MemberRole>, DbError> {
		self.workspace_role(workspace_id, user_id).await
	}

	async fn is_workspace_member(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError> {
		self.is_workspace_member(workspace_id, user_id).await
	}

	async fn add_subspace_member(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
		role: MemberRole,
	) -> Result<(), DbError> {
		self.add_subspace_member(subspace_id, user_id, role).await
	}

	async fn remove_subspace_member(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError> {
		self.remove_subspace_member(subspace_id, user_id).await
	}

	async fn subspace_role(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
	) -> Result<Option<MemberRole>, DbError> {
		self.subspace_role(subspace_id, user_id).await
	}

	async fn is_subspace_member(
		&self,
		subspace_id: &SubspaceId,
		user_id: &UserId,
	) -> Result<bool, DbError> {
		self.is_subspace_member(subspace_id, user_id).await
	}

	async fn create_group(&self, group: &Group) -> Result<(), DbError> {
		self.create_group(group).await
	}

	async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, DbError> {
		self.get_group(id).await
	}

	async fn group_exists(&self, id: &GroupId) -> Result<bool, DbError> {
		self.group_exists(id).await
	}

	async fn add_group_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<(), DbError> {
		self.add_group_member(group_id, user_id).await
	}

	async fn list_group_members(&self, group_id: &GroupId) -> Result<Vec<UserId>, DbError> {
		self.list_group_members(group_id).await
	}

	async fn is_group_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, DbError> {
		self.is_group_member(group_id, user_id).await
	}

	async fn remove_group_member_cascade(
		&self,
		group_id: &GroupId,
		user_id: &UserId,
	) -> Result<MemberRemoval, DbError> {
		self.remove_group_member_cascade(group_id, user_id).await
	}

	async fn delete_group_cascade(&self, group_id: &GroupId) -> Result<GroupDeletion, DbError> {
		self.delete_group_cascade(group_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::permission::PermissionRepository;
	use crate::testing::create_test_pool;
	use ward_core::{PermissionLevel, PermissionRecord};

	struct Fixture {
		pool: SqlitePool,
		repo: MembershipRepository,
		workspace: WorkspaceId,
	}

	impl Fixture {
		async fn new() -> Self {
			let pool = create_test_pool().await;
			let repo = MembershipRepository::new(pool.clone());
			let workspace = WorkspaceId::generate();
			repo.create_workspace(&workspace, "Acme").await.unwrap();
			Self {
				pool,
				repo,
				workspace,
			}
		}

		fn permissions(&self) -> PermissionRepository {
			PermissionRepository::new(self.pool.clone())
		}

		async fn document(&self, subspace: Option<&SubspaceId>) -> DocumentId {
			let doc = DocumentId::generate();
			self
				.repo
				.create_document(&doc, &self.workspace, subspace, "Roadmap")
				.await
				.unwrap();
			doc
		}
	}

	mod hierarchy {
		use super::*;

		#[tokio::test]
		async fn document_context_reports_owning_containers() {
			let f = Fixture::new().await;
			let subspace = SubspaceId::generate();
			f.repo
				.create_subspace(&subspace, &f.workspace, "Eng")
				.await
				.unwrap();
			let doc = f.document(Some(&subspace)).await;

			let ctx = f.repo.document_context(&doc).await.unwrap().unwrap();
			assert_eq!(ctx.workspace_id, f.workspace);
			assert_eq!(ctx.subspace_id, Some(subspace));
		}

		#[tokio::test]
		async fn document_context_missing_document_is_none() {
			let f = Fixture::new().await;
			let ctx = f.repo.document_context(&DocumentId::generate()).await.unwrap();
			assert!(ctx.is_none());
		}

		#[tokio::test]
		async fn document_in_foreign_subspace_is_rejected() {
			let f = Fixture::new().await;
			let other_ws = WorkspaceId::generate();
			f.repo.create_workspace(&other_ws, "Other").await.unwrap();
			let subspace = SubspaceId::generate();
			f.repo
				.create_subspace(&subspace, &other_ws, "Elsewhere")
				.await
				.unwrap();

			let result = f
				.repo
				.create_document(&DocumentId::generate(), &f.workspace, Some(&subspace), "x")
				.await;
			assert!(matches!(result, Err(DbError::Conflict(_))));
		}

		#[tokio::test]
		async fn resource_exists_checks_the_right_table() {
			let f = Fixture::new().await;
			let doc = f.document(None).await;

			assert!(f
				.repo
				.resource_exists(ResourceType::Document, &doc.into())
				.await
				.unwrap());
			assert!(!f
				.repo
				.resource_exists(ResourceType::Subspace, &doc.into())
				.await
				.unwrap());
			assert!(f
				.repo
				.resource_exists(ResourceType::Workspace, &f.workspace.into())
				.await
				.unwrap());
		}
	}

	mod memberships {
		use super::*;

		#[tokio::test]
		async fn workspace_role_upserts() {
			let f = Fixture::new().await;
			let user = UserId::generate();

			assert_eq!(f.repo.workspace_role(&f.workspace, &user).await.unwrap(), None);
			f.repo
				.add_workspace_member(&f.workspace, &user, MemberRole::Member)
				.await
				.unwrap();
			f.repo
				.add_workspace_member(&f.workspace, &user, MemberRole::Admin)
				.await
				.unwrap();
			assert_eq!(
				f.repo.workspace_role(&f.workspace, &user).await.unwrap(),
				Some(MemberRole::Admin)
			);

			assert!(f.repo.remove_workspace_member(&f.workspace, &user).await.unwrap());
			assert!(!f.repo.is_workspace_member(&f.workspace, &user).await.unwrap());
		}

		#[tokio::test]
		async fn subspace_role_round_trips() {
			let f = Fixture::new().await;
			let subspace = SubspaceId::generate();
			f.repo
				.create_subspace(&subspace, &f.workspace, "Eng")
				.await
				.unwrap();
			let user = UserId::generate();

			f.repo
				.add_subspace_member(&subspace, &user, MemberRole::Member)
				.await
				.unwrap();
			assert_eq!(
				f.repo.subspace_role(&subspace, &user).await.unwrap(),
				Some(MemberRole::Member)
			);
			assert!(f.repo.is_subspace_member(&subspace, &user).await.unwrap());
		}
	}

	mod cascades {
		use super::*;

		#[tokio::test]
		async fn member_removal_deletes_only_that_groups_records() {
			let f = Fixture::new().await;
			let perms = f.permissions();
			let group = Group::new(f.workspace, "Design");
			let other = Group::new(f.workspace, "Ops");
			f.repo.create_group(&group).await.unwrap();
			f.repo.create_group(&other).await.unwrap();

			let user = UserId::generate();
			f.repo.add_group_member(&group.id, &user).await.unwrap();
			f.repo.add_group_member(&other.id, &user).await.unwrap();

			let doc: ResourceId = f.document(None).await.into();
			let via_group = PermissionRecord::via_group(
				user,
				group.id,
				ResourceType::Document,
				doc,
				PermissionLevel::Edit,
			);
			let via_other = PermissionRecord::via_group(
				user,
				other.id,
				ResourceType::Document,
				doc,
				PermissionLevel::Read,
			);
			let direct =
				PermissionRecord::direct(user, ResourceType::Document, doc, PermissionLevel::Comment);
			for r in [&via_group, &via_other, &direct] {
				perms.insert(r).await.unwrap();
			}

			let removal = f
				.repo
				.remove_group_member_cascade(&group.id, &user)
				.await
				.unwrap();
			assert!(removal.membership_removed);
			assert_eq!(removal.removed_records.len(), 1);
			assert_eq!(removal.removed_records[0].id, via_group.id);

			assert!(perms.get(&via_other.id).await.unwrap().is_some());
			assert!(perms.get(&direct.id).await.unwrap().is_some());
			assert!(!f.repo.is_group_member(&group.id, &user).await.unwrap());
			assert!(f.repo.is_group_member(&other.id, &user).await.unwrap());

			let again = f
				.repo
				.remove_group_member_cascade(&group.id, &user)
				.await
				.unwrap();
			assert_eq!(again, MemberRemoval::default());
		}

		#[tokio::test]
		async fn group_deletion_removes_members_and_their_group_records() {
			let f = Fixture::new().await;
			let perms = f.permissions();
			let doomed = Group::new(f.workspace, "Contractors");
			let survivor = Group::new(f.workspace, "Staff");
			f.repo.create_group(&doomed).await.unwrap();
			f.repo.create_group(&survivor).await.unwrap();

			let alice = UserId::generate();
			let bob = UserId::generate();
			for user in [alice, bob] {
				f.repo.add_group_member(&doomed.id, &user).await.unwrap();
			}
			f.repo.add_group_member(&survivor.id, &alice).await.unwrap();

			let doc_a: ResourceId = f.document(None).await.into();
			let doc_b: ResourceId = f.document(None).await.into();
			for user in [alice, bob] {
				for doc in [doc_a, doc_b] {
					perms
						.insert(&PermissionRecord::via_group(
							user,
							doomed.id,
							ResourceType::Document,
							doc,
							PermissionLevel::Edit,
						))
						.await
						.unwrap();
				}
			}
			let kept = PermissionRecord::via_group(
				alice,
				survivor.id,
				ResourceType::Document,
				doc_a,
				PermissionLevel::Read,
			);
			perms.insert(&kept).await.unwrap();

			let deletion = f.repo.delete_group_cascade(&doomed.id).await.unwrap();
			assert!(deletion.group_removed);
			assert_eq!(deletion.former_members.len(), 2);
			assert_eq!(deletion.removed_records.len(), 4);

			assert!(!f.repo.group_exists(&doomed.id).await.unwrap());
			assert!(f.repo.group_exists(&survivor.id).await.unwrap());
			assert!(f.repo.list_group_members(&doomed.id).await.unwrap().is_empty());
			assert!(perms
				.list_by_group_source(&doomed.id, None)
				.await
				.unwrap()
				.is_empty());
			assert_eq!(perms.get(&kept.id).await.unwrap(), Some(kept));
		}
	}
}
