// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ward_core::{
	DocumentId, GroupId, ParseError, PermissionRecord, SourceType, SubspaceId, UserId, WorkspaceId,
};

/// Role held through workspace or subspace membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
	Admin,
	Member,
}

impl MemberRole {
	/// Source type a subspace membership with this role grants through.
	pub fn subspace_source(&self) -> SourceType {
		match self {
			MemberRole::Admin => SourceType::SubspaceAdmin,
			MemberRole::Member => SourceType::SubspaceMember,
		}
	}

	/// Source type a workspace membership with this role grants through.
	pub fn workspace_source(&self) -> SourceType {
		match self {
			MemberRole::Admin => SourceType::WorkspaceAdmin,
			MemberRole::Member => SourceType::WorkspaceMember,
		}
	}
}

impl fmt::Display for MemberRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MemberRole::Admin => write!(f, "admin"),
			MemberRole::Member => write!(f, "member"),
		}
	}
}

impl FromStr for MemberRole {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"admin" => Ok(MemberRole::Admin),
			"member" => Ok(MemberRole::Member),
			_ => Err(ParseError::new("member role", s)),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
	pub id: GroupId,
	pub workspace_id: WorkspaceId,
	pub name: String,
	pub created_at: DateTime<Utc>,
}

impl Group {
	pub fn new(workspace_id: WorkspaceId, name: impl Into<String>) -> Self {
		Self {
			id: GroupId::generate(),
			workspace_id,
			name: name.into(),
			created_at: Utc::now(),
		}
	}
}

/// Where a document sits in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContext {
	pub document_id: DocumentId,
	pub workspace_id: WorkspaceId,
	pub subspace_id: Option<SubspaceId>,
}

/// What a single membership removal deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberRemoval {
	pub membership_removed: bool,
	pub removed_records: Vec<PermissionRecord>,
}

/// What a group deletion deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDeletion {
	pub group_removed: bool,
	pub former_members: Vec<UserId>,
	pub removed_records: Vec<PermissionRecord>,
}
