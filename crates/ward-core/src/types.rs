// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier newtypes and the enums every other module is built on.
//!
//! - **ID newtypes**: type-safe wrappers around UUIDs ([`UserId`], [`GroupId`],
//!   [`ResourceId`], ...) so a group id can never be passed where a user id is
//!   expected
//! - **[`ResourceType`]**: the three levels of the workspace → subspace →
//!   document hierarchy
//! - **[`PermissionLevel`]**: `none` through `owner`
//! - **[`SourceType`]**: where a grant came from
//!
//! The enums intentionally do not derive `Ord`. Ranking and precedence are
//! looked up in [`crate::policy`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ParseError;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(
			Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
		)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(GroupId, "Unique identifier for a group.");
define_id_type!(RecordId, "Unique identifier for a permission record.");
define_id_type!(WorkspaceId, "Unique identifier for a workspace.");
define_id_type!(SubspaceId, "Unique identifier for a subspace.");
define_id_type!(DocumentId, "Unique identifier for a document.");
define_id_type!(
	SessionId,
	"One client connection; each carries its own notification sequence."
);
define_id_type!(
	ResourceId,
	"Identifier of any resource in the hierarchy, paired with a [`ResourceType`]."
);

impl From<WorkspaceId> for ResourceId {
	fn from(id: WorkspaceId) -> Self {
		Self(id.0)
	}
}

impl From<SubspaceId> for ResourceId {
	fn from(id: SubspaceId) -> Self {
		Self(id.0)
	}
}

impl From<DocumentId> for ResourceId {
	fn from(id: DocumentId) -> Self {
		Self(id.0)
	}
}

// =============================================================================
// Resource Types
// =============================================================================

/// Level of the resource hierarchy a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
	Workspace,
	Subspace,
	Document,
}

impl ResourceType {
	pub fn all() -> &'static [ResourceType] {
		&[
			ResourceType::Workspace,
			ResourceType::Subspace,
			ResourceType::Document,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ResourceType::Workspace => "workspace",
			ResourceType::Subspace => "subspace",
			ResourceType::Document => "document",
		}
	}
}

impl fmt::Display for ResourceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ResourceType {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"workspace" => Ok(ResourceType::Workspace),
			"subspace" => Ok(ResourceType::Subspace),
			"document" => Ok(ResourceType::Document),
			_ => Err(ParseError::new("resource type", s)),
		}
	}
}

// =============================================================================
// Permission Levels
// =============================================================================

/// Access level carried by a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
	None,
	Read,
	Comment,
	Edit,
	Manage,
	Owner,
}

impl PermissionLevel {
	pub fn all() -> &'static [PermissionLevel] {
		&[
			PermissionLevel::None,
			PermissionLevel::Read,
			PermissionLevel::Comment,
			PermissionLevel::Edit,
			PermissionLevel::Manage,
			PermissionLevel::Owner,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			PermissionLevel::None => "none",
			PermissionLevel::Read => "read",
			PermissionLevel::Comment => "comment",
			PermissionLevel::Edit => "edit",
			PermissionLevel::Manage => "manage",
			PermissionLevel::Owner => "owner",
		}
	}

	/// Rank from the permission table. Higher grants more.
	pub fn rank(&self) -> u8 {
		crate::policy::permission_rank(*self)
	}

	/// Returns true if this level grants at least what `other` grants.
	pub fn includes(&self, other: PermissionLevel) -> bool {
		self.rank() >= other.rank()
	}
}

impl fmt::Display for PermissionLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PermissionLevel {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"none" => Ok(PermissionLevel::None),
			"read" => Ok(PermissionLevel::Read),
			"comment" => Ok(PermissionLevel::Comment),
			"edit" => Ok(PermissionLevel::Edit),
			"manage" => Ok(PermissionLevel::Manage),
			"owner" => Ok(PermissionLevel::Owner),
			_ => Err(ParseError::new("permission level", s)),
		}
	}
}

// =============================================================================
// Source Types
// =============================================================================

/// Where a grant originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
	/// Shared with the user directly.
	Direct,
	/// Inherited from a group the user belongs to. `source_id` is the group.
	Group,
	SubspaceAdmin,
	SubspaceMember,
	WorkspaceAdmin,
	WorkspaceMember,
	/// Guest invite.
	Guest,
}

impl SourceType {
	pub fn all() -> &'static [SourceType] {
		&[
			SourceType::Direct,
			SourceType::Group,
			SourceType::SubspaceAdmin,
			SourceType::SubspaceMember,
			SourceType::WorkspaceAdmin,
			SourceType::WorkspaceMember,
			SourceType::Guest,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			SourceType::Direct => "direct",
			SourceType::Group => "group",
			SourceType::SubspaceAdmin => "subspace_admin",
			SourceType::SubspaceMember => "subspace_member",
			SourceType::WorkspaceAdmin => "workspace_admin",
			SourceType::WorkspaceMember => "workspace_member",
			SourceType::Guest => "guest",
		}
	}

	/// Canonical priority from the source table. Lower wins.
	pub fn priority(&self) -> i64 {
		crate::policy::source_priority(*self)
	}

	pub fn is_subspace_role(&self) -> bool {
		matches!(self, SourceType::SubspaceAdmin | SourceType::SubspaceMember)
	}

	pub fn is_workspace_role(&self) -> bool {
		matches!(
			self,
			SourceType::WorkspaceAdmin | SourceType::WorkspaceMember
		)
	}
}

impl fmt::Display for SourceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SourceType {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"direct" => Ok(SourceType::Direct),
			"group" => Ok(SourceType::Group),
			"subspace_admin" => Ok(SourceType::SubspaceAdmin),
			"subspace_member" => Ok(SourceType::SubspaceMember),
			"workspace_admin" => Ok(SourceType::WorkspaceAdmin),
			"workspace_member" => Ok(SourceType::WorkspaceMember),
			"guest" => Ok(SourceType::Guest),
			_ => Err(ParseError::new("source type", s)),
		}
	}
}
