// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission records and the key they are resolved under.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::types::{
	GroupId, PermissionLevel, RecordId, ResourceId, ResourceType, SourceType, UserId,
};

/// One grant, from one source, for one principal, on one resource.
///
/// A user may hold several records for the same resource. The effective
/// permission is never read from an arbitrary row; it is always computed by
/// [`crate::resolution::resolve_records`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
	pub id: RecordId,

	/// `None` for guest-scoped records.
	pub user_id: Option<UserId>,

	pub resource_type: ResourceType,
	pub resource_id: ResourceId,
	pub permission: PermissionLevel,
	pub source_type: SourceType,

	/// The group id when `source_type` is [`SourceType::Group`].
	pub source_id: Option<Uuid>,

	/// Derived from `source_type`. See [`PermissionRecord::has_canonical_priority`].
	pub priority: i64,

	pub created_by_id: Option<UserId>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl PermissionRecord {
	/// Creates a record with a fresh id and the canonical priority for `source_type`.
	pub fn new(
		user_id: Option<UserId>,
		resource_type: ResourceType,
		resource_id: ResourceId,
		permission: PermissionLevel,
		source_type: SourceType,
		source_id: Option<Uuid>,
	) -> Self {
		let now = Utc::now().trunc_subsecs(6);
		Self {
			id: RecordId::generate(),
			user_id,
			resource_type,
			resource_id,
			permission,
			source_type,
			source_id,
			priority: source_type.priority(),
			created_by_id: None,
			created_at: now,
			updated_at: now,
		}
	}

	/// Direct grant to a user.
	pub fn direct(
		user_id: UserId,
		resource_type: ResourceType,
		resource_id: ResourceId,
		permission: PermissionLevel,
	) -> Self {
		Self::new(
			Some(user_id),
			resource_type,
			resource_id,
			permission,
			SourceType::Direct,
			None,
		)
	}

	/// Grant inherited from membership in `group_id`.
	pub fn via_group(
		user_id: UserId,
		group_id: GroupId,
		resource_type: ResourceType,
		resource_id: ResourceId,
		permission: PermissionLevel,
	) -> Self {
		Self::new(
			Some(user_id),
			resource_type,
			resource_id,
			permission,
			SourceType::Group,
			Some(group_id.into_inner()),
		)
	}

	pub fn with_created_by(mut self, user_id: UserId) -> Self {
		self.created_by_id = Some(user_id);
		self
	}

	/// Timestamps keep microsecond precision, the precision they are stored at.
	pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
		self.updated_at = updated_at.trunc_subsecs(6);
		self
	}

	pub fn with_priority(mut self, priority: i64) -> Self {
		self.priority = priority;
		self
	}

	/// True when `priority` matches the source table entry for `source_type`.
	pub fn has_canonical_priority(&self) -> bool {
		self.priority == self.source_type.priority()
	}

	/// The group this record was inherited from, if any.
	pub fn group_id(&self) -> Option<GroupId> {
		match self.source_type {
			SourceType::Group => self.source_id.map(GroupId::new),
			_ => None,
		}
	}

	/// Resolution key, or `None` for guest-scoped records without a user.
	pub fn key(&self) -> Option<ResolutionKey> {
		self.user_id
			.map(|user_id| ResolutionKey::new(user_id, self.resource_type, self.resource_id))
	}
}

/// The (user, resource type, resource id) triple that records are resolved
/// and serialized under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResolutionKey {
	pub user_id: UserId,
	pub resource_type: ResourceType,
	pub resource_id: ResourceId,
}

impl ResolutionKey {
	pub fn new(user_id: UserId, resource_type: ResourceType, resource_id: ResourceId) -> Self {
		Self {
			user_id,
			resource_type,
			resource_id,
		}
	}
}

impl fmt::Display for ResolutionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}:{}:{}",
			self.user_id, self.resource_type, self.resource_id
		)
	}
}
