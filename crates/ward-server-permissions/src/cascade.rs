// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Invalidation of group-sourced records when their group backing goes away.
//!
//! Both triggers lock every key the group's records live under, run the
//! database cascade in a single transaction, and then tell each affected user
//! what they can still do on every document that lost a record.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use ward_core::{
	AffectedDocument, ChangeType, DocumentId, GroupId, PermissionRecord, RecordId, ResolutionKey,
	ResourceType, UserId,
};
use ward_server_db::{MembershipStore, PermissionStore};

use crate::error::Result;
use crate::notifier::ChangeNotifier;
use crate::resolver::Resolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRemovalReport {
	pub group_id: GroupId,
	pub user_id: UserId,
	pub membership_removed: bool,
	pub removed_records: Vec<RecordId>,
	pub notifications: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDeletionReport {
	pub group_id: GroupId,
	pub group_removed: bool,
	pub former_members: Vec<UserId>,
	pub removed_records: Vec<RecordId>,
	pub notifications: usize,
}

#[derive(Clone)]
pub struct CascadeInvalidator {
	permissions: Arc<dyn PermissionStore>,
	memberships: Arc<dyn MembershipStore>,
	resolver: Resolver,
	notifier: Arc<ChangeNotifier>,
}

impl CascadeInvalidator {
	pub fn new(
		permissions: Arc<dyn PermissionStore>,
		memberships: Arc<dyn MembershipStore>,
		resolver: Resolver,
		notifier: Arc<ChangeNotifier>,
	) -> Self {
		Self {
			permissions,
			memberships,
			resolver,
			notifier,
		}
	}

	/// `user_id` left `group_id`: drop every record they held through it.
	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn remove_member(
		&self,
		group_id: &GroupId,
		user_id: &UserId,
	) -> Result<MemberRemovalReport> {
		let backed = self
			.permissions
			.list_by_group_source(group_id, Some(user_id))
			.await?;
		let guards = self
			.resolver
			.locks()
			.lock_many(backed.iter().filter_map(PermissionRecord::key))
			.await?;

		let removal = self
			.memberships
			.remove_group_member_cascade(group_id, user_id)
			.await
			.map_err(|e| {
				tracing::error!(group_id = %group_id, user_id = %user_id, error = %e, "membership cascade failed");
				e
			})?;

		let changes = self.post_cascade_permissions(&removal.removed_records).await?;
		drop(guards);

		let notifications = self.publish(changes).await;
		Ok(MemberRemovalReport {
			group_id: *group_id,
			user_id: *user_id,
			membership_removed: removal.membership_removed,
			removed_records: removal.removed_records.iter().map(|r| r.id).collect(),
			notifications,
		})
	}

	/// `group_id` was deleted: drop its memberships and every record any
	/// member held through it, on every resource it was granted.
	#[tracing::instrument(skip(self), fields(group_id = %group_id))]
	pub async fn delete_group(&self, group_id: &GroupId) -> Result<GroupDeletionReport> {
		let backed = self.permissions.list_by_group_source(group_id, None).await?;
		let guards = self
			.resolver
			.locks()
			.lock_many(backed.iter().filter_map(PermissionRecord::key))
			.await?;

		let deletion = self
			.memberships
			.delete_group_cascade(group_id)
			.await
			.map_err(|e| {
				tracing::error!(group_id = %group_id, error = %e, "group deletion cascade failed");
				e
			})?;

		let changes = self.post_cascade_permissions(&deletion.removed_records).await?;
		drop(guards);

		let notifications = self.publish(changes).await;
		Ok(GroupDeletionReport {
			group_id: *group_id,
			group_removed: deletion.group_removed,
			former_members: deletion.former_members,
			removed_records: deletion.removed_records.iter().map(|r| r.id).collect(),
			notifications,
		})
	}

	/// Effective permission, after the cascade, on each document that lost a
	/// record, grouped by user.
	async fn post_cascade_permissions(
		&self,
		removed: &[PermissionRecord],
	) -> Result<BTreeMap<UserId, Vec<AffectedDocument>>> {
		let documents: BTreeSet<ResolutionKey> = removed
			.iter()
			.filter(|r| r.resource_type == ResourceType::Document)
			.filter_map(PermissionRecord::key)
			.collect();

		let mut changes: BTreeMap<UserId, Vec<AffectedDocument>> = BTreeMap::new();
		for key in documents {
			let new_permission = self.resolver.effective(&key).await?;
			changes.entry(key.user_id).or_default().push(AffectedDocument {
				doc_id: DocumentId::new(key.resource_id.into_inner()),
				new_permission,
			});
		}
		Ok(changes)
	}

	/// The cascade is committed by now, so delivery failures are logged
	/// rather than returned.
	async fn publish(&self, changes: BTreeMap<UserId, Vec<AffectedDocument>>) -> usize {
		let mut published = 0;
		for (user_id, documents) in changes {
			match self
				.notifier
				.notify(&user_id, ChangeType::Removed, documents)
				.await
			{
				Ok(deliveries) => {
					published += deliveries
						.iter()
						.map(|d| d.notifications.len())
						.sum::<usize>();
				}
				Err(e) => {
					tracing::warn!(user_id = %user_id, error = %e, "failed to publish removal notification");
				}
			}
		}
		published
	}
}
