// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cross-checks stored records against membership facts.
//!
//! Validation is read-only. Each check runs independently and contributes
//! issues to one [`ConsistencyReport`]; fixes are only suggested. The checks:
//!
//! 1. Two records from the same source (`source_type`, `source_id`) on the
//!    document are duplicates.
//! 2. A record's `priority` must equal its source type's table value.
//! 3. Subspace membership and SUBSPACE_* records must agree.
//! 4. Workspace membership and WORKSPACE_* records must agree.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use ward_core::{
	DocumentId, PermissionRecord, RecordId, ResolutionKey, ResourceType, SourceType, SubspaceId,
	UserId, WorkspaceId,
};
use ward_server_db::{DocumentContext, MembershipStore, PermissionStore};

use crate::error::{PermissionError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyIssue {
	Duplicate {
		source_type: SourceType,
		source_id: Option<Uuid>,
		record_ids: Vec<RecordId>,
	},
	PriorityMismatch {
		record_id: RecordId,
		source_type: SourceType,
		actual: i64,
		expected: i64,
	},
	MissingSubspaceGrant {
		subspace_id: SubspaceId,
	},
	OrphanedSubspaceGrant {
		subspace_id: Option<SubspaceId>,
		record_ids: Vec<RecordId>,
	},
	MissingWorkspaceGrant {
		workspace_id: WorkspaceId,
	},
	OrphanedWorkspaceGrant {
		workspace_id: WorkspaceId,
		record_ids: Vec<RecordId>,
	},
}

impl ConsistencyIssue {
	/// Issues a priority rewrite repairs without changing who can access what.
	pub fn is_safe_to_fix(&self) -> bool {
		matches!(self, ConsistencyIssue::PriorityMismatch { .. })
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SuggestedFix {
	RemoveRecord { record_id: RecordId },
	UpdatePriority { record_id: RecordId, expected: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
	pub user_id: UserId,
	pub document_id: DocumentId,
	pub is_consistent: bool,
	pub issues: Vec<ConsistencyIssue>,
	pub suggested_fixes: Vec<SuggestedFix>,
}

#[derive(Clone)]
pub struct ConsistencyValidator {
	permissions: Arc<dyn PermissionStore>,
	memberships: Arc<dyn MembershipStore>,
}

impl ConsistencyValidator {
	pub fn new(permissions: Arc<dyn PermissionStore>, memberships: Arc<dyn MembershipStore>) -> Self {
		Self {
			permissions,
			memberships,
		}
	}

	/// Where `document_id` lives, or `NotFound`.
	pub async fn document(&self, document_id: &DocumentId) -> Result<DocumentContext> {
		self.memberships
			.document_context(document_id)
			.await?
			.ok_or(PermissionError::NotFound {
				resource_type: ResourceType::Document,
				resource_id: (*document_id).into(),
			})
	}

	/// Check `user_id`'s records on `document_id`.
	///
	/// # Errors
	/// `PermissionError::NotFound` if the document does not exist. An
	/// inconsistent record set is reported, never returned as an error.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, document_id = %document_id))]
	pub async fn validate(
		&self,
		user_id: &UserId,
		document_id: &DocumentId,
	) -> Result<ConsistencyReport> {
		let context = self.document(document_id).await?;

		let key = ResolutionKey::new(*user_id, ResourceType::Document, (*document_id).into());
		let records = self.permissions.list_for_key(&key).await?;

		let mut issues = Vec::new();
		let mut suggested_fixes = Vec::new();

		check_duplicates(&records, &mut issues, &mut suggested_fixes);
		check_priorities(&records, &mut issues, &mut suggested_fixes);

		let subspace_records = record_ids(&records, SourceType::is_subspace_role);
		match context.subspace_id {
			Some(subspace_id) => {
				let is_member = self
					.memberships
					.is_subspace_member(&subspace_id, user_id)
					.await?;
				if is_member && subspace_records.is_empty() {
					issues.push(ConsistencyIssue::MissingSubspaceGrant { subspace_id });
				} else if !is_member && !subspace_records.is_empty() {
					issues.push(ConsistencyIssue::OrphanedSubspaceGrant {
						subspace_id: Some(subspace_id),
						record_ids: subspace_records,
					});
				}
			}
			None if !subspace_records.is_empty() => {
				issues.push(ConsistencyIssue::OrphanedSubspaceGrant {
					subspace_id: None,
					record_ids: subspace_records,
				});
			}
			None => {}
		}

		let workspace_records = record_ids(&records, SourceType::is_workspace_role);
		let is_workspace_member = self
			.memberships
			.is_workspace_member(&context.workspace_id, user_id)
			.await?;
		if is_workspace_member && workspace_records.is_empty() {
			issues.push(ConsistencyIssue::MissingWorkspaceGrant {
				workspace_id: context.workspace_id,
			});
		} else if !is_workspace_member && !workspace_records.is_empty() {
			issues.push(ConsistencyIssue::OrphanedWorkspaceGrant {
				workspace_id: context.workspace_id,
				record_ids: workspace_records,
			});
		}

		let is_consistent = issues.is_empty();
		if !is_consistent {
			tracing::info!(
				user_id = %user_id,
				document_id = %document_id,
				issues = issues.len(),
				"permission records inconsistent"
			);
		}

		Ok(ConsistencyReport {
			user_id: *user_id,
			document_id: *document_id,
			is_consistent,
			issues,
			suggested_fixes,
		})
	}
}

/// `records` arrive in resolution order, so the first of each duplicate set
/// is the one resolution would keep. Sets are reported in first-seen order.
fn check_duplicates(
	records: &[PermissionRecord],
	issues: &mut Vec<ConsistencyIssue>,
	fixes: &mut Vec<SuggestedFix>,
) {
	let mut by_source: Vec<((SourceType, Option<Uuid>), Vec<RecordId>)> = Vec::new();
	for record in records {
		let source = (record.source_type, record.source_id);
		match by_source.iter_mut().find(|(s, _)| *s == source) {
			Some((_, ids)) => ids.push(record.id),
			None => by_source.push((source, vec![record.id])),
		}
	}

	for ((source_type, source_id), ids) in by_source {
		if ids.len() < 2 {
			continue;
		}
		fixes.extend(
			ids.iter()
				.skip(1)
				.map(|id| SuggestedFix::RemoveRecord { record_id: *id }),
		);
		issues.push(ConsistencyIssue::Duplicate {
			source_type,
			source_id,
			record_ids: ids,
		});
	}
}

fn check_priorities(
	records: &[PermissionRecord],
	issues: &mut Vec<ConsistencyIssue>,
	fixes: &mut Vec<SuggestedFix>,
) {
	for record in records.iter().filter(|r| !r.has_canonical_priority()) {
		let expected = record.source_type.priority();
		issues.push(ConsistencyIssue::PriorityMismatch {
			record_id: record.id,
			source_type: record.source_type,
			actual: record.priority,
			expected,
		});
		fixes.push(SuggestedFix::UpdatePriority {
			record_id: record.id,
			expected,
		});
	}
}

fn record_ids(records: &[PermissionRecord], source: fn(&SourceType) -> bool) -> Vec<RecordId> {
	records
		.iter()
		.filter(|r| source(&r.source_type))
		.map(|r| r.id)
		.collect()
}
