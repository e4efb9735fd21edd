// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolve, validate, then apply the fixes that cannot change access.
//!
//! Only priority corrections are applied. Duplicate and membership issues are
//! left for an operator and returned as `remaining_issues`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ward_core::{DocumentId, PermissionLevel, ResolutionKey, ResourceType, UserId};
use ward_server_db::PermissionStore;

use crate::error::Result;
use crate::resolver::Resolver;
use crate::validator::{ConsistencyIssue, ConsistencyValidator, SuggestedFix};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoFixReport {
	pub user_id: UserId,
	pub document_id: DocumentId,
	pub resolved: PermissionLevel,
	pub applied_fixes: Vec<SuggestedFix>,
	pub remaining_issues: Vec<ConsistencyIssue>,
}

#[derive(Clone)]
pub struct AutoFixer {
	resolver: Resolver,
	validator: ConsistencyValidator,
	permissions: Arc<dyn PermissionStore>,
}

impl AutoFixer {
	pub fn new(
		resolver: Resolver,
		validator: ConsistencyValidator,
		permissions: Arc<dyn PermissionStore>,
	) -> Self {
		Self {
			resolver,
			validator,
			permissions,
		}
	}

	/// The key stays locked from resolution until the last fix is written.
	/// A missing document fails before anything is resolved or written.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, document_id = %document_id))]
	pub async fn auto_fix(&self, user_id: &UserId, document_id: &DocumentId) -> Result<AutoFixReport> {
		self.validator.document(document_id).await?;

		let key = ResolutionKey::new(*user_id, ResourceType::Document, (*document_id).into());
		let _guard = self.resolver.locks().lock(key).await?;

		let resolved = self.resolver.resolve_locked(&key).await?;
		let report = self.validator.validate(user_id, document_id).await?;

		let mut applied_fixes = Vec::new();
		for fix in report.suggested_fixes {
			let SuggestedFix::UpdatePriority {
				record_id,
				expected,
			} = fix
			else {
				continue;
			};

			let updated = self
				.permissions
				.update_priority(&record_id, expected)
				.await
				.map_err(|e| {
					tracing::error!(record_id = %record_id, error = %e, "failed to correct priority");
					e
				})?;
			if updated {
				applied_fixes.push(fix);
			}
		}

		let remaining_issues: Vec<ConsistencyIssue> = report
			.issues
			.into_iter()
			.filter(|issue| !issue.is_safe_to_fix())
			.collect();

		tracing::info!(
			user_id = %user_id,
			document_id = %document_id,
			resolved = %resolved,
			applied = applied_fixes.len(),
			remaining = remaining_issues.len(),
			"auto-fix finished"
		);

		Ok(AutoFixReport {
			user_id: *user_id,
			document_id: *document_id,
			resolved,
			applied_fixes,
			remaining_issues,
		})
	}
}
