// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deterministic collapse of many grants into one effective permission.
//!
//! [`resolve_records`] is pure: it computes the effective permission and the
//! [`CleanupPlan`] that would leave exactly one record behind. Applying the
//! plan is the store's job.

use serde::{Deserialize, Serialize};

use crate::conflict::detect;
use crate::policy::max_permission;
use crate::record::PermissionRecord;
use crate::types::{PermissionLevel, RecordId};

/// Outcome of resolving one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
	pub permission: PermissionLevel,
	pub plan: CleanupPlan,
}

/// Mutation needed to leave a single record agreeing with the resolved value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CleanupPlan {
	/// The stored records already agree; nothing to write.
	Keep,
	/// Keep one record, optionally rewriting its permission, and delete the rest.
	Collapse {
		keep: RecordId,
		rewrite: Option<PermissionLevel>,
		remove: Vec<RecordId>,
	},
}

impl CleanupPlan {
	pub fn is_mutation(&self) -> bool {
		matches!(self, CleanupPlan::Collapse { .. })
	}
}

/// Sorts by `priority` ascending, then `updated_at` descending so the most
/// recently touched record wins a tie.
pub fn sort_for_resolution(records: &mut [PermissionRecord]) {
	records.sort_by(|a, b| {
		a.priority
			.cmp(&b.priority)
			.then_with(|| b.updated_at.cmp(&a.updated_at))
	});
}

/// Resolves the records one user holds on one resource.
///
/// - No records resolve to `none`.
/// - One record, or several without conflicts, resolve to the top record.
/// - Otherwise the group with the lowest priority number wins, and within
///   it the highest-ranked permission.
///
/// The input does not need to be sorted.
pub fn resolve_records(records: &[PermissionRecord]) -> Resolution {
	let mut ordered: Vec<PermissionRecord> = records.to_vec();
	sort_for_resolution(&mut ordered);

	let Some(top) = ordered.first() else {
		return Resolution {
			permission: PermissionLevel::None,
			plan: CleanupPlan::Keep,
		};
	};

	if ordered.len() == 1 || detect(&ordered).is_empty() {
		return Resolution {
			permission: top.permission,
			plan: CleanupPlan::Keep,
		};
	}

	let winning_priority = top.priority;
	let resolved = max_permission(
		ordered
			.iter()
			.take_while(|r| r.priority == winning_priority)
			.map(|r| r.permission),
	)
	.unwrap_or(top.permission);

	let plan = match ordered.iter().find(|r| r.permission == resolved) {
		Some(keep) => CleanupPlan::Collapse {
			keep: keep.id,
			rewrite: None,
			remove: ordered
				.iter()
				.filter(|r| r.id != keep.id)
				.map(|r| r.id)
				.collect(),
		},
		None => CleanupPlan::Collapse {
			keep: top.id,
			rewrite: Some(resolved),
			remove: ordered.iter().skip(1).map(|r| r.id).collect(),
		},
	};

	Resolution {
		permission: resolved,
		plan,
	}
}
