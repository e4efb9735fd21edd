// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Conflict detection over the records one user holds on one resource.
//!
//! Detection is read-only. Two kinds of contradiction are reported:
//!
//! 1. **Priority conflict**: two or more records share a `priority` but
//!    disagree on `permission`. The recommendation is the highest-ranked
//!    permission inside that priority group.
//! 2. **Source conflict**: the direct grants and the group grants each agree
//!    on a single value, but those two values differ. The recommendation is
//!    the higher-ranked of the two. Only the direct/group pair is compared.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::policy::max_permission;
use crate::record::PermissionRecord;
use crate::types::{PermissionLevel, RecordId, SourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictKind {
	Priority { priority: i64 },
	Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
	pub kind: ConflictKind,
	pub record_ids: Vec<RecordId>,
	pub permissions: Vec<PermissionLevel>,
	pub recommended: PermissionLevel,
}

/// Finds every contradiction among `records`.
///
/// Fewer than two records never conflict. Output order is deterministic:
/// priority conflicts by ascending priority, then the source conflict.
pub fn detect(records: &[PermissionRecord]) -> Vec<Conflict> {
	if records.len() < 2 {
		return Vec::new();
	}

	let mut conflicts = priority_conflicts(records);
	conflicts.extend(source_conflict(records));

	if !conflicts.is_empty() {
		tracing::trace!(count = conflicts.len(), "permission conflicts detected");
	}
	conflicts
}

fn priority_conflicts(records: &[PermissionRecord]) -> Vec<Conflict> {
	let mut by_priority: BTreeMap<i64, Vec<&PermissionRecord>> = BTreeMap::new();
	for record in records {
		by_priority.entry(record.priority).or_default().push(record);
	}

	by_priority
		.into_iter()
		.filter(|(_, group)| group.len() >= 2)
		.filter_map(|(priority, group)| {
			let permissions = distinct(group.iter().map(|r| r.permission));
			if permissions.len() < 2 {
				return None;
			}
			let recommended = max_permission(permissions.iter().copied())?;
			Some(Conflict {
				kind: ConflictKind::Priority { priority },
				record_ids: group.iter().map(|r| r.id).collect(),
				permissions,
				recommended,
			})
		})
		.collect()
}

fn source_conflict(records: &[PermissionRecord]) -> Option<Conflict> {
	let direct: Vec<&PermissionRecord> = records
		.iter()
		.filter(|r| r.source_type == SourceType::Direct)
		.collect();
	let group: Vec<&PermissionRecord> = records
		.iter()
		.filter(|r| r.source_type == SourceType::Group)
		.collect();

	let direct_values = distinct(direct.iter().map(|r| r.permission));
	let group_values = distinct(group.iter().map(|r| r.permission));

	let ([direct_value], [group_value]) = (direct_values.as_slice(), group_values.as_slice())
	else {
		return None;
	};
	if direct_value == group_value {
		return None;
	}

	let recommended = max_permission([*direct_value, *group_value])?;
	Some(Conflict {
		kind: ConflictKind::Source,
		record_ids: direct.iter().chain(group.iter()).map(|r| r.id).collect(),
		permissions: vec![*direct_value, *group_value],
		recommended,
	})
}

/// Distinct values in first-seen order.
fn distinct(levels: impl Iterator<Item = PermissionLevel>) -> Vec<PermissionLevel> {
	let mut seen = HashSet::new();
	levels.filter(|level| seen.insert(*level)).collect()
}
