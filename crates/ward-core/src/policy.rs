// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Static policy tables.
//!
//! Two process-wide lookup tables, built once on first use and never mutated:
//!
//! | Permission | Rank |   | Source            | Priority |
//! |------------|------|---|-------------------|----------|
//! | none       | 0    |   | direct            | 1        |
//! | read       | 1    |   | group             | 2        |
//! | comment    | 2    |   | subspace_admin    | 3        |
//! | edit       | 3    |   | subspace_member   | 4        |
//! | manage     | 4    |   | workspace_admin   | 5        |
//! | owner      | 5    |   | workspace_member  | 6        |
//! |            |      |   | guest             | 7        |
//!
//! Every comparison between permission levels or sources goes through these
//! tables.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::types::{PermissionLevel, SourceType};

static PERMISSION_RANK: LazyLock<HashMap<PermissionLevel, u8>> = LazyLock::new(|| {
	HashMap::from([
		(PermissionLevel::None, 0),
		(PermissionLevel::Read, 1),
		(PermissionLevel::Comment, 2),
		(PermissionLevel::Edit, 3),
		(PermissionLevel::Manage, 4),
		(PermissionLevel::Owner, 5),
	])
});

static SOURCE_PRIORITY: LazyLock<HashMap<SourceType, i64>> = LazyLock::new(|| {
	HashMap::from([
		(SourceType::Direct, 1),
		(SourceType::Group, 2),
		(SourceType::SubspaceAdmin, 3),
		(SourceType::SubspaceMember, 4),
		(SourceType::WorkspaceAdmin, 5),
		(SourceType::WorkspaceMember, 6),
		(SourceType::Guest, 7),
	])
});

/// Rank of a permission level. Higher grants more.
pub fn permission_rank(level: PermissionLevel) -> u8 {
	PERMISSION_RANK[&level]
}

/// Canonical priority of a grant source. Lower takes precedence.
pub fn source_priority(source: SourceType) -> i64 {
	SOURCE_PRIORITY[&source]
}

/// Orders two levels by rank.
pub fn compare_permissions(a: PermissionLevel, b: PermissionLevel) -> Ordering {
	permission_rank(a).cmp(&permission_rank(b))
}

/// Returns the highest-ranked level, or `None` for an empty input.
pub fn max_permission<I>(levels: I) -> Option<PermissionLevel>
where
	I: IntoIterator<Item = PermissionLevel>,
{
	levels.into_iter().max_by(|a, b| compare_permissions(*a, *b))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_permission_level_is_ranked() {
		for (expected, level) in PermissionLevel::all().iter().enumerate() {
			assert_eq!(permission_rank(*level) as usize, expected);
		}
	}

	#[test]
	fn every_source_has_a_priority() {
		for (index, source) in SourceType::all().iter().enumerate() {
			assert_eq!(source_priority(*source), index as i64 + 1);
		}
	}

	#[test]
	fn direct_outranks_every_other_source() {
		let direct = source_priority(SourceType::Direct);
		for source in SourceType::all() {
			if *source != SourceType::Direct {
				assert!(direct < source_priority(*source));
			}
		}
	}

	#[test]
	fn max_permission_picks_highest_rank() {
		let levels = [
			PermissionLevel::Read,
			PermissionLevel::Manage,
			PermissionLevel::Comment,
		];
		assert_eq!(max_permission(levels), Some(PermissionLevel::Manage));
		assert_eq!(max_permission(std::iter::empty()), None);
	}
}
