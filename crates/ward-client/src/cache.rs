// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use ward_core::{DocumentId, PermissionChangeNotification, PermissionLevel};

/// The client's view of its permission on each document it knows about.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct PermissionCache {
	entries: Arc<RwLock<HashMap<DocumentId, PermissionLevel>>>,
}

impl PermissionCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Apply every document in `notification`. A `none` permission means
	/// access is gone and drops the entry.
	pub fn apply(&self, notification: &PermissionChangeNotification) {
		let mut entries = self.entries.write();
		for doc in &notification.affected_documents {
			if doc.new_permission == PermissionLevel::None {
				entries.remove(&doc.doc_id);
			} else {
				entries.insert(doc.doc_id, doc.new_permission);
			}
		}
		tracing::trace!(
			sequence = notification.batch_sequence,
			change_type = %notification.change_type,
			documents = notification.affected_documents.len(),
			"permission cache updated"
		);
	}

	pub fn get(&self, doc_id: &DocumentId) -> Option<PermissionLevel> {
		self.entries.read().get(doc_id).copied()
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	pub fn clear(&self) {
		self.entries.write().clear();
	}

	pub fn snapshot(&self) -> BTreeMap<DocumentId, PermissionLevel> {
		self.entries
			.read()
			.iter()
			.map(|(doc, level)| (*doc, *level))
			.collect()
	}
}
