// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission-change notifications pushed to connected clients.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "batchSequence": 7,
//!   "batchIndex": 0,
//!   "totalBatches": 2,
//!   "changeType": "removed",
//!   "affectedDocuments": [
//!     { "docId": "…", "newPermission": "read" }
//!   ]
//! }
//! ```
//!
//! `batchSequence` is assigned per change stream and increases by one per
//! notification. One logical change may span several notifications; they
//! share `totalBatches` and are numbered by `batchIndex`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{DocumentId, PermissionLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
	Added,
	Removed,
}

impl fmt::Display for ChangeType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChangeType::Added => write!(f, "added"),
			ChangeType::Removed => write!(f, "removed"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedDocument {
	pub doc_id: DocumentId,
	pub new_permission: PermissionLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionChangeNotification {
	pub batch_sequence: u64,
	pub batch_index: u32,
	pub total_batches: u32,
	pub change_type: ChangeType,
	pub affected_documents: Vec<AffectedDocument>,
}

impl PermissionChangeNotification {
	pub fn is_last_batch(&self) -> bool {
		self.batch_index + 1 >= self.total_batches
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serializes_with_camel_case_fields() {
		let doc_id = DocumentId::generate();
		let notification = PermissionChangeNotification {
			batch_sequence: 3,
			batch_index: 0,
			total_batches: 1,
			change_type: ChangeType::Removed,
			affected_documents: vec![AffectedDocument {
				doc_id,
				new_permission: PermissionLevel::Read,
			}],
		};

		let json = serde_json::to_value(&notification).unwrap();
		assert_eq!(json["batchSequence"], 3);
		assert_eq!(json["totalBatches"], 1);
		assert_eq!(json["changeType"], "removed");
		assert_eq!(json["affectedDocuments"][0]["docId"], doc_id.to_string());
		assert_eq!(json["affectedDocuments"][0]["newPermission"], "read");
	}

	#[test]
	fn parses_client_payload() {
		let doc_id = DocumentId::generate();
		let raw = format!(
			r#"{{"batchSequence":9,"batchIndex":1,"totalBatches":2,"changeType":"added","affectedDocuments":[{{"docId":"{doc_id}","newPermission":"edit"}}]}}"#
		);

		let parsed: PermissionChangeNotification = serde_json::from_str(&raw).unwrap();
		assert_eq!(parsed.batch_sequence, 9);
		assert_eq!(parsed.change_type, ChangeType::Added);
		assert!(parsed.is_last_batch());
		assert_eq!(
			parsed.affected_documents[0].new_permission,
			PermissionLevel::Edit
		);
	}
}
