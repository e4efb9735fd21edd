// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Change notification configuration section.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationsConfigLayer {
	pub enabled: Option<bool>,
	pub documents_per_batch: Option<usize>,
	pub channel_capacity: Option<usize>,
}

impl NotificationsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.documents_per_batch.is_some() {
			self.documents_per_batch = other.documents_per_batch;
		}
		if other.channel_capacity.is_some() {
			self.channel_capacity = other.channel_capacity;
		}
	}

	pub fn finalize(self) -> NotificationsConfig {
		let defaults = NotificationsConfig::default();
		NotificationsConfig {
			enabled: self.enabled.unwrap_or(defaults.enabled),
			documents_per_batch: self
				.documents_per_batch
				.unwrap_or(defaults.documents_per_batch),
			channel_capacity: self.channel_capacity.unwrap_or(defaults.channel_capacity),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationsConfig {
	pub enabled: bool,
	/// Affected documents per emitted notification batch.
	pub documents_per_batch: usize,
	/// Buffered notifications per session channel before slow receivers lag.
	pub channel_capacity: usize,
}

impl Default for NotificationsConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			documents_per_batch: 100,
			channel_capacity: 256,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = NotificationsConfig::default();
		assert!(config.enabled);
		assert_eq!(config.documents_per_batch, 100);
		assert_eq!(config.channel_capacity, 256);
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = NotificationsConfigLayer {
			enabled: Some(true),
			documents_per_batch: Some(100),
			channel_capacity: None,
		};
		base.merge(NotificationsConfigLayer {
			enabled: Some(false),
			..Default::default()
		});
		let config = base.finalize();
		assert!(!config.enabled);
		assert_eq!(config.documents_per_batch, 100);
		assert_eq!(config.channel_capacity, 256);
	}
}
