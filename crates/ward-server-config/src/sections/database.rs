// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database configuration.

use serde::Deserialize;

const DEFAULT_DATABASE_URL: &str = "sqlite:./ward.db";

/// Database configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
	pub url: String,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_DATABASE_URL.to_string(),
		}
	}
}

/// Database configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self
				.url
				.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_url() {
		let config = DatabaseConfigLayer::default().finalize();
		assert_eq!(config.url, "sqlite:./ward.db");
	}

	#[test]
	fn test_custom_url() {
		let layer = DatabaseConfigLayer {
			url: Some("sqlite:/var/lib/ward/permissions.db".to_string()),
		};
		let config = layer.finalize();
		assert_eq!(config.url, "sqlite:/var/lib/ward/permissions.db");
	}

	#[test]
	fn test_merge_keeps_base_when_other_empty() {
		let mut base = DatabaseConfigLayer {
			url: Some("sqlite::memory:".to_string()),
		};
		base.merge(DatabaseConfigLayer::default());
		assert_eq!(base.url.as_deref(), Some("sqlite::memory:"));
	}
}
