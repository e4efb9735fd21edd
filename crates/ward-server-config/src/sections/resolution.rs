// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolution configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_BATCH_CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResolutionConfigLayer {
	pub batch_chunk_size: Option<usize>,
}

impl ResolutionConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.batch_chunk_size.is_some() {
			self.batch_chunk_size = other.batch_chunk_size;
		}
	}

	pub fn finalize(self) -> ResolutionConfig {
		ResolutionConfig {
			batch_chunk_size: self.batch_chunk_size.unwrap_or(DEFAULT_BATCH_CHUNK_SIZE),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolutionConfig {
	/// Keys resolved concurrently per chunk by batch resolution.
	pub batch_chunk_size: usize,
}

impl Default for ResolutionConfig {
	fn default() -> Self {
		Self {
			batch_chunk_size: DEFAULT_BATCH_CHUNK_SIZE,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_chunk_size() {
		assert_eq!(ResolutionConfigLayer::default().finalize().batch_chunk_size, 50);
	}

	#[test]
	fn test_layer_finalize_with_values() {
		let layer = ResolutionConfigLayer {
			batch_chunk_size: Some(8),
		};
		assert_eq!(layer.finalize().batch_chunk_size, 8);
	}
}
