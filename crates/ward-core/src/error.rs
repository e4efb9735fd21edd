// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::ResourceType;

/// Returned when a stored or user-supplied string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: '{value}'")]
pub struct ParseError {
	pub kind: &'static str,
	pub value: String,
}

impl ParseError {
	pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
		Self {
			kind,
			value: value.into(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	#[error("no ability factory registered for {0}")]
	Unregistered(ResourceType),

	#[error("an ability factory is already registered for {0}")]
	Duplicate(ResourceType),
}
