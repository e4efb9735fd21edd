// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Invalid stored value: {0}")]
	Parse(#[from] ward_core::ParseError),

	#[error("Invalid stored id: {0}")]
	InvalidId(#[from] uuid::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
