// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use ward_core::{RegistryError, ResolutionKey, ResourceId, ResourceType};
use ward_server_db::DbError;

use crate::bus::EventBusError;

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
	#[error(transparent)]
	Db(#[from] DbError),

	#[error("{resource_type} {resource_id} not found")]
	NotFound {
		resource_type: ResourceType,
		resource_id: ResourceId,
	},

	#[error("timed out after {timeout:?} waiting for lock on {key}")]
	Lock {
		key: ResolutionKey,
		timeout: Duration,
	},

	#[error("notification delivery failed: {0}")]
	Notify(#[from] EventBusError),

	#[error(transparent)]
	Registry(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, PermissionError>;
