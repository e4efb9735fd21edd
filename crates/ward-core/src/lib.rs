// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Ward permission resolution.
//!
//! This crate is pure: it performs no I/O. It provides:
//!
//! - **Identifiers and enums** ([`types`]): resource kinds, permission levels,
//!   grant sources and type-safe id newtypes
//! - **Policy tables** ([`policy`]): permission ranking and source priority
//! - **Records** ([`record`]): one grant, from one source, on one resource
//! - **Conflict detection** ([`conflict`]) and **resolution** ([`resolution`])
//! - **Abilities** ([`ability`]): what a resolved permission lets a principal do
//! - **Change notifications** ([`notification`]) pushed to connected clients

pub mod ability;
pub mod conflict;
pub mod error;
pub mod notification;
pub mod policy;
pub mod record;
pub mod resolution;
pub mod types;

pub use ability::{AbilityFactory, AbilityRegistry, Action};
pub use conflict::{detect, Conflict, ConflictKind};
pub use error::{ParseError, RegistryError};
pub use notification::{AffectedDocument, ChangeType, PermissionChangeNotification};
pub use policy::{permission_rank, source_priority};
pub use record::{PermissionRecord, ResolutionKey};
pub use resolution::{resolve_records, sort_for_resolution, CleanupPlan, Resolution};
pub use types::{
	DocumentId, GroupId, PermissionLevel, RecordId, ResourceId, ResourceType, SourceType,
	SessionId, SubspaceId, UserId, WorkspaceId,
};
