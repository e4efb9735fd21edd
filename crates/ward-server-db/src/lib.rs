// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for Ward.
//!
//! Two repositories share one pool:
//! - [`PermissionRepository`] owns the `permission_records` table
//! - [`MembershipRepository`] owns the hierarchy, membership and group tables,
//!   plus the transactional cascades that clean up group-sourced records
//!
//! Both expose their operations as inherent methods and through an
//! `async_trait` store trait so higher layers can substitute fakes.

pub mod error;
pub mod membership;
pub mod permission;
pub mod pool;
pub mod schema;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{DbError, Result};
pub use membership::{MembershipRepository, MembershipStore};
pub use permission::{PermissionRepository, PermissionStore};
pub use pool::create_pool;
pub use schema::run_migrations;
pub use types::{DocumentContext, Group, GroupDeletion, MemberRemoval, MemberRole};
