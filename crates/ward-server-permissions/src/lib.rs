// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission resolution and propagation for the Ward server.
//!
//! This crate provides:
//! - **Resolution** ([`resolver`]): collapse a user's grants on one resource
//!   into one effective permission and clean up the redundant rows
//! - **Validation** ([`validator`], [`autofix`]): report drift between stored
//!   records and membership facts, and repair the safe subset
//! - **Cascades** ([`cascade`]): drop group-sourced records when a membership
//!   or a whole group goes away
//! - **Batches** ([`batch`]): resolve or inspect many resources with bounded
//!   concurrency
//! - **Notifications** ([`notifier`], [`bus`]): change events for connected
//!   clients, sequenced per session
//!
//! All mutations for one (user, resource type, resource id) key are
//! serialized through the shared [`KeyedLocks`] table.

pub mod autofix;
pub mod batch;
pub mod bus;
pub mod cascade;
pub mod error;
pub mod locks;
pub mod notifier;
pub mod resolver;
pub mod service;
pub mod validator;

pub use autofix::{AutoFixReport, AutoFixer};
pub use batch::{
	BatchConflicts, BatchDetectReport, BatchFailure, BatchOrchestrator, BatchResolveReport,
	BatchResolved,
};
pub use bus::{EventBus, EventBusError, MemoryEventBus, NotificationStream};
pub use cascade::{CascadeInvalidator, GroupDeletionReport, MemberRemovalReport};
pub use error::{PermissionError, Result};
pub use locks::{KeyGuard, KeyedLocks};
pub use notifier::{ChangeNotifier, Delivery, Session};
pub use resolver::Resolver;
pub use service::PermissionService;
pub use validator::{ConsistencyIssue, ConsistencyReport, ConsistencyValidator, SuggestedFix};
