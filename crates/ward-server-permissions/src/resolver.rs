// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Conflict resolution against the permission store.
//!
//! [`Resolver::resolve`] loads every record for a key, computes the effective
//! permission and, when the records disagree, collapses them to a single row
//! in one transaction. The whole read-compute-write cycle runs under the
//! key's lock.

use std::sync::Arc;
use ward_core::{detect, resolve_records, CleanupPlan, Conflict, PermissionLevel, ResolutionKey};
use ward_server_db::PermissionStore;

use crate::error::Result;
use crate::locks::KeyedLocks;

#[derive(Clone)]
pub struct Resolver {
	store: Arc<dyn PermissionStore>,
	locks: Arc<KeyedLocks>,
}

impl Resolver {
	pub fn new(store: Arc<dyn PermissionStore>, locks: Arc<KeyedLocks>) -> Self {
		Self { store, locks }
	}

	pub fn locks(&self) -> &Arc<KeyedLocks> {
		&self.locks
	}

	/// Resolve `key` to one effective permission, cleaning up redundant rows.
	///
	/// Afterwards at most one record remains under `key` and its permission
	/// equals the returned value.
	#[tracing::instrument(skip(self), fields(key = %key))]
	pub async fn resolve(&self, key: &ResolutionKey) -> Result<PermissionLevel> {
		let _guard = self.locks.lock(*key).await?;
		self.resolve_locked(key).await
	}

	/// [`Resolver::resolve`] for a caller that already holds `key`'s guard.
	pub(crate) async fn resolve_locked(&self, key: &ResolutionKey) -> Result<PermissionLevel> {
		let records = self.store.list_for_key(key).await.map_err(|e| {
			tracing::error!(key = %key, error = %e, "failed to load records for resolution");
			e
		})?;

		let resolution = resolve_records(&records);
		if let CleanupPlan::Collapse { keep, rewrite, remove } = &resolution.plan {
			let deleted = self.store.collapse(key, keep, *rewrite).await.map_err(|e| {
				tracing::error!(key = %key, error = %e, "failed to collapse records");
				e
			})?;

			tracing::info!(
				key = %key,
				resolved = %resolution.permission,
				kept = %keep,
				rewritten = rewrite.is_some(),
				planned = remove.len(),
				deleted,
				"conflicting records collapsed"
			);
		} else {
			tracing::debug!(key = %key, resolved = %resolution.permission, records = records.len(), "records agree");
		}

		Ok(resolution.permission)
	}

	/// The permission [`Resolver::resolve`] would return, without writing.
	#[tracing::instrument(skip(self), fields(key = %key))]
	pub async fn effective(&self, key: &ResolutionKey) -> Result<PermissionLevel> {
		let records = self.store.list_for_key(key).await?;
		Ok(resolve_records(&records).permission)
	}

	/// Conflicts among the records stored under `key`. Read-only.
	#[tracing::instrument(skip(self), fields(key = %key))]
	pub async fn conflicts(&self, key: &ResolutionKey) -> Result<Vec<Conflict>> {
		let records = self.store.list_for_key(key).await?;
		Ok(detect(&records))
	}
}
