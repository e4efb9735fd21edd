// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process lock table keyed by [`ResolutionKey`].
//!
//! Every mutation of the records under one key (resolver cleanup, priority
//! fixes, cascade deletes) runs while holding that key's guard. Distinct keys
//! never contend. Guards for several keys are always taken in key order so two
//! multi-key callers cannot deadlock.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ward_core::ResolutionKey;

use crate::error::{PermissionError, Result};

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle entries are swept once the table grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

/// Exclusive hold on one resolution key. Released on drop.
#[derive(Debug)]
pub struct KeyGuard {
	key: ResolutionKey,
	_guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
	pub fn key(&self) -> &ResolutionKey {
		&self.key
	}
}

#[derive(Debug)]
pub struct KeyedLocks {
	locks: DashMap<ResolutionKey, Arc<Mutex<()>>>,
	acquire_timeout: Duration,
}

impl Default for KeyedLocks {
	fn default() -> Self {
		Self::new()
	}
}

impl KeyedLocks {
	pub fn new() -> Self {
		Self::with_timeout(DEFAULT_ACQUIRE_TIMEOUT)
	}

	pub fn with_timeout(acquire_timeout: Duration) -> Self {
		Self {
			locks: DashMap::new(),
			acquire_timeout,
		}
	}

	/// Wait for exclusive access to `key`.
	///
	/// # Errors
	/// `PermissionError::Lock` if the key stays held past the acquire timeout.
	pub async fn lock(&self, key: ResolutionKey) -> Result<KeyGuard> {
		if self.locks.len() > PRUNE_THRESHOLD {
			self.prune();
		}

		let mutex = self
			.locks
			.entry(key)
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();

		match tokio::time::timeout(self.acquire_timeout, mutex.lock_owned()).await {
			Ok(guard) => Ok(KeyGuard { key, _guard: guard }),
			Err(_) => {
				tracing::warn!(key = %key, timeout = ?self.acquire_timeout, "lock acquire timed out");
				Err(PermissionError::Lock {
					key,
					timeout: self.acquire_timeout,
				})
			}
		}
	}

	/// Lock every key in `keys`, deduplicated, in ascending key order.
	pub async fn lock_many<I>(&self, keys: I) -> Result<Vec<KeyGuard>>
	where
		I: IntoIterator<Item = ResolutionKey>,
	{
		let mut keys: Vec<ResolutionKey> = keys.into_iter().collect();
		keys.sort();
		keys.dedup();

		let mut guards = Vec::with_capacity(keys.len());
		for key in keys {
			guards.push(self.lock(key).await?);
		}
		Ok(guards)
	}

	/// Number of keys currently tracked, held or idle.
	pub fn len(&self) -> usize {
		self.locks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.locks.is_empty()
	}

	/// Drop entries no caller holds or waits on.
	pub fn prune(&self) {
		self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
	}
}
