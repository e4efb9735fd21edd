// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolution and detection across many resources for one user.
//!
//! Resource ids are deduplicated, then processed in fixed-size chunks. Keys
//! inside a chunk run concurrently; chunks run one after another. A failure
//! on one key is recorded and does not stop its siblings.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use ward_core::{Conflict, PermissionLevel, ResolutionKey, ResourceId, ResourceType, UserId};

use crate::error::Result;
use crate::resolver::Resolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResolved {
	pub resource_id: ResourceId,
	pub permission: PermissionLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConflicts {
	pub resource_id: ResourceId,
	pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
	pub resource_id: ResourceId,
	pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResolveReport {
	pub resolved: Vec<BatchResolved>,
	pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDetectReport {
	/// Only resources with at least one conflict are listed.
	pub conflicts: Vec<BatchConflicts>,
	pub failures: Vec<BatchFailure>,
}

#[derive(Clone)]
pub struct BatchOrchestrator {
	resolver: Resolver,
	chunk_size: usize,
}

impl BatchOrchestrator {
	/// `chunk_size` is clamped to at least 1.
	pub fn new(resolver: Resolver, chunk_size: usize) -> Self {
		Self {
			resolver,
			chunk_size: chunk_size.max(1),
		}
	}

	pub fn chunk_size(&self) -> usize {
		self.chunk_size
	}

	#[tracing::instrument(skip(self, resource_ids), fields(user_id = %user_id, resource_type = %resource_type, requested = resource_ids.len()))]
	pub async fn resolve_many(
		&self,
		user_id: &UserId,
		resource_type: ResourceType,
		resource_ids: &[ResourceId],
	) -> BatchResolveReport {
		let resolver = &self.resolver;
		let outcomes = self
			.run_chunked(*user_id, resource_type, resource_ids, move |key| async move {
				resolver.resolve(&key).await
			})
			.await;

		let mut report = BatchResolveReport::default();
		for (resource_id, outcome) in outcomes {
			match outcome {
				Ok(permission) => report.resolved.push(BatchResolved {
					resource_id,
					permission,
				}),
				Err(e) => report.failures.push(failure(resource_id, &e)),
			}
		}

		tracing::info!(
			user_id = %user_id,
			resolved = report.resolved.len(),
			failed = report.failures.len(),
			"batch resolution finished"
		);
		report
	}

	#[tracing::instrument(skip(self, resource_ids), fields(user_id = %user_id, resource_type = %resource_type, requested = resource_ids.len()))]
	pub async fn detect_many(
		&self,
		user_id: &UserId,
		resource_type: ResourceType,
		resource_ids: &[ResourceId],
	) -> BatchDetectReport {
		let resolver = &self.resolver;
		let outcomes = self
			.run_chunked(*user_id, resource_type, resource_ids, move |key| async move {
				resolver.conflicts(&key).await
			})
			.await;

		let mut report = BatchDetectReport::default();
		for (resource_id, outcome) in outcomes {
			match outcome {
				Ok(conflicts) if conflicts.is_empty() => {}
				Ok(conflicts) => report.conflicts.push(BatchConflicts {
					resource_id,
					conflicts,
				}),
				Err(e) => report.failures.push(failure(resource_id, &e)),
			}
		}
		report
	}

	async fn run_chunked<T, F, Fut>(
		&self,
		user_id: UserId,
		resource_type: ResourceType,
		resource_ids: &[ResourceId],
		op: F,
	) -> Vec<(ResourceId, Result<T>)>
	where
		F: Fn(ResolutionKey) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut seen = HashSet::new();
		let unique: Vec<ResourceId> = resource_ids
			.iter()
			.copied()
			.filter(|id| seen.insert(*id))
			.collect();

		let mut outcomes = Vec::with_capacity(unique.len());
		for (index, chunk) in unique.chunks(self.chunk_size).enumerate() {
			tracing::debug!(chunk = index, keys = chunk.len(), "processing chunk");
			let results = join_all(
				chunk
					.iter()
					.map(|id| op(ResolutionKey::new(user_id, resource_type, *id))),
			)
			.await;
			outcomes.extend(chunk.iter().copied().zip(results));
		}
		outcomes
	}
}

fn failure(resource_id: ResourceId, error: &crate::error::PermissionError) -> BatchFailure {
	tracing::warn!(resource_id = %resource_id, error = %error, "batch item failed");
	BatchFailure {
		resource_id,
		error: error.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::locks::KeyedLocks;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;
	use ward_core::{GroupId, PermissionRecord, RecordId};
	use ward_server_db::testing::create_test_pool;
	use ward_server_db::{DbError, PermissionRepository, PermissionStore};

	/// Fails every read for one resource; delegates everything else.
	struct FlakyStore {
		inner: PermissionRepository,
		poisoned: ResourceId,
		reads: AtomicUsize,
	}

	#[async_trait]
	impl PermissionStore for FlakyStore {
		async fn insert(&self, record: &PermissionRecord) -> std::result::Result<(), DbError> {
			self.inner.insert(record).await
		}

		async fn get(&self, id: &RecordId) -> std::result::Result<Option<PermissionRecord>, DbError> {
			self.inner.get(id).await
		}

		async fn list_for_key(
			&self,
			key: &ResolutionKey,
		) -> std::result::Result<Vec<PermissionRecord>, DbError> {
			self.reads.fetch_add(1, Ordering::SeqCst);
			if key.resource_id == self.poisoned {
				return Err(DbError::Internal("disk on fire".to_string()));
			}
			self.inner.list_for_key(key).await
		}

		async fn list_by_group_source(
			&self,
			group_id: &GroupId,
			user_id: Option<&UserId>,
		) -> std::result::Result<Vec<PermissionRecord>, DbError> {
			self.inner.list_by_group_source(group_id, user_id).await
		}

		async fn update_priority(&self, id: &RecordId, priority: i64) -> std::result::Result<bool, DbError> {
			self.inner.update_priority(id, priority).await
		}

		async fn collapse(
			&self,
			key: &ResolutionKey,
			keep: &RecordId,
			rewrite: Option<PermissionLevel>,
		) -> std::result::Result<u64, DbError> {
			self.inner.collapse(key, keep, rewrite).await
		}

		async fn delete(&self, id: &RecordId) -> std::result::Result<bool, DbError> {
			self.inner.delete(id).await
		}
	}

	async fn seed(store: &PermissionRepository, user: UserId, resource: ResourceId) {
		for permission in [PermissionLevel::Read, PermissionLevel::Edit] {
			store
				.insert(&PermissionRecord::via_group(
					user,
					GroupId::generate(),
					ResourceType::Document,
					resource,
					permission,
				))
				.await
				.unwrap();
		}
	}

	#[tokio::test]
	async fn resolves_every_resource_across_chunks() {
		let store = Arc::new(PermissionRepository::new(create_test_pool().await));
		let user = UserId::generate();
		let resources: Vec<ResourceId> = (0..5).map(|_| ResourceId::generate()).collect();
		for resource in &resources {
			seed(&store, user, *resource).await;
		}

		let batch = BatchOrchestrator::new(Resolver::new(store.clone(), Arc::new(KeyedLocks::new())), 2);
		let report = batch
			.resolve_many(&user, ResourceType::Document, &resources)
			.await;

		assert!(report.failures.is_empty());
		assert_eq!(report.resolved.len(), 5);
		assert!(report
			.resolved
			.iter()
			.all(|r| r.permission == PermissionLevel::Edit));
		let order: Vec<ResourceId> = report.resolved.iter().map(|r| r.resource_id).collect();
		assert_eq!(order, resources);

		for resource in &resources {
			let key = ResolutionKey::new(user, ResourceType::Document, *resource);
			assert_eq!(store.list_for_key(&key).await.unwrap().len(), 1);
		}
	}

	#[tokio::test]
	async fn duplicate_ids_resolve_once() {
		let store = Arc::new(FlakyStore {
			inner: PermissionRepository::new(create_test_pool().await),
			poisoned: ResourceId::generate(),
			reads: AtomicUsize::new(0),
		});
		let resource = ResourceId::generate();

		let batch = BatchOrchestrator::new(Resolver::new(store.clone(), Arc::new(KeyedLocks::new())), 50);
		let report = batch
			.resolve_many(
				&UserId::generate(),
				ResourceType::Document,
				&[resource, resource, resource],
			)
			.await;

		assert_eq!(report.resolved.len(), 1);
		assert_eq!(store.reads.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn one_failure_does_not_abort_siblings() {
		let poisoned = ResourceId::generate();
		let healthy = ResourceId::generate();
		let user = UserId::generate();
		let inner = PermissionRepository::new(create_test_pool().await);
		seed(&inner, user, healthy).await;
		let store = Arc::new(FlakyStore {
			inner,
			poisoned,
			reads: AtomicUsize::new(0),
		});

		let batch = BatchOrchestrator::new(Resolver::new(store, Arc::new(KeyedLocks::new())), 1);
		let report = batch
			.resolve_many(&user, ResourceType::Document, &[poisoned, healthy])
			.await;

		assert_eq!(report.failures.len(), 1);
		assert_eq!(report.failures[0].resource_id, poisoned);
		assert!(report.failures[0].error.contains("disk on fire"));
		assert_eq!(
			report.resolved,
			vec![BatchResolved {
				resource_id: healthy,
				permission: PermissionLevel::Edit,
			}]
		);
	}

	#[tokio::test]
	async fn detect_many_lists_only_conflicted_resources() {
		let store = Arc::new(PermissionRepository::new(create_test_pool().await));
		let user = UserId::generate();
		let conflicted = ResourceId::generate();
		let clean = ResourceId::generate();
		seed(&store, user, conflicted).await;

		let batch = BatchOrchestrator::new(Resolver::new(store.clone(), Arc::new(KeyedLocks::new())), 50);
		let report = batch
			.detect_many(&user, ResourceType::Document, &[conflicted, clean])
			.await;

		assert!(report.failures.is_empty());
		assert_eq!(report.conflicts.len(), 1);
		assert_eq!(report.conflicts[0].resource_id, conflicted);

		// Detection is read-only.
		let key = ResolutionKey::new(user, ResourceType::Document, conflicted);
		assert_eq!(store.list_for_key(&key).await.unwrap().len(), 2);
	}
}
