// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One entry point wiring every permission component over shared stores,
//! a shared lock table and a shared notifier.

use sqlx::sqlite::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;
use ward_core::{
	AbilityRegistry, Action, AffectedDocument, ChangeType, Conflict, DocumentId, GroupId,
	PermissionLevel, ResolutionKey, ResourceId, ResourceType, SessionId, UserId,
};
use ward_server_config::ServerConfig;
use ward_server_db::{MembershipRepository, MembershipStore, PermissionRepository, PermissionStore};

use crate::autofix::{AutoFixReport, AutoFixer};
use crate::batch::{BatchDetectReport, BatchOrchestrator, BatchResolveReport};
use crate::bus::{EventBus, MemoryEventBus};
use crate::cascade::{CascadeInvalidator, GroupDeletionReport, MemberRemovalReport};
use crate::error::Result;
use crate::locks::KeyedLocks;
use crate::notifier::{ChangeNotifier, Delivery, Session};
use crate::resolver::Resolver;
use crate::validator::{ConsistencyReport, ConsistencyValidator};

#[derive(Clone)]
pub struct PermissionService {
	resolver: Resolver,
	validator: ConsistencyValidator,
	autofix: AutoFixer,
	cascade: CascadeInvalidator,
	batch: BatchOrchestrator,
	notifier: Arc<ChangeNotifier>,
	abilities: Arc<AbilityRegistry>,
}

impl PermissionService {
	pub fn new(
		permissions: Arc<dyn PermissionStore>,
		memberships: Arc<dyn MembershipStore>,
		bus: Arc<dyn EventBus>,
		config: &ServerConfig,
	) -> Self {
		let resolver = Resolver::new(permissions.clone(), Arc::new(KeyedLocks::new()));
		let validator = ConsistencyValidator::new(permissions.clone(), memberships.clone());
		let notifier = Arc::new(ChangeNotifier::new(bus, &config.notifications));

		Self {
			autofix: AutoFixer::new(resolver.clone(), validator.clone(), permissions.clone()),
			cascade: CascadeInvalidator::new(
				permissions,
				memberships,
				resolver.clone(),
				notifier.clone(),
			),
			batch: BatchOrchestrator::new(resolver.clone(), config.resolution.batch_chunk_size),
			resolver,
			validator,
			notifier,
			abilities: Arc::new(AbilityRegistry::with_defaults()),
		}
	}

	/// SQLite-backed service with an in-process event bus.
	pub fn from_pool(pool: SqlitePool, config: &ServerConfig) -> Self {
		let bus = Arc::new(MemoryEventBus::with_capacity(
			config.notifications.channel_capacity,
		));
		Self::new(
			Arc::new(PermissionRepository::new(pool.clone())),
			Arc::new(MembershipRepository::new(pool)),
			bus,
			config,
		)
	}

	/// Replace the ability registry, e.g. with custom factories registered.
	pub fn with_abilities(mut self, abilities: AbilityRegistry) -> Self {
		self.abilities = Arc::new(abilities);
		self
	}

	pub async fn resolve(&self, key: &ResolutionKey) -> Result<PermissionLevel> {
		self.resolver.resolve(key).await
	}

	pub async fn effective(&self, key: &ResolutionKey) -> Result<PermissionLevel> {
		self.resolver.effective(key).await
	}

	pub async fn conflicts(&self, key: &ResolutionKey) -> Result<Vec<Conflict>> {
		self.resolver.conflicts(key).await
	}

	/// What the user may do on the resource, from its effective permission.
	pub async fn abilities(&self, key: &ResolutionKey) -> Result<BTreeSet<Action>> {
		let permission = self.resolver.effective(key).await?;
		Ok(self.abilities.abilities(key.resource_type, permission)?)
	}

	pub async fn batch_resolve(
		&self,
		user_id: &UserId,
		resource_type: ResourceType,
		resource_ids: &[ResourceId],
	) -> BatchResolveReport {
		self.batch
			.resolve_many(user_id, resource_type, resource_ids)
			.await
	}

	pub async fn batch_detect(
		&self,
		user_id: &UserId,
		resource_type: ResourceType,
		resource_ids: &[ResourceId],
	) -> BatchDetectReport {
		self.batch
			.detect_many(user_id, resource_type, resource_ids)
			.await
	}

	pub async fn validate(
		&self,
		user_id: &UserId,
		document_id: &DocumentId,
	) -> Result<ConsistencyReport> {
		self.validator.validate(user_id, document_id).await
	}

	pub async fn auto_fix(&self, user_id: &UserId, document_id: &DocumentId) -> Result<AutoFixReport> {
		self.autofix.auto_fix(user_id, document_id).await
	}

	pub async fn remove_member(
		&self,
		group_id: &GroupId,
		user_id: &UserId,
	) -> Result<MemberRemovalReport> {
		self.cascade.remove_member(group_id, user_id).await
	}

	pub async fn delete_group(&self, group_id: &GroupId) -> Result<GroupDeletionReport> {
		self.cascade.delete_group(group_id).await
	}

	/// Tell `user_id`'s open sessions about grants the sharing flow just
	/// created on `documents`, carrying each document's effective permission.
	#[tracing::instrument(skip(self, documents), fields(user_id = %user_id, documents = documents.len()))]
	pub async fn notify_granted(
		&self,
		user_id: &UserId,
		documents: &[DocumentId],
	) -> Result<Vec<Delivery>> {
		let mut affected = Vec::with_capacity(documents.len());
		for doc_id in documents {
			let key = ResolutionKey::new(*user_id, ResourceType::Document, (*doc_id).into());
			affected.push(AffectedDocument {
				doc_id: *doc_id,
				new_permission: self.resolver.effective(&key).await?,
			});
		}

		Ok(self
			.notifier
			.notify(user_id, ChangeType::Added, affected)
			.await?)
	}

	/// Open a new session for `user_id`. Its sequence starts at 1, matching a
	/// freshly cleared client buffer; the user's other sessions keep theirs.
	pub async fn connect(&self, user_id: &UserId) -> Result<Session> {
		Ok(self.notifier.open(user_id).await?)
	}

	pub async fn disconnect(&self, user_id: &UserId, session_id: &SessionId) {
		self.notifier.close(user_id, session_id).await;
	}

	pub fn notifier(&self) -> &Arc<ChangeNotifier> {
		&self.notifier
	}
}
