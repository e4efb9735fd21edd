// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server notifications flowing into a client cache.

use tokio_stream::StreamExt;
use ward_client::{PermissionSync, ProcessOutcome};
use ward_core::{DocumentId, PermissionLevel, PermissionRecord, ResourceType, UserId, WorkspaceId};
use ward_server_config::ServerConfig;
use ward_server_db::testing::create_test_pool;
use ward_server_db::{
	Group, MembershipRepository, MembershipStore, PermissionRepository, PermissionStore,
};
use ward_server_permissions::PermissionService;

#[tokio::test]
async fn grant_then_cascade_reaches_client_cache() {
	let pool = create_test_pool().await;
	let service = PermissionService::from_pool(pool.clone(), &ServerConfig::default());
	let permissions = PermissionRepository::new(pool.clone());
	let memberships = MembershipRepository::new(pool);

	let workspace = WorkspaceId::generate();
	memberships
		.create_workspace(&workspace, "acme")
		.await
		.unwrap();
	let group = Group::new(workspace, "design");
	memberships.create_group(&group).await.unwrap();
	let user = UserId::generate();
	memberships.add_group_member(&group.id, &user).await.unwrap();
	let doc = DocumentId::generate();
	permissions
		.insert(&PermissionRecord::via_group(
			user,
			group.id,
			ResourceType::Document,
			doc.into(),
			PermissionLevel::Edit,
		))
		.await
		.unwrap();

	let sync = PermissionSync::default();
	let mut session = service.connect(&user).await.unwrap();

	service.notify_granted(&user, &[doc]).await.unwrap();
	let granted = session.stream.next().await.unwrap();
	assert_eq!(sync.handle(granted), ProcessOutcome::Applied { flushed: 0 });
	assert_eq!(sync.cache().get(&doc), Some(PermissionLevel::Edit));

	service.remove_member(&group.id, &user).await.unwrap();
	let removed = session.stream.next().await.unwrap();
	assert_eq!(removed.batch_sequence, 2);
	assert_eq!(sync.handle(removed), ProcessOutcome::Applied { flushed: 0 });
	assert_eq!(sync.cache().get(&doc), None);
}

#[tokio::test]
async fn reconnect_restarts_both_sides() {
	let pool = create_test_pool().await;
	let service = PermissionService::from_pool(pool, &ServerConfig::default());
	let user = UserId::generate();
	let doc = DocumentId::generate();
	let sync = PermissionSync::default();

	let mut session = service.connect(&user).await.unwrap();
	service.notify_granted(&user, &[doc]).await.unwrap();
	sync.handle(session.stream.next().await.unwrap());
	assert_eq!(sync.buffer().expected_sequence(), 2);

	service.disconnect(&user, &session.id).await;
	sync.reset();
	let mut session = service.connect(&user).await.unwrap();
	service.notify_granted(&user, &[doc]).await.unwrap();
	let first = session.stream.next().await.unwrap();
	assert_eq!(first.batch_sequence, 1);
	assert_eq!(sync.handle(first), ProcessOutcome::Applied { flushed: 0 });
}

#[tokio::test]
async fn second_device_does_not_stall_the_first() {
	let pool = create_test_pool().await;
	let service = PermissionService::from_pool(pool, &ServerConfig::default());
	let user = UserId::generate();
	let doc = DocumentId::generate();

	let laptop = PermissionSync::default();
	let mut laptop_session = service.connect(&user).await.unwrap();
	for _ in 0..3 {
		service.notify_granted(&user, &[doc]).await.unwrap();
		let notification = laptop_session.stream.next().await.unwrap();
		assert_eq!(laptop.handle(notification), ProcessOutcome::Applied { flushed: 0 });
	}
	assert_eq!(laptop.buffer().expected_sequence(), 4);

	let phone = PermissionSync::default();
	let mut phone_session = service.connect(&user).await.unwrap();
	service.notify_granted(&user, &[doc]).await.unwrap();

	let to_laptop = laptop_session.stream.next().await.unwrap();
	assert_eq!(to_laptop.batch_sequence, 4);
	assert_eq!(laptop.handle(to_laptop), ProcessOutcome::Applied { flushed: 0 });
	assert_eq!(laptop.buffer().pending(), 0);

	let to_phone = phone_session.stream.next().await.unwrap();
	assert_eq!(to_phone.batch_sequence, 1);
	assert_eq!(phone.handle(to_phone), ProcessOutcome::Applied { flushed: 0 });
}
