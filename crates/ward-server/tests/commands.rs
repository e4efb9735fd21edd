// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tempfile::TempDir;
use ward_core::{
	DocumentId, GroupId, PermissionLevel, PermissionRecord, ResourceType, UserId, WorkspaceId,
};
use ward_server::{execute, Command};
use ward_server_config::{DatabaseConfig, ServerConfig};
use ward_server_db::{
	create_pool, run_migrations, Group, MembershipRepository, MembershipStore,
	PermissionRepository, PermissionStore,
};

fn config(dir: &TempDir) -> ServerConfig {
	ServerConfig {
		database: DatabaseConfig {
			url: format!("sqlite:{}", dir.path().join("ward.db").display()),
		},
		..Default::default()
	}
}

async fn repositories(config: &ServerConfig) -> (PermissionRepository, MembershipRepository) {
	let pool = create_pool(&config.database.url).await.unwrap();
	run_migrations(&pool).await.unwrap();
	(
		PermissionRepository::new(pool.clone()),
		MembershipRepository::new(pool),
	)
}

#[tokio::test]
async fn migrate_creates_database() {
	let dir = TempDir::new().unwrap();
	let config = config(&dir);

	let output = execute(Command::Migrate, &config).await.unwrap();
	assert_eq!(output["migrated"], true);
	assert!(dir.path().join("ward.db").exists());
}

#[tokio::test]
async fn version_needs_no_database() {
	let dir = TempDir::new().unwrap();
	let config = config(&dir);

	let output = execute(Command::Version, &config).await.unwrap();
	assert_eq!(output["name"], "ward-server");
	assert!(!dir.path().join("ward.db").exists());
}

#[tokio::test]
async fn resolve_collapses_records() {
	let dir = TempDir::new().unwrap();
	let config = config(&dir);
	let (permissions, _) = repositories(&config).await;

	let user = UserId::generate();
	let doc = DocumentId::generate();
	for level in [PermissionLevel::Read, PermissionLevel::Edit] {
		permissions
			.insert(&PermissionRecord::direct(
				user,
				ResourceType::Document,
				doc.into(),
				level,
			))
			.await
			.unwrap();
	}

	let dry = execute(
		Command::Resolve {
			user,
			resource_type: ResourceType::Document,
			resource_id: doc.into(),
			dry_run: true,
		},
		&config,
	)
	.await
	.unwrap();
	assert_eq!(dry["permission"], "edit");
	assert_eq!(dry["conflicts"].as_array().unwrap().len(), 1);

	let output = execute(
		Command::Resolve {
			user,
			resource_type: ResourceType::Document,
			resource_id: doc.into(),
			dry_run: false,
		},
		&config,
	)
	.await
	.unwrap();
	assert_eq!(output["permission"], "edit");

	let key = ward_core::ResolutionKey::new(user, ResourceType::Document, doc.into());
	assert_eq!(permissions.list_for_key(&key).await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_group_reports_removed_records() {
	let dir = TempDir::new().unwrap();
	let config = config(&dir);
	let (permissions, memberships) = repositories(&config).await;

	let workspace = WorkspaceId::generate();
	memberships
		.create_workspace(&workspace, "acme")
		.await
		.unwrap();
	let group = Group::new(workspace, "design");
	memberships.create_group(&group).await.unwrap();
	let user = UserId::generate();
	memberships.add_group_member(&group.id, &user).await.unwrap();
	permissions
		.insert(&PermissionRecord::via_group(
			user,
			group.id,
			ResourceType::Document,
			DocumentId::generate().into(),
			PermissionLevel::Read,
		))
		.await
		.unwrap();

	let output = execute(Command::DeleteGroup { group: group.id }, &config)
		.await
		.unwrap();
	assert_eq!(output["group_removed"], true);
	assert_eq!(output["removed_records"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn validate_unknown_document_fails() {
	let dir = TempDir::new().unwrap();
	let config = config(&dir);

	let result = execute(
		Command::Validate {
			user: UserId::generate(),
			document: DocumentId::generate(),
		},
		&config,
	)
	.await;
	assert!(result.is_err());
}

#[tokio::test]
async fn remove_member_of_unknown_group_is_a_no_op() {
	let dir = TempDir::new().unwrap();
	let config = config(&dir);

	let output = execute(
		Command::RemoveMember {
			group: GroupId::generate(),
			user: UserId::generate(),
		},
		&config,
	)
	.await
	.unwrap();
	assert_eq!(output["membership_removed"], false);
	assert_eq!(output["notifications"], 0);
}
