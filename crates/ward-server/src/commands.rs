// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subcommand execution. Every command returns a JSON document for stdout.

use anyhow::Context;
use serde_json::{json, Value};
use ward_core::ResolutionKey;
use ward_server_config::ServerConfig;
use ward_server_permissions::PermissionService;

use crate::cli::Command;

/// Open the configured database, bring its schema up to date and build the
/// permission service over it.
pub async fn connect(config: &ServerConfig) -> anyhow::Result<PermissionService> {
	let pool = ward_server_db::create_pool(&config.database.url)
		.await
		.with_context(|| format!("opening database {}", config.database.url))?;
	ward_server_db::run_migrations(&pool)
		.await
		.context("applying database schema")?;

	Ok(PermissionService::from_pool(pool, config))
}

pub async fn execute(command: Command, config: &ServerConfig) -> anyhow::Result<Value> {
	if command == Command::Version {
		return Ok(version_info());
	}

	let service = connect(config).await?;
	run(command, &service).await
}

/// Run a command against an already connected service.
pub async fn run(command: Command, service: &PermissionService) -> anyhow::Result<Value> {
	let output = match command {
		Command::Migrate => json!({ "migrated": true }),
		Command::Version => version_info(),
		Command::Resolve {
			user,
			resource_type,
			resource_id,
			dry_run,
		} => {
			let key = ResolutionKey::new(user, resource_type, resource_id);
			if dry_run {
				json!({
					"key": key.to_string(),
					"permission": service.effective(&key).await?,
					"conflicts": service.conflicts(&key).await?,
				})
			} else {
				json!({
					"key": key.to_string(),
					"permission": service.resolve(&key).await?,
				})
			}
		}
		Command::BatchResolve {
			user,
			resource_type,
			resource_ids,
			detect,
		} => {
			if detect {
				serde_json::to_value(
					service
						.batch_detect(&user, resource_type, &resource_ids)
						.await,
				)?
			} else {
				serde_json::to_value(
					service
						.batch_resolve(&user, resource_type, &resource_ids)
						.await,
				)?
			}
		}
		Command::Abilities {
			user,
			resource_type,
			resource_id,
		} => {
			let key = ResolutionKey::new(user, resource_type, resource_id);
			json!({
				"key": key.to_string(),
				"abilities": service.abilities(&key).await?,
			})
		}
		Command::Validate { user, document } => {
			serde_json::to_value(service.validate(&user, &document).await?)?
		}
		Command::AutoFix { user, document } => {
			serde_json::to_value(service.auto_fix(&user, &document).await?)?
		}
		Command::RemoveMember { group, user } => {
			serde_json::to_value(service.remove_member(&group, &user).await?)?
		}
		Command::DeleteGroup { group } => serde_json::to_value(service.delete_group(&group).await?)?,
	};

	Ok(output)
}

fn version_info() -> Value {
	json!({
		"name": env!("CARGO_PKG_NAME"),
		"version": env!("CARGO_PKG_VERSION"),
	})
}
