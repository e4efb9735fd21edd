// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use ward_core::{DocumentId, GroupId, ResourceId, ResourceType, UserId};

/// Ward server - permission resolution and maintenance.
#[derive(Parser, Debug)]
#[command(name = "ward-server", about = "Ward permission engine", version)]
pub struct Args {
	/// Config file to layer over defaults (environment still wins)
	#[arg(long, env = "WARD_SERVER_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
	/// Create or upgrade the database schema
	Migrate,

	/// Resolve one user's grants on a resource and clean up redundant records
	Resolve {
		#[arg(long)]
		user: UserId,
		#[arg(long = "type")]
		resource_type: ResourceType,
		#[arg(long = "id")]
		resource_id: ResourceId,
		/// Report the effective permission and conflicts without writing
		#[arg(long)]
		dry_run: bool,
	},

	/// Resolve many resources of one kind for a user
	BatchResolve {
		#[arg(long)]
		user: UserId,
		#[arg(long = "type")]
		resource_type: ResourceType,
		#[arg(long = "id", required = true, num_args = 1..)]
		resource_ids: Vec<ResourceId>,
		/// Only report conflicts
		#[arg(long)]
		detect: bool,
	},

	/// List what the user may do on a resource
	Abilities {
		#[arg(long)]
		user: UserId,
		#[arg(long = "type")]
		resource_type: ResourceType,
		#[arg(long = "id")]
		resource_id: ResourceId,
	},

	/// Check a user's records on a document against membership facts
	Validate {
		#[arg(long)]
		user: UserId,
		#[arg(long)]
		document: DocumentId,
	},

	/// Resolve, validate and repair a user's records on a document
	AutoFix {
		#[arg(long)]
		user: UserId,
		#[arg(long)]
		document: DocumentId,
	},

	/// Remove a user from a group and drop the grants it gave them
	RemoveMember {
		#[arg(long)]
		group: GroupId,
		#[arg(long)]
		user: UserId,
	},

	/// Delete a group and every grant it gave its members
	DeleteGroup {
		#[arg(long)]
		group: GroupId,
	},

	/// Show version information
	Version,
}
