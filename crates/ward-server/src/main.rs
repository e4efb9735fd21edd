// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ward server binary.

use clap::Parser;
use ward_server::{execute, init_tracing, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => ward_server_config::load_config_with_file(path)?,
		None => ward_server_config::load_config()?,
	};

	init_tracing(&config.logging);

	tracing::info!(
		database = %config.database.url,
		command = ?args.command,
		"starting ward-server"
	);

	let output = execute(args.command, &config).await?;
	println!("{}", serde_json::to_string_pretty(&output)?);

	Ok(())
}
