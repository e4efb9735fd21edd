// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Ward server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`WARD_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use ward_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Resolving in chunks of {}", config.resolution.batch_chunk_size);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub resolution: ResolutionConfig,
	pub notifications: NotificationsConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WARD_SERVER_*`)
/// 2. Config file (`/etc/ward/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		database: layer.database.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		resolution: layer.resolution.unwrap_or_default().finalize(),
		notifications: layer.notifications.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		database = %config.database.url,
		log_level = %config.logging.level,
		log_format = %config.logging.format,
		batch_chunk_size = config.resolution.batch_chunk_size,
		notifications_enabled = config.notifications.enabled,
		"Server configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
pub fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.resolution.batch_chunk_size == 0 {
		return Err(ConfigError::validation(
			"resolution.batch_chunk_size must be at least 1",
		));
	}
	if config.notifications.documents_per_batch == 0 {
		return Err(ConfigError::validation(
			"notifications.documents_per_batch must be at least 1",
		));
	}
	if config.notifications.enabled && config.notifications.channel_capacity == 0 {
		return Err(ConfigError::validation(
			"notifications.channel_capacity must be at least 1 while notifications are enabled",
		));
	}

	Ok(())
}
