// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Where configuration layers come from.
//!
//! Layers merge in ascending [`Precedence`]: built-in defaults, then the TOML
//! file, then `WARD_SERVER_*` environment variables.

use std::fmt::Display;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, LoggingConfigLayer, NotificationsConfigLayer, ResolutionConfigLayer,
};

const ENV_PREFIX: &str = "WARD_SERVER_";
const SYSTEM_CONFIG_PATH: &str = "/etc/ward/server.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults,
	ConfigFile,
	Environment,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Contributes nothing; every section falls back to its finalize defaults.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// A TOML file. A missing file is an empty layer, not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		let content = match std::fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				tracing::debug!(path = %self.path.display(), "no config file");
				return Ok(ServerConfigLayer::default());
			}
			Err(source) => {
				return Err(ConfigError::FileRead {
					path: self.path.clone(),
					source,
				})
			}
		};

		toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
			path: self.path.clone(),
			source,
		})
	}
}

/// `WARD_SERVER_<SECTION>_<FIELD>` variables. Empty values count as unset.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		layer_from_vars(|name| std::env::var(name).ok())
	}
}

struct Vars<F> {
	lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
	fn text(&self, field: &str) -> Option<String> {
		(self.lookup)(&format!("{ENV_PREFIX}{field}")).filter(|v| !v.is_empty())
	}

	fn parsed<T>(&self, field: &str) -> Result<Option<T>, ConfigError>
	where
		T: FromStr,
		T::Err: Display,
	{
		self.text(field)
			.map(|raw| {
				raw.parse().map_err(|e| {
					ConfigError::invalid_value(format!("{ENV_PREFIX}{field}"), format!("'{raw}': {e}"))
				})
			})
			.transpose()
	}

	fn flag(&self, field: &str) -> Result<Option<bool>, ConfigError> {
		match self.text(field).map(|v| v.to_ascii_lowercase()).as_deref() {
			None => Ok(None),
			Some("1" | "true" | "yes") => Ok(Some(true)),
			Some("0" | "false" | "no") => Ok(Some(false)),
			Some(other) => Err(ConfigError::invalid_value(
				format!("{ENV_PREFIX}{field}"),
				format!("'{other}' is not a boolean"),
			)),
		}
	}
}

fn layer_from_vars(
	lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServerConfigLayer, ConfigError> {
	let vars = Vars { lookup };

	Ok(ServerConfigLayer {
		database: Some(DatabaseConfigLayer {
			url: vars.text("DATABASE_URL"),
		}),
		logging: Some(LoggingConfigLayer {
			level: vars.text("LOG_LEVEL"),
			format: vars.parsed("LOG_FORMAT")?,
		}),
		resolution: Some(ResolutionConfigLayer {
			batch_chunk_size: vars.parsed("RESOLUTION_BATCH_CHUNK_SIZE")?,
		}),
		notifications: Some(NotificationsConfigLayer {
			enabled: vars.flag("NOTIFICATIONS_ENABLED")?,
			documents_per_batch: vars.parsed("NOTIFICATIONS_DOCUMENTS_PER_BATCH")?,
			channel_capacity: vars.parsed("NOTIFICATIONS_CHANNEL_CAPACITY")?,
		}),
	})
}
