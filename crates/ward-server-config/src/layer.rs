// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration that sources produce and merge.

use serde::Deserialize;

use crate::sections::{
	DatabaseConfigLayer, LoggingConfigLayer, NotificationsConfigLayer, ResolutionConfigLayer,
};

/// One source's view of the configuration. Absent sections and fields leave
/// lower-precedence values in place.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfigLayer {
	pub database: Option<DatabaseConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
	pub resolution: Option<ResolutionConfigLayer>,
	pub notifications: Option<NotificationsConfigLayer>,
}

impl ServerConfigLayer {
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(
			&mut self.resolution,
			other.resolution,
			ResolutionConfigLayer::merge,
		);
		merge_section(
			&mut self.notifications,
			other.notifications,
			NotificationsConfigLayer::merge,
		);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(base), Some(other)) => merge(base, other),
		(None, Some(other)) => *base = Some(other),
		(_, None) => {}
	}
}
