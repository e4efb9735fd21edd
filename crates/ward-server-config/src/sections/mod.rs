// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod database;
mod logging;
mod notifications;
mod resolution;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use notifications::{NotificationsConfig, NotificationsConfigLayer};
pub use resolution::{ResolutionConfig, ResolutionConfigLayer};
