// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client side of Ward permission propagation.
//!
//! Notifications from the server can arrive out of order. [`PermissionSync`]
//! puts them back in sequence with an [`OrderedEventBuffer`] and applies them
//! to a local [`PermissionCache`].

pub mod buffer;
pub mod cache;
pub mod sync;

pub use buffer::{BufferConfig, OrderedEventBuffer, ProcessOutcome, DEFAULT_REORDER_WINDOW};
pub use cache::PermissionCache;
pub use sync::PermissionSync;
