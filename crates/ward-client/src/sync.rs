// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use futures::{Stream, StreamExt};
use ward_core::PermissionChangeNotification;

use crate::buffer::{BufferConfig, OrderedEventBuffer, ProcessOutcome};
use crate::cache::PermissionCache;

/// Feeds server notifications through an [`OrderedEventBuffer`] into a
/// [`PermissionCache`].
#[derive(Debug)]
pub struct PermissionSync {
	buffer: OrderedEventBuffer<PermissionChangeNotification>,
	cache: PermissionCache,
}

impl PermissionSync {
	pub fn new(config: BufferConfig) -> Self {
		Self::with_cache(config, PermissionCache::new())
	}

	pub fn with_cache(config: BufferConfig, cache: PermissionCache) -> Self {
		let sink = cache.clone();
		Self {
			buffer: OrderedEventBuffer::new(config, move |notification| sink.apply(&notification)),
			cache,
		}
	}

	pub fn cache(&self) -> &PermissionCache {
		&self.cache
	}

	pub fn buffer(&self) -> &OrderedEventBuffer<PermissionChangeNotification> {
		&self.buffer
	}

	pub fn handle(&self, notification: PermissionChangeNotification) -> ProcessOutcome {
		self.buffer
			.process(notification.batch_sequence, notification)
	}

	/// Drain `stream` until it ends, handling each notification in arrival
	/// order. Returns how many were received.
	pub async fn consume<S>(&self, mut stream: S) -> usize
	where
		S: Stream<Item = PermissionChangeNotification> + Unpin,
	{
		let mut received = 0;
		while let Some(notification) = stream.next().await {
			self.handle(notification);
			received += 1;
		}
		tracing::debug!(received, "notification stream ended");
		received
	}

	/// Forget buffered notifications and expect the stream to restart at 1.
	/// Call before reconnecting.
	pub fn reset(&self) {
		self.buffer.clear();
	}

	/// Reset and drop everything cached for the departing user.
	pub fn logout(&self) {
		self.buffer.clear();
		self.cache.clear();
		tracing::debug!("permission sync logged out");
	}
}

impl Default for PermissionSync {
	fn default() -> Self {
		Self::new(BufferConfig::default())
	}
}
