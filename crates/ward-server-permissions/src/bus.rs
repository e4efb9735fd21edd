// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of permission-change notifications to connected clients.
//!
//! [`EventBus`] is the seam between the notifier and whatever transport
//! carries notifications to a session. [`MemoryEventBus`] keeps one broadcast
//! channel per session inside this process.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use ward_core::{PermissionChangeNotification, SessionId};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
	#[error("backend error: {0}")]
	Backend(String),
}

/// Notifications for one session, in publish order.
pub type NotificationStream = Pin<Box<dyn Stream<Item = PermissionChangeNotification> + Send>>;

#[async_trait]
pub trait EventBus: Send + Sync {
	/// Deliver `notification` to `session_id`.
	///
	/// Returns `false` when nobody listens on the session any more. That is
	/// not an error.
	async fn publish(
		&self,
		session_id: &SessionId,
		notification: PermissionChangeNotification,
	) -> Result<bool, EventBusError>;

	async fn subscribe(&self, session_id: &SessionId) -> Result<NotificationStream, EventBusError>;

	/// Drop the session's channel. Its stream ends.
	async fn close(&self, session_id: &SessionId);
}

/// Single-process bus backed by tokio broadcast channels.
///
/// A subscriber that falls more than the channel capacity behind skips the
/// notifications it missed; its client buffer force-flushes past the gap.
#[derive(Clone)]
pub struct MemoryEventBus {
	channels: Arc<DashMap<SessionId, broadcast::Sender<PermissionChangeNotification>>>,
	capacity: usize,
}

impl MemoryEventBus {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
	}

	/// `capacity` is clamped to at least 1.
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			channels: Arc::new(DashMap::new()),
			capacity: capacity.max(1),
		}
	}

	/// Live subscribers for `session_id`.
	pub fn subscriber_count(&self, session_id: &SessionId) -> usize {
		self.channels
			.get(session_id)
			.map(|tx| tx.receiver_count())
			.unwrap_or(0)
	}
}

impl Default for MemoryEventBus {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl EventBus for MemoryEventBus {
	async fn publish(
		&self,
		session_id: &SessionId,
		notification: PermissionChangeNotification,
	) -> Result<bool, EventBusError> {
		let Some(tx) = self.channels.get(session_id).map(|tx| tx.clone()) else {
			return Ok(false);
		};
		let sequence = notification.batch_sequence;

		if tx.send(notification).is_err() {
			tracing::trace!(session_id = %session_id, sequence, "session has no subscriber");
			return Ok(false);
		}
		Ok(true)
	}

	async fn subscribe(&self, session_id: &SessionId) -> Result<NotificationStream, EventBusError> {
		let rx = self
			.channels
			.entry(*session_id)
			.or_insert_with(|| broadcast::channel(self.capacity).0)
			.subscribe();
		let session_id = *session_id;

		let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
			Ok(notification) => Some(notification),
			Err(err) => {
				tracing::warn!(session_id = %session_id, error = %err, "subscriber lagged");
				None
			}
		});

		Ok(Box::pin(stream))
	}

	async fn close(&self, session_id: &SessionId) {
		self.channels.remove(session_id);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;
	use ward_core::ChangeType;

	fn notification(sequence: u64) -> PermissionChangeNotification {
		PermissionChangeNotification {
			batch_sequence: sequence,
			batch_index: 0,
			total_batches: 1,
			change_type: ChangeType::Added,
			affected_documents: Vec::new(),
		}
	}

	#[tokio::test]
	async fn publish_and_subscribe() {
		let bus = MemoryEventBus::new();
		let session = SessionId::generate();

		let mut stream = bus.subscribe(&session).await.unwrap();
		assert!(bus.publish(&session, notification(1)).await.unwrap());

		let received = tokio::time::timeout(Duration::from_millis(100), stream.next())
			.await
			.expect("timeout")
			.expect("stream ended");
		assert_eq!(received.batch_sequence, 1);
	}

	#[tokio::test]
	async fn publish_to_unknown_session_is_undelivered() {
		let bus = MemoryEventBus::new();
		assert!(!bus
			.publish(&SessionId::generate(), notification(1))
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn dropped_stream_is_undelivered() {
		let bus = MemoryEventBus::new();
		let session = SessionId::generate();
		drop(bus.subscribe(&session).await.unwrap());

		assert!(!bus.publish(&session, notification(1)).await.unwrap());
	}

	#[tokio::test]
	async fn sessions_are_isolated() {
		let bus = MemoryEventBus::new();
		let first = SessionId::generate();
		let second = SessionId::generate();

		let mut first_stream = bus.subscribe(&first).await.unwrap();
		bus.publish(&second, notification(1)).await.unwrap();
		bus.publish(&first, notification(7)).await.unwrap();

		let received = tokio::time::timeout(Duration::from_millis(100), first_stream.next())
			.await
			.unwrap()
			.unwrap();
		assert_eq!(received.batch_sequence, 7);
		assert_eq!(bus.subscriber_count(&first), 1);
		assert_eq!(bus.subscriber_count(&second), 0);
	}

	#[tokio::test]
	async fn close_ends_the_stream() {
		let bus = MemoryEventBus::new();
		let session = SessionId::generate();
		let mut stream = bus.subscribe(&session).await.unwrap();

		bus.close(&session).await;
		assert!(stream.next().await.is_none());
	}
}
