// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sequencing and batching of permission-change notifications.
//!
//! A user may hold several sessions at once, one per connected client. Each
//! session numbers its notifications on its own, starting at 1, so the
//! client buffer behind it can restore publish order. Opening a session never
//! touches the counters of the user's other sessions.
//!
//! A logical change touching many documents is split into several
//! notifications that share `totalBatches`; their sequence numbers are
//! reserved together and are therefore contiguous within each session.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use ward_core::{AffectedDocument, ChangeType, PermissionChangeNotification, SessionId, UserId};
use ward_server_config::NotificationsConfig;

use crate::bus::{EventBus, EventBusError, NotificationStream};

/// An open connection: its id and the notifications addressed to it.
pub struct Session {
	pub id: SessionId,
	pub stream: NotificationStream,
}

/// What one session received from a single [`ChangeNotifier::notify`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
	pub session_id: SessionId,
	pub notifications: Vec<PermissionChangeNotification>,
}

pub struct ChangeNotifier {
	bus: Arc<dyn EventBus>,
	/// Last sequence issued per open session, grouped by user.
	sessions: DashMap<UserId, HashMap<SessionId, u64>>,
	documents_per_batch: usize,
	enabled: bool,
}

impl ChangeNotifier {
	pub fn new(bus: Arc<dyn EventBus>, config: &NotificationsConfig) -> Self {
		Self {
			bus,
			sessions: DashMap::new(),
			documents_per_batch: config.documents_per_batch.max(1),
			enabled: config.enabled,
		}
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Open a new session for `user_id`. Its first notification carries 1.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn open(&self, user_id: &UserId) -> Result<Session, EventBusError> {
		let id = SessionId::generate();
		let stream = self.bus.subscribe(&id).await?;
		self.sessions.entry(*user_id).or_default().insert(id, 0);

		tracing::debug!(user_id = %user_id, session_id = %id, "session opened");
		Ok(Session { id, stream })
	}

	/// Stop numbering and delivering to `session_id`.
	pub async fn close(&self, user_id: &UserId, session_id: &SessionId) {
		self.forget(user_id, session_id);
		self.bus.close(session_id).await;
	}

	/// Last sequence number issued to the session, 0 if none yet. `None`
	/// once the session is closed or was never opened for `user_id`.
	pub fn current_sequence(&self, user_id: &UserId, session_id: &SessionId) -> Option<u64> {
		self.sessions
			.get(user_id)
			.and_then(|sessions| sessions.get(session_id).copied())
	}

	pub fn session_count(&self, user_id: &UserId) -> usize {
		self.sessions.get(user_id).map(|s| s.len()).unwrap_or(0)
	}

	fn forget(&self, user_id: &UserId, session_id: &SessionId) {
		if let Some(mut sessions) = self.sessions.get_mut(user_id) {
			sessions.remove(session_id);
		}
		self.sessions.remove_if(user_id, |_, sessions| sessions.is_empty());
	}

	/// Reserve `count` contiguous sequence numbers in every open session of
	/// `user_id`, returning the first of each range.
	fn reserve(&self, user_id: &UserId, count: u64) -> Vec<(SessionId, u64)> {
		let Some(mut sessions) = self.sessions.get_mut(user_id) else {
			return Vec::new();
		};
		sessions
			.iter_mut()
			.map(|(id, last)| {
				let first = *last + 1;
				*last += count;
				(*id, first)
			})
			.collect()
	}

	/// Split `documents` into batches and publish them to every open session
	/// of `user_id`, each under that session's own sequence numbers.
	///
	/// Nothing is published when the notifier is disabled, `documents` is
	/// empty or the user has no open session. A session whose subscriber has
	/// gone away is closed and left out of the result.
	#[tracing::instrument(skip(self, documents), fields(user_id = %user_id, change_type = %change_type, documents = documents.len()))]
	pub async fn notify(
		&self,
		user_id: &UserId,
		change_type: ChangeType,
		documents: Vec<AffectedDocument>,
	) -> Result<Vec<Delivery>, EventBusError> {
		if !self.enabled || documents.is_empty() {
			return Ok(Vec::new());
		}

		let batches: Vec<&[AffectedDocument]> = documents.chunks(self.documents_per_batch).collect();
		let total_batches = batches.len() as u32;
		let reserved = self.reserve(user_id, u64::from(total_batches));
		if reserved.is_empty() {
			tracing::trace!(user_id = %user_id, "no open sessions");
			return Ok(Vec::new());
		}

		let mut deliveries = Vec::with_capacity(reserved.len());
		'sessions: for (session_id, first) in reserved {
			let mut notifications = Vec::with_capacity(batches.len());
			for (index, affected_documents) in batches.iter().enumerate() {
				let notification = PermissionChangeNotification {
					batch_sequence: first + index as u64,
					batch_index: index as u32,
					total_batches,
					change_type,
					affected_documents: affected_documents.to_vec(),
				};
				if !self.bus.publish(&session_id, notification.clone()).await? {
					tracing::debug!(user_id = %user_id, session_id = %session_id, "session gone, closing");
					self.close(user_id, &session_id).await;
					continue 'sessions;
				}
				notifications.push(notification);
			}

			tracing::debug!(
				user_id = %user_id,
				session_id = %session_id,
				first_sequence = first,
				total_batches,
				"permission change published"
			);
			deliveries.push(Delivery {
				session_id,
				notifications,
			});
		}
		Ok(deliveries)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bus::MemoryEventBus;
	use ward_core::{DocumentId, PermissionLevel};

	fn notifier(documents_per_batch: usize) -> ChangeNotifier {
		ChangeNotifier::new(
			Arc::new(MemoryEventBus::new()),
			&NotificationsConfig {
				documents_per_batch,
				..Default::default()
			},
		)
	}

	fn documents(n: usize) -> Vec<AffectedDocument> {
		(0..n)
			.map(|_| AffectedDocument {
				doc_id: DocumentId::generate(),
				new_permission: PermissionLevel::Read,
			})
			.collect()
	}

	fn sequences(deliveries: &[Delivery], session: &SessionId) -> Vec<u64> {
		deliveries
			.iter()
			.filter(|d| d.session_id == *session)
			.flat_map(|d| d.notifications.iter().map(|n| n.batch_sequence))
			.collect()
	}

	mod sequencing {
		use super::*;

		#[tokio::test]
		async fn sequences_start_at_one_and_increase() {
			let notifier = notifier(100);
			let user = UserId::generate();
			let session = notifier.open(&user).await.unwrap();

			let first = notifier
				.notify(&user, ChangeType::Added, documents(1))
				.await
				.unwrap();
			let second = notifier
				.notify(&user, ChangeType::Removed, documents(1))
				.await
				.unwrap();

			assert_eq!(sequences(&first, &session.id), vec![1]);
			assert_eq!(sequences(&second, &session.id), vec![2]);
			assert_eq!(notifier.current_sequence(&user, &session.id), Some(2));
		}

		#[tokio::test]
		async fn users_have_independent_streams() {
			let notifier = notifier(100);
			let alice = UserId::generate();
			let bob = UserId::generate();
			let _alice_session = notifier.open(&alice).await.unwrap();
			let bob_session = notifier.open(&bob).await.unwrap();

			notifier
				.notify(&alice, ChangeType::Added, documents(1))
				.await
				.unwrap();
			let to_bob = notifier
				.notify(&bob, ChangeType::Added, documents(1))
				.await
				.unwrap();
			assert_eq!(sequences(&to_bob, &bob_session.id), vec![1]);
		}

		#[tokio::test]
		async fn a_new_session_leaves_existing_ones_alone() {
			let notifier = notifier(100);
			let user = UserId::generate();
			let laptop = notifier.open(&user).await.unwrap();
			for _ in 0..3 {
				notifier
					.notify(&user, ChangeType::Added, documents(1))
					.await
					.unwrap();
			}

			let phone = notifier.open(&user).await.unwrap();
			assert_eq!(notifier.current_sequence(&user, &laptop.id), Some(3));
			assert_eq!(notifier.current_sequence(&user, &phone.id), Some(0));

			let deliveries = notifier
				.notify(&user, ChangeType::Added, documents(1))
				.await
				.unwrap();
			assert_eq!(deliveries.len(), 2);
			assert_eq!(sequences(&deliveries, &laptop.id), vec![4]);
			assert_eq!(sequences(&deliveries, &phone.id), vec![1]);
		}

		#[tokio::test]
		async fn closed_sessions_are_forgotten() {
			let notifier = notifier(100);
			let user = UserId::generate();
			let session = notifier.open(&user).await.unwrap();

			notifier.close(&user, &session.id).await;
			assert_eq!(notifier.current_sequence(&user, &session.id), None);
			assert_eq!(notifier.session_count(&user), 0);
		}

		#[tokio::test]
		async fn dropped_streams_are_closed_on_next_publish() {
			let notifier = notifier(100);
			let user = UserId::generate();
			let kept = notifier.open(&user).await.unwrap();
			let dropped = notifier.open(&user).await.unwrap();
			let dropped_id = dropped.id;
			drop(dropped);

			let deliveries = notifier
				.notify(&user, ChangeType::Added, documents(1))
				.await
				.unwrap();
			assert_eq!(deliveries.len(), 1);
			assert_eq!(deliveries[0].session_id, kept.id);
			assert_eq!(notifier.current_sequence(&user, &dropped_id), None);
			assert_eq!(notifier.session_count(&user), 1);
		}

		#[tokio::test]
		async fn nothing_is_sent_without_sessions() {
			let notifier = notifier(100);
			let deliveries = notifier
				.notify(&UserId::generate(), ChangeType::Added, documents(2))
				.await
				.unwrap();
			assert!(deliveries.is_empty());
		}
	}

	mod batching {
		use super::*;

		#[tokio::test]
		async fn large_changes_are_split_with_contiguous_sequences() {
			let notifier = notifier(2);
			let user = UserId::generate();
			let session = notifier.open(&user).await.unwrap();

			let deliveries = notifier
				.notify(&user, ChangeType::Removed, documents(5))
				.await
				.unwrap();

			let published = &deliveries[0].notifications;
			assert_eq!(published.len(), 3);
			assert_eq!(sequences(&deliveries, &session.id), vec![1, 2, 3]);
			let indexes: Vec<u32> = published.iter().map(|n| n.batch_index).collect();
			assert_eq!(indexes, vec![0, 1, 2]);
			assert!(published.iter().all(|n| n.total_batches == 3));
			assert_eq!(published[2].affected_documents.len(), 1);
			assert!(published[2].is_last_batch());
		}

		#[tokio::test]
		async fn empty_changes_publish_nothing() {
			let notifier = notifier(2);
			let user = UserId::generate();
			let session = notifier.open(&user).await.unwrap();
			let deliveries = notifier
				.notify(&user, ChangeType::Added, Vec::new())
				.await
				.unwrap();
			assert!(deliveries.is_empty());
			assert_eq!(notifier.current_sequence(&user, &session.id), Some(0));
		}

		#[tokio::test]
		async fn disabled_notifier_is_silent() {
			let notifier = ChangeNotifier::new(
				Arc::new(MemoryEventBus::new()),
				&NotificationsConfig {
					enabled: false,
					..Default::default()
				},
			);
			let user = UserId::generate();
			let _session = notifier.open(&user).await.unwrap();
			let deliveries = notifier
				.notify(&user, ChangeType::Added, documents(3))
				.await
				.unwrap();
			assert!(deliveries.is_empty());
		}
	}

	mod properties {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn batches_cover_every_document_once(docs in 1usize..60, per_batch in 1usize..10) {
				let runtime = tokio::runtime::Builder::new_current_thread()
					.build()
					.unwrap();
				let notifier = notifier(per_batch);
				let user = UserId::generate();
				let input = documents(docs);

				let (_session, deliveries) = runtime.block_on(async {
					let session = notifier.open(&user).await.unwrap();
					let deliveries = notifier
						.notify(&user, ChangeType::Added, input.clone())
						.await
						.unwrap();
					(session, deliveries)
				});

				prop_assert_eq!(deliveries.len(), 1);
				let published = &deliveries[0].notifications;
				prop_assert_eq!(published.len(), docs.div_ceil(per_batch));
				let flattened: Vec<AffectedDocument> = published
					.iter()
					.flat_map(|n| n.affected_documents.iter().copied())
					.collect();
				prop_assert_eq!(flattened, input);
				for (i, n) in published.iter().enumerate() {
					prop_assert_eq!(n.batch_sequence, i as u64 + 1);
					prop_assert!(n.affected_documents.len() <= per_batch);
				}
			}
		}
	}
}
