// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reordering buffer for sequenced events.
//!
//! Events arrive tagged with a per-session sequence number starting at 1.
//! An event carrying the expected sequence is applied at once, followed by
//! any buffered successors that became contiguous. An early event waits in
//! the buffer for at most the reorder window; when the window elapses it is
//! applied anyway and the expected sequence jumps past it. Ordering is exact
//! inside the window only.
//!
//! Every operation is synchronous. The only asynchronous piece is one timer
//! task per buffered event, spawned on the ambient Tokio runtime.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub const DEFAULT_REORDER_WINDOW: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
	/// How long an early event waits for the gap before it is forced through.
	pub reorder_window: Duration,
}

impl Default for BufferConfig {
	fn default() -> Self {
		Self {
			reorder_window: DEFAULT_REORDER_WINDOW,
		}
	}
}

/// What [`OrderedEventBuffer::process`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
	/// Applied, followed by `flushed` buffered successors.
	Applied { flushed: usize },
	/// Held until the gap before it fills or the reorder window elapses.
	Buffered,
	/// Stale or duplicate; never applied.
	Dropped,
}

type Sink<E> = Arc<dyn Fn(E) + Send + Sync>;

struct Pending<E> {
	event: E,
	timer: Option<JoinHandle<()>>,
}

struct State<E> {
	expected: u64,
	pending: BTreeMap<u64, Pending<E>>,
	/// Bumped by every clear so timers armed before it never apply.
	generation: u64,
}

impl<E> State<E> {
	fn new() -> Self {
		Self {
			expected: 1,
			pending: BTreeMap::new(),
			generation: 0,
		}
	}

	fn flush(&mut self, sink: &Sink<E>) -> usize {
		let mut flushed = 0;
		while let Some(entry) = self.pending.remove(&self.expected) {
			if let Some(timer) = entry.timer {
				timer.abort();
			}
			sink(entry.event);
			self.expected += 1;
			flushed += 1;
		}
		flushed
	}

	fn force_apply(&mut self, sink: &Sink<E>, sequence: u64, event: E) -> usize {
		tracing::warn!(
			sequence,
			expected = self.expected,
			"reorder window elapsed, applying event out of order"
		);
		sink(event);
		if sequence < self.expected {
			return 0;
		}
		self.expected = sequence + 1;
		self.flush(sink)
	}

	fn cancel_all(&mut self) -> usize {
		let pending = std::mem::take(&mut self.pending);
		let cancelled = pending.len();
		for entry in pending.into_values() {
			if let Some(timer) = entry.timer {
				timer.abort();
			}
		}
		cancelled
	}
}

/// Applies sequenced events to a sink in order, bounding how long a missing
/// event can hold up the ones after it.
///
/// The sink runs while the buffer's lock is held, so it must not call back
/// into the buffer.
pub struct OrderedEventBuffer<E> {
	state: Arc<Mutex<State<E>>>,
	sink: Sink<E>,
	config: BufferConfig,
}

impl<E: Send + 'static> OrderedEventBuffer<E> {
	pub fn new<F>(config: BufferConfig, sink: F) -> Self
	where
		F: Fn(E) + Send + Sync + 'static,
	{
		Self {
			state: Arc::new(Mutex::new(State::new())),
			sink: Arc::new(sink),
			config,
		}
	}

	pub fn with_defaults<F>(sink: F) -> Self
	where
		F: Fn(E) + Send + Sync + 'static,
	{
		Self::new(BufferConfig::default(), sink)
	}

	pub fn config(&self) -> BufferConfig {
		self.config
	}

	/// Apply or buffer `event`. Never fails: stale and duplicate deliveries
	/// are logged and ignored.
	pub fn process(&self, sequence: u64, event: E) -> ProcessOutcome {
		let mut state = self.state.lock();

		if sequence < state.expected {
			tracing::debug!(
				sequence,
				expected = state.expected,
				"dropping stale event"
			);
			return ProcessOutcome::Dropped;
		}

		if sequence == state.expected {
			(self.sink)(event);
			state.expected += 1;
			let flushed = state.flush(&self.sink);
			return ProcessOutcome::Applied { flushed };
		}

		if state.pending.contains_key(&sequence) {
			tracing::debug!(sequence, "dropping duplicate buffered event");
			return ProcessOutcome::Dropped;
		}

		match self.arm_timer(sequence, state.generation) {
			Some(timer) => {
				tracing::debug!(
					sequence,
					expected = state.expected,
					"buffering early event"
				);
				state.pending.insert(
					sequence,
					Pending {
						event,
						timer: Some(timer),
					},
				);
				ProcessOutcome::Buffered
			}
			None => {
				let flushed = state.force_apply(&self.sink, sequence, event);
				ProcessOutcome::Applied { flushed }
			}
		}
	}

	/// Cancel every pending timer, drop buffered events and start over at
	/// sequence 1. Call on logout or when the session changes.
	pub fn clear(&self) {
		let mut state = self.state.lock();
		let cancelled = state.cancel_all();
		state.expected = 1;
		state.generation += 1;
		tracing::debug!(cancelled, "event buffer cleared");
	}

	pub fn expected_sequence(&self) -> u64 {
		self.state.lock().expected
	}

	/// Number of events waiting in the buffer.
	pub fn pending(&self) -> usize {
		self.state.lock().pending.len()
	}

	pub fn pending_sequences(&self) -> Vec<u64> {
		self.state.lock().pending.keys().copied().collect()
	}

	/// Without a runtime there is nothing to wait on; the caller applies the
	/// event at once.
	fn arm_timer(&self, sequence: u64, generation: u64) -> Option<JoinHandle<()>> {
		let Ok(handle) = Handle::try_current() else {
			tracing::warn!(sequence, "no async runtime for reorder timer");
			return None;
		};

		let state = Arc::downgrade(&self.state);
		let sink = Arc::clone(&self.sink);
		let window = self.config.reorder_window;
		Some(handle.spawn(async move {
			tokio::time::sleep(window).await;
			fire(&state, &sink, sequence, generation);
		}))
	}
}

fn fire<E>(state: &Weak<Mutex<State<E>>>, sink: &Sink<E>, sequence: u64, generation: u64) {
	let Some(state) = state.upgrade() else {
		return;
	};
	let mut state = state.lock();
	if state.generation != generation {
		return;
	}
	let Some(entry) = state.pending.remove(&sequence) else {
		return;
	};
	state.force_apply(sink, sequence, entry.event);
}

impl<E> Drop for OrderedEventBuffer<E> {
	fn drop(&mut self) {
		self.state.lock().cancel_all();
	}
}

impl<E> fmt::Debug for OrderedEventBuffer<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.lock();
		f.debug_struct("OrderedEventBuffer")
			.field("expected_sequence", &state.expected)
			.field("pending", &state.pending.len())
			.field("config", &self.config)
			.finish()
	}
}
