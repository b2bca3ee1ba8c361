//! The debounce state machine, free of any runtime.
//!
//! Events are pushed with the time they arrived and the first one of a burst
//! schedules a deadline `window` later. Whoever drives the debouncer calls
//! [`Debouncer::fire`] once that deadline passes and gets the burst back as a
//! single deduplicated [`CoalescedBatch`].

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sr_rpc::PushMessage;
use tokio::time::Instant;

use super::event::{DedupeSlot, MediaEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
	Idle,
	Pending { deadline: Instant },
}

#[derive(Debug)]
pub struct Debouncer {
	window: Duration,
	state: DebounceState,
	pending: Vec<MediaEvent>,
}

impl Debouncer {
	#[must_use]
	pub const fn new(window: Duration) -> Self {
		Self {
			window,
			state: DebounceState::Idle,
			pending: Vec::new(),
		}
	}

	#[must_use]
	pub const fn window(&self) -> Duration {
		self.window
	}

	#[must_use]
	pub const fn state(&self) -> DebounceState {
		self.state
	}

	#[must_use]
	pub const fn deadline(&self) -> Option<Instant> {
		match self.state {
			DebounceState::Idle => None,
			DebounceState::Pending { deadline } => Some(deadline),
		}
	}

	/// Events waiting for the next fire, duplicates included.
	#[must_use]
	pub fn pending(&self) -> &[MediaEvent] {
		&self.pending
	}

	/// Queues `event`, returning the deadline when this push started a burst.
	pub fn push(&mut self, event: MediaEvent, now: Instant) -> Option<Instant> {
		self.pending.push(event.normalized());

		match self.state {
			DebounceState::Pending { .. } => None,
			DebounceState::Idle => {
				let deadline = now + self.window;
				self.state = DebounceState::Pending { deadline };
				Some(deadline)
			}
		}
	}

	/// Ends the burst. Nothing comes out when no event was pushed.
	pub fn fire(&mut self) -> Option<CoalescedBatch> {
		self.state = DebounceState::Idle;

		if self.pending.is_empty() {
			return None;
		}

		Some(CoalescedBatch::coalesce(std::mem::take(&mut self.pending)))
	}

	/// Drops the pending burst without emitting it.
	pub fn cancel(&mut self) {
		self.state = DebounceState::Idle;
		self.pending.clear();
	}
}

/// Events of one burst, at most one per path and kind of change.
///
/// Add, update and delete of a path all describe its content and replace each
/// other, so `[add /a, update /a, add /b]` coalesces to `[update /a, add /b]`.
/// Thumbnails and refreshes are kept apart from content changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoalescedBatch(Vec<MediaEvent>);

impl CoalescedBatch {
	/// Keeps the position of the first event of each slot and the value of
	/// its last one.
	#[must_use]
	pub fn coalesce(events: impl IntoIterator<Item = MediaEvent>) -> Self {
		let mut seen = HashMap::<(DedupeSlot, String), usize>::new();
		let mut out = Vec::new();

		for event in events {
			let key = (event.kind.dedupe_slot(), event.path.clone());

			match seen.get(&key) {
				Some(&idx) => out[idx] = event,
				None => {
					seen.insert(key, out.len());
					out.push(event);
				}
			}
		}

		Self(out)
	}

	#[must_use]
	pub fn events(&self) -> &[MediaEvent] {
		&self.0
	}

	#[must_use]
	pub fn into_events(self) -> Vec<MediaEvent> {
		self.0
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn into_payload(self) -> sr_rpc::Result<Value> {
		Ok(serde_json::to_value(self)?)
	}

	/// The `data` message carrying this batch.
	pub fn into_message(self) -> sr_rpc::Result<PushMessage> {
		self.into_payload().map(PushMessage::Data)
	}
}
