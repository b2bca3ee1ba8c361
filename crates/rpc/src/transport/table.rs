use std::{
	collections::{hash_map::Entry as MapEntry, HashMap},
	panic::{catch_unwind, AssertUnwindSafe},
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, warn};

use crate::{source::Unsubscribe, wire::SubscriptionId};

use super::ConnectionId;

/// Per subscription emission gate.
///
/// Every message forwarded for a subscription is sent while holding the gate,
/// and the table closes it while holding its own lock. Once a subscription is
/// removed nothing else goes out for it, regardless of what the source still
/// has in flight. Lock order is always table, then gate.
#[derive(Debug)]
pub(crate) struct Gate {
	open: Mutex<bool>,
}

impl Gate {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self {
			open: Mutex::new(true),
		})
	}

	pub(crate) fn emit<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
		let open = self.lock();
		(*open).then(f)
	}

	/// Like [`Gate::emit`], closing the gate in the same critical section.
	pub(crate) fn emit_terminal<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
		let mut open = self.lock();
		if !*open {
			return None;
		}

		*open = false;
		Some(f())
	}

	pub(crate) fn close(&self) {
		*self.lock() = false;
	}

	#[cfg(test)]
	pub(crate) fn is_open(&self) -> bool {
		*self.lock()
	}

	fn lock(&self) -> MutexGuard<'_, bool> {
		self.open.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

enum Slot {
	/// Id reserved, the subscription handler hasn't returned yet.
	Opening,
	Active(Unsubscribe),
}

struct Entry {
	owner: ConnectionId,
	gate: Arc<Gate>,
	slot: Slot,
}

/// What [`SubscriptionTable::cleanup`] should remove.
#[derive(Debug, Clone, Copy)]
pub enum Cleanup<'a> {
	/// A single subscription, only if `owner` opened it.
	Subscription {
		owner: ConnectionId,
		id: &'a SubscriptionId,
	},
	/// Everything a connection owns.
	Connection(ConnectionId),
}

/// Every live subscription of the process, keyed by subscription id.
///
/// One table is shared by all connections of an [`Adapter`](super::Adapter),
/// which is what makes ids unique process wide.
#[derive(Default)]
pub struct SubscriptionTable {
	entries: Mutex<HashMap<SubscriptionId, Entry>>,
}

impl SubscriptionTable {
	#[must_use]
	pub fn new() -> Arc<Self> {
		Arc::default()
	}

	/// Reserves `id` for `owner`, false if the id is taken.
	pub(crate) fn reserve(&self, id: SubscriptionId, owner: ConnectionId, gate: Arc<Gate>) -> bool {
		match self.lock().entry(id) {
			MapEntry::Occupied(_) => false,
			MapEntry::Vacant(slot) => {
				slot.insert(Entry {
					owner,
					gate,
					slot: Slot::Opening,
				});
				true
			}
		}
	}

	/// Stores the handle of a started source in its reserved slot.
	///
	/// Hands the handle back when the slot is gone, meaning the subscription
	/// was cancelled or already terminated while it was opening.
	pub(crate) fn activate(
		&self,
		id: &SubscriptionId,
		gate: &Arc<Gate>,
		handle: Unsubscribe,
	) -> Result<(), Unsubscribe> {
		let mut entries = self.lock();

		match entries.get_mut(id) {
			Some(entry)
				if Arc::ptr_eq(&entry.gate, gate) && matches!(entry.slot, Slot::Opening) =>
			{
				entry.slot = Slot::Active(handle);
				Ok(())
			}
			_ => Err(handle),
		}
	}

	/// Removes a subscription that reached a terminal message.
	pub(crate) fn release(&self, id: &SubscriptionId, gate: &Arc<Gate>) -> Option<Unsubscribe> {
		let entry = {
			let mut entries = self.lock();
			let same = entries
				.get(id)
				.is_some_and(|entry| Arc::ptr_eq(&entry.gate, gate));

			if same {
				entries.remove(id)
			} else {
				None
			}
		}?;

		entry.gate.close();

		match entry.slot {
			Slot::Active(handle) => Some(handle),
			Slot::Opening => None,
		}
	}

	/// Removes subscriptions and cancels their sources, returning how many
	/// were removed.
	///
	/// Gates are closed under the table lock, sources are cancelled after it
	/// is released. A panicking cancel hook is logged and swallowed.
	pub fn cleanup(&self, target: Cleanup<'_>) -> usize {
		let removed = {
			let mut entries = self.lock();

			let ids = match target {
				Cleanup::Subscription { owner, id } => entries
					.get(id)
					.filter(|entry| entry.owner == owner)
					.map(|_| vec![id.clone()])
					.unwrap_or_default(),
				Cleanup::Connection(owner) => entries
					.iter()
					.filter(|(_, entry)| entry.owner == owner)
					.map(|(id, _)| id.clone())
					.collect(),
			};

			ids.into_iter()
				.filter_map(|id| entries.remove(&id).map(|entry| (id, entry)))
				.inspect(|(_, entry)| entry.gate.close())
				.collect::<Vec<_>>()
		};

		let count = removed.len();

		for (id, entry) in removed {
			match entry.slot {
				Slot::Active(handle) => cancel_quietly(&id, handle),
				// Cancelled once the handler hands its source over
				Slot::Opening => debug!(%id, "Subscription removed while opening"),
			}
		}

		count
	}

	#[must_use]
	pub fn contains(&self, id: &SubscriptionId) -> bool {
		self.lock().contains_key(id)
	}

	#[must_use]
	pub fn owned_by(&self, owner: ConnectionId) -> usize {
		self.lock()
			.values()
			.filter(|entry| entry.owner == owner)
			.count()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.lock().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Entry>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

pub(crate) fn cancel_quietly(id: &SubscriptionId, mut handle: Unsubscribe) {
	if catch_unwind(AssertUnwindSafe(|| handle.cancel())).is_err() {
		warn!(%id, "Unsubscribe hook panicked, ignoring");
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use tracing_test::traced_test;

	use super::*;

	fn counting(cancels: &Arc<AtomicUsize>) -> Unsubscribe {
		let cancels = Arc::clone(cancels);
		Unsubscribe::new(move || {
			cancels.fetch_add(1, Ordering::SeqCst);
		})
	}

	fn active(
		table: &SubscriptionTable,
		id: &str,
		owner: ConnectionId,
		handle: Unsubscribe,
	) -> Arc<Gate> {
		let gate = Gate::new();
		assert!(table.reserve(id.into(), owner, Arc::clone(&gate)));
		assert!(table.activate(&id.into(), &gate, handle).is_ok());
		gate
	}

	#[test]
	fn ids_are_unique_across_owners() {
		let table = SubscriptionTable::default();
		let (a, b) = (ConnectionId::new(), ConnectionId::new());

		assert!(table.reserve("s1".into(), a, Gate::new()));
		assert!(!table.reserve("s1".into(), b, Gate::new()));
		assert_eq!(table.owned_by(a), 1);
		assert_eq!(table.owned_by(b), 0);
	}

	#[test]
	fn cleanup_only_touches_the_owner() {
		let table = SubscriptionTable::default();
		let cancels = Arc::new(AtomicUsize::new(0));
		let (a, b) = (ConnectionId::new(), ConnectionId::new());
		let id = SubscriptionId::from("s1");

		let gate = active(&table, "s1", a, counting(&cancels));

		assert_eq!(table.cleanup(Cleanup::Subscription { owner: b, id: &id }), 0);
		assert!(gate.is_open());

		assert_eq!(table.cleanup(Cleanup::Subscription { owner: a, id: &id }), 1);
		assert_eq!(table.cleanup(Cleanup::Subscription { owner: a, id: &id }), 0);
		assert!(!gate.is_open());
		assert_eq!(cancels.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn connection_cleanup_cancels_everything_it_owns() {
		let table = SubscriptionTable::default();
		let cancels = Arc::new(AtomicUsize::new(0));
		let (a, b) = (ConnectionId::new(), ConnectionId::new());

		for id in ["a1", "a2", "a3"] {
			active(&table, id, a, counting(&cancels));
		}
		let other = active(&table, "b1", b, counting(&cancels));

		assert_eq!(table.cleanup(Cleanup::Connection(a)), 3);
		assert_eq!(cancels.load(Ordering::SeqCst), 3);
		assert_eq!(table.len(), 1);
		assert!(other.is_open());
	}

	#[test]
	fn removed_while_opening_hands_the_handle_back() {
		let table = SubscriptionTable::default();
		let cancels = Arc::new(AtomicUsize::new(0));
		let owner = ConnectionId::new();
		let id = SubscriptionId::from("s1");
		let gate = Gate::new();

		assert!(table.reserve(id.clone(), owner, Arc::clone(&gate)));
		assert_eq!(table.cleanup(Cleanup::Subscription { owner, id: &id }), 1);

		let handle = table.activate(&id, &gate, counting(&cancels)).unwrap_err();
		cancel_quietly(&id, handle);
		assert_eq!(cancels.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn release_ignores_a_reused_id() {
		let table = SubscriptionTable::default();
		let owner = ConnectionId::new();
		let id = SubscriptionId::from("s1");

		let old = Gate::new();
		assert!(table.reserve(id.clone(), owner, Arc::clone(&old)));
		assert!(table.release(&id, &old).is_none());

		let new = Gate::new();
		assert!(table.reserve(id.clone(), owner, Arc::clone(&new)));
		assert!(table.release(&id, &old).is_none());
		assert!(table.contains(&id));
	}

	#[test]
	#[traced_test]
	fn panicking_unsubscribe_is_swallowed() {
		let table = SubscriptionTable::default();
		let owner = ConnectionId::new();

		active(&table, "s1", owner, Unsubscribe::new(|| panic!("oops")));

		assert_eq!(table.cleanup(Cleanup::Connection(owner)), 1);
		assert!(table.is_empty());
		assert!(logs_contain("Unsubscribe hook panicked"));
	}

	#[test]
	fn gate_blocks_after_terminal() {
		let gate = Gate::new();

		assert_eq!(gate.emit(|| 1), Some(1));
		assert_eq!(gate.emit_terminal(|| 2), Some(2));
		assert_eq!(gate.emit(|| 3), None);
		assert_eq!(gate.emit_terminal(|| 4), None);
	}
}
