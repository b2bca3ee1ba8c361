use std::collections::HashMap;

use strum::IntoEnumIterator;
use tokio::sync::broadcast;
use tracing::trace;

use super::event::{MediaEvent, MediaEventKind};

/// Fan out point for media events, one broadcast channel per event kind.
///
/// Each kind is an independent feed: a slow listener lagging on thumbnails
/// doesn't lose deletes.
#[derive(Debug)]
pub struct MediaEventBus {
	feeds: HashMap<MediaEventKind, broadcast::Sender<MediaEvent>>,
}

impl MediaEventBus {
	/// `capacity` is per feed, see [`broadcast::channel`].
	#[must_use]
	pub fn new(capacity: usize) -> Self {
		Self {
			feeds: MediaEventKind::iter()
				.map(|kind| (kind, broadcast::channel(capacity.max(1)).0))
				.collect(),
		}
	}

	/// Returns how many listeners got the event.
	pub fn emit(&self, event: MediaEvent) -> usize {
		let event = event.normalized();

		let Some(feed) = self.feeds.get(&event.kind) else {
			return 0;
		};

		feed.send(event).unwrap_or_else(|broadcast::error::SendError(event)| {
			trace!(?event, "Media event emitted with nobody listening");
			0
		})
	}

	/// Listens to a single kind of event.
	#[must_use]
	pub fn listen(&self, kind: MediaEventKind) -> Option<broadcast::Receiver<MediaEvent>> {
		self.feeds.get(&kind).map(broadcast::Sender::subscribe)
	}

	/// Listens to every feed, in [`MediaEventKind`] declaration order.
	#[must_use]
	pub fn feeds(&self) -> Vec<broadcast::Receiver<MediaEvent>> {
		MediaEventKind::iter()
			.filter_map(|kind| self.listen(kind))
			.collect()
	}

	#[must_use]
	pub fn listeners(&self) -> usize {
		self.feeds.values().map(broadcast::Sender::receiver_count).sum()
	}
}

impl Default for MediaEventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}

#[cfg(test)]
mod tests {
	use tracing_test::traced_test;

	use super::*;

	#[test]
	#[traced_test]
	fn feeds_are_split_by_kind() {
		let bus = MediaEventBus::new(8);
		let mut deletes = bus.listen(MediaEventKind::Delete).unwrap();
		let mut adds = bus.listen(MediaEventKind::Add).unwrap();

		assert_eq!(bus.emit(MediaEvent::delete("/a.mp4")), 1);
		assert_eq!(bus.emit(MediaEvent::thumbnail("/a.mp4")), 0);

		assert_eq!(deletes.try_recv().unwrap(), MediaEvent::delete("/a.mp4"));
		assert!(adds.try_recv().is_err());
		assert!(logs_contain("nobody listening"));
	}

	#[test]
	fn every_kind_has_a_feed() {
		let bus = MediaEventBus::default();
		let feeds = bus.feeds();

		assert_eq!(feeds.len(), MediaEventKind::iter().count());
		assert_eq!(bus.listeners(), feeds.len());

		drop(feeds);
		assert_eq!(bus.listeners(), 0);
	}
}
