use std::{
	pin::Pin,
	task::{Context, Poll},
	time::Duration,
};

use futures::Stream;
use tokio::{
	sync::{broadcast, mpsc},
	task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
	bus::MediaEventBus,
	debounce::CoalescedBatch,
	event::MediaEvent,
	source::drive,
};

/// One way feed of coalesced batches for hosts that can only push, like the
/// mobile shells.
///
/// There is no open or unsubscribe handshake: the feed runs while the stream is
/// alive and dropping it cancels everything.
#[derive(Debug)]
pub struct RemoteFeed {
	rx: mpsc::UnboundedReceiver<CoalescedBatch>,
	stop: CancellationToken,
	handle: JoinHandle<()>,
}

impl RemoteFeed {
	#[must_use]
	pub fn new(bus: &MediaEventBus, window: Duration) -> Self {
		Self::with_feeds(bus.feeds(), window)
	}

	#[must_use]
	pub fn with_feeds(feeds: Vec<broadcast::Receiver<MediaEvent>>, window: Duration) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let stop = CancellationToken::new();

		let handle = tokio::spawn({
			let stop = stop.clone();
			async move {
				let ended = drive(feeds, window, stop, move |batch| tx.send(batch).is_ok()).await;
				debug!(?ended, "Remote media feed stopped");
			}
		});

		Self { rx, stop, handle }
	}

	pub fn cancel(&self) {
		self.stop.cancel();
	}
}

impl Stream for RemoteFeed {
	type Item = CoalescedBatch;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		self.rx.poll_recv(cx)
	}
}

impl Drop for RemoteFeed {
	fn drop(&mut self) {
		self.stop.cancel();
		self.handle.abort();
	}
}
