use std::{pin::pin, sync::Arc, time::Duration};

use futures::{future, StreamExt};
use futures_concurrency::stream::Merge;
use sr_rpc::{Observer, PushSource, Unsubscribe};
use tokio::{
	sync::broadcast,
	time::{sleep_until, Instant},
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::{
	bus::MediaEventBus,
	debounce::{CoalescedBatch, Debouncer},
	event::MediaEvent,
};

/// How a driver run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ended {
	/// Every feed closed, the last burst was flushed.
	Closed,
	Cancelled,
	/// The sink stopped accepting batches.
	Detached,
}

/// Debounces `feeds` until they all close or `stop` is cancelled, handing each
/// burst to `sink`. A `sink` returning false ends the run.
pub(crate) async fn drive(
	feeds: Vec<broadcast::Receiver<MediaEvent>>,
	window: Duration,
	stop: CancellationToken,
	mut sink: impl FnMut(CoalescedBatch) -> bool + Send,
) -> Ended {
	enum StreamMessage {
		Event(MediaEvent),
		Lagged(u64),
	}

	let mut debouncer = Debouncer::new(window);

	let mut msg_stream = pin!(feeds
		.into_iter()
		.map(|feed| {
			BroadcastStream::new(feed).map(|res| match res {
				Ok(event) => StreamMessage::Event(event),
				Err(BroadcastStreamRecvError::Lagged(missed)) => StreamMessage::Lagged(missed),
			})
		})
		.collect::<Vec<_>>()
		.merge());

	loop {
		let deadline = debouncer.deadline();

		tokio::select! {
			biased;

			() = stop.cancelled() => {
				debouncer.cancel();
				return Ended::Cancelled;
			}

			() = wait_until(deadline) => {
				if let Some(batch) = debouncer.fire() {
					trace!(events = batch.len(), "Emitting coalesced media events");
					if !sink(batch) {
						return Ended::Detached;
					}
				}
			}

			msg = msg_stream.next() => match msg {
				Some(StreamMessage::Event(event)) => {
					debouncer.push(event, Instant::now());
				}

				Some(StreamMessage::Lagged(missed)) => {
					warn!(missed, "Media event feed lagged, asking for a refresh");
					debouncer.push(MediaEvent::refresh(), Instant::now());
				}

				None => {
					if let Some(batch) = debouncer.fire() {
						sink(batch);
					}
					return Ended::Closed;
				}
			},
		}
	}
}

async fn wait_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => sleep_until(deadline).await,
		None => future::pending().await,
	}
}

/// Subscription source turning bursts of media events into single `data`
/// messages.
///
/// No batch is handed to the observer once the source is cancelled, unless it
/// was already being delivered on another worker thread. The transport's
/// emission gate drops that last one.
#[derive(Debug)]
pub struct CoalescingSource {
	feeds: Vec<broadcast::Receiver<MediaEvent>>,
	window: Duration,
}

impl CoalescingSource {
	/// Starts listening right away, events sent before the source is
	/// subscribed are not lost.
	#[must_use]
	pub fn new(bus: &MediaEventBus, window: Duration) -> Self {
		Self::with_feeds(bus.feeds(), window)
	}

	#[must_use]
	pub const fn with_feeds(feeds: Vec<broadcast::Receiver<MediaEvent>>, window: Duration) -> Self {
		Self { feeds, window }
	}
}

impl PushSource for CoalescingSource {
	fn subscribe(self: Box<Self>, observer: Arc<dyn Observer>) -> Unsubscribe {
		let Self { feeds, window } = *self;
		let stop = CancellationToken::new();

		let handle = tokio::spawn({
			let stop = stop.clone();

			async move {
				let forward = {
					let observer = Arc::clone(&observer);
					let stop = stop.clone();
					move |batch: CoalescedBatch| {
						if stop.is_cancelled() {
							return false;
						}

						match batch.into_payload() {
							Ok(payload) => observer.on_data(payload),
							Err(e) => error!(?e, "Failed to encode coalesced media events"),
						}
						true
					}
				};

				match drive(feeds, window, stop.clone(), forward).await {
					Ended::Closed if !stop.is_cancelled() => observer.on_complete(),
					Ended::Closed | Ended::Cancelled | Ended::Detached => {}
				}
			}
		});

		Unsubscribe::new(move || {
			debug!("Coalescing media source cancelled");
			stop.cancel();
			handle.abort();
		})
	}
}
