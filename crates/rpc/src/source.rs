//! Push sources: what a subscription procedure hands back to the transport.
//!
//! A source is started exactly once with an [`Observer`] and returns an
//! [`Unsubscribe`] handle. The transport only ever talks to these two traits,
//! so any producer (the coalescing media source, a plain stream, a test
//! double) plugs in the same way.

use std::{fmt, pin::pin, sync::Arc};

use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use super::error::Error;

/// Receives what a [`PushSource`] emits.
///
/// A well behaved source calls `on_data` zero or more times and then at most
/// one of `on_error` / `on_complete`, never concurrently for the same observer.
pub trait Observer: Send + Sync + 'static {
	fn on_data(&self, payload: Value);
	fn on_error(&self, error: Error);
	fn on_complete(&self);
}

pub trait PushSource: Send + 'static {
	fn subscribe(self: Box<Self>, observer: Arc<dyn Observer>) -> Unsubscribe;
}

pub type BoxedSource = Box<dyn PushSource>;

/// Cancellation hook of a started [`PushSource`].
///
/// Calling [`Unsubscribe::cancel`] more than once is a no-op, and dropping the
/// handle cancels the source as well.
#[must_use = "dropping an `Unsubscribe` cancels the source right away"]
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send>>);

impl Unsubscribe {
	pub fn new(on_cancel: impl FnOnce() + Send + 'static) -> Self {
		Self(Some(Box::new(on_cancel)))
	}

	pub fn noop() -> Self {
		Self(None)
	}

	pub fn cancel(&mut self) {
		if let Some(on_cancel) = self.0.take() {
			on_cancel();
		}
	}

	#[must_use]
	pub const fn is_cancelled(&self) -> bool {
		self.0.is_none()
	}
}

impl Drop for Unsubscribe {
	fn drop(&mut self) {
		self.cancel();
	}
}

impl fmt::Debug for Unsubscribe {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Unsubscribe")
			.field(&if self.is_cancelled() {
				"cancelled"
			} else {
				"armed"
			})
			.finish()
	}
}

/// Drives a [`Stream`] on the tokio runtime and forwards its items.
///
/// `Ok` items become data, the first `Err` is terminal, and the end of the
/// stream completes the subscription.
pub struct StreamSource<S> {
	stream: S,
}

impl<S> StreamSource<S> {
	pub const fn new(stream: S) -> Self {
		Self { stream }
	}
}

impl<S, T> PushSource for StreamSource<S>
where
	S: Stream<Item = Result<T, Error>> + Send + 'static,
	T: Serialize + Send + 'static,
{
	fn subscribe(self: Box<Self>, observer: Arc<dyn Observer>) -> Unsubscribe {
		let handle = tokio::spawn(async move {
			let mut stream = pin!(self.stream);

			while let Some(item) = stream.next().await {
				match item.and_then(|item| serde_json::to_value(item).map_err(Error::from)) {
					Ok(payload) => observer.on_data(payload),
					Err(e) => {
						observer.on_error(e);
						return;
					}
				}
			}

			observer.on_complete();
		});

		Unsubscribe::new(move || handle.abort())
	}
}
