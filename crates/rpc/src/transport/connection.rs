use std::{
	panic::{catch_unwind, AssertUnwindSafe},
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::{
	caller::Caller,
	error::Error,
	procedure::ProcedureKind,
	source::Observer,
	wire::{
		ClientMessage, PushMessage, RequestEnvelope, ResponseEnvelope, ServerMessage,
		SubscriptionId, SubscriptionOpenRequest, UnsubscribeRequest,
	},
};

use super::{
	table::{cancel_quietly, Cleanup, Gate, SubscriptionTable},
	ConnectionId,
};

/// Lifecycle hook of a connection, handed to the host.
///
/// Closing tears the connection down exactly as if its inbound channel ended.
#[derive(Debug, Clone, Default)]
pub struct ConnectionCloser {
	token: CancellationToken,
}

impl ConnectionCloser {
	pub fn close(&self) {
		self.token.cancel();
	}

	#[must_use]
	pub fn is_closed(&self) -> bool {
		self.token.is_cancelled()
	}

	pub async fn closed(&self) {
		self.token.cancelled().await;
	}
}

/// Write half of a connection, shared by every task serving it.
pub(crate) struct Outbound {
	connection: ConnectionId,
	tx: mpsc::UnboundedSender<ServerMessage>,
	destroyed: AtomicBool,
	table: Arc<SubscriptionTable>,
	closer: ConnectionCloser,
}

impl Outbound {
	pub(crate) fn is_destroyed(&self) -> bool {
		self.destroyed.load(Ordering::SeqCst)
	}

	/// False if the message could not be written, the connection is then
	/// considered gone.
	pub(crate) fn send(&self, msg: ServerMessage) -> bool {
		if self.is_destroyed() {
			return false;
		}

		if self.tx.send(msg).is_err() {
			self.destroyed.store(true, Ordering::SeqCst);
			return false;
		}

		true
	}

	/// Marks the connection destroyed and removes everything it owns.
	pub(crate) fn teardown(&self) -> usize {
		let first = !self.destroyed.swap(true, Ordering::SeqCst);
		let removed = self.table.cleanup(Cleanup::Connection(self.connection));
		self.closer.close();

		if first || removed > 0 {
			debug!(connection = %self.connection, removed, "Connection torn down");
		}

		removed
	}
}

/// Forwards what a source emits onto the connection, tagged with the
/// subscription id.
struct Forwarder {
	id: SubscriptionId,
	gate: Arc<Gate>,
	outbound: Arc<Outbound>,
	table: Arc<SubscriptionTable>,
}

impl Forwarder {
	fn push(&self, message: PushMessage) -> ServerMessage {
		ServerMessage::Push {
			id: self.id.clone(),
			message,
		}
	}

	fn finish(&self, message: PushMessage) {
		let sent = self
			.gate
			.emit_terminal(|| self.outbound.send(self.push(message)));

		if sent.is_none() {
			trace!(id = %self.id, "Terminal message after removal dropped");
			return;
		}

		if let Some(handle) = self.table.release(&self.id, &self.gate) {
			cancel_quietly(&self.id, handle);
		}

		if sent == Some(false) {
			self.outbound.teardown();
		}
	}
}

impl Observer for Forwarder {
	fn on_data(&self, payload: serde_json::Value) {
		let sent = self
			.gate
			.emit(|| self.outbound.send(self.push(PushMessage::Data(payload))));

		match sent {
			Some(true) => {}
			Some(false) => {
				self.outbound.teardown();
			}
			None => trace!(id = %self.id, "Data after removal dropped"),
		}
	}

	fn on_error(&self, error: Error) {
		self.finish(PushMessage::Error(sanitize(error).to_shape()));
	}

	fn on_complete(&self) {
		self.finish(PushMessage::Complete);
	}
}

/// One window's session with the backend.
pub struct Connection<Ctx> {
	id: ConnectionId,
	caller: Caller<Ctx>,
	table: Arc<SubscriptionTable>,
	outbound: Arc<Outbound>,
	closer: ConnectionCloser,
}

impl<Ctx> Connection<Ctx>
where
	Ctx: Clone + Send + Sync + 'static,
{
	pub(crate) fn new(
		id: ConnectionId,
		caller: Caller<Ctx>,
		table: Arc<SubscriptionTable>,
		tx: mpsc::UnboundedSender<ServerMessage>,
	) -> Self {
		let closer = ConnectionCloser::default();

		Self {
			id,
			caller,
			outbound: Arc::new(Outbound {
				connection: id,
				tx,
				destroyed: AtomicBool::new(false),
				table: Arc::clone(&table),
				closer: closer.clone(),
			}),
			table,
			closer,
		}
	}

	#[must_use]
	pub const fn id(&self) -> ConnectionId {
		self.id
	}

	#[must_use]
	pub fn closer(&self) -> ConnectionCloser {
		self.closer.clone()
	}

	/// Serves inbound messages until the channel ends or the connection is
	/// closed, then tears the connection down.
	#[instrument(name = "connection", skip_all, fields(id = %self.id))]
	pub async fn serve(self, mut inbound: mpsc::UnboundedReceiver<ClientMessage>) {
		debug!("Connection opened");

		loop {
			tokio::select! {
				biased;

				() = self.closer.closed() => break,

				msg = inbound.recv() => match msg {
					Some(msg) => self.dispatch(msg),
					None => break,
				},
			}
		}

		let removed = self.outbound.teardown();
		debug!(removed, "Connection closed");
	}

	fn dispatch(&self, msg: ClientMessage) {
		match msg {
			ClientMessage::Request(request) => self.request(request),
			ClientMessage::Subscribe(open) => self.subscribe(open),
			ClientMessage::Unsubscribe(UnsubscribeRequest { id }) => {
				let removed = self.table.cleanup(Cleanup::Subscription {
					owner: self.id,
					id: &id,
				});

				if removed == 0 {
					trace!(%id, "Unsubscribe for an unknown subscription ignored");
				} else {
					debug!(%id, "Unsubscribed");
				}
			}
		}
	}

	fn request(&self, RequestEnvelope { id, path, kind, input }: RequestEnvelope) {
		let caller = self.caller.clone();
		let outbound = Arc::clone(&self.outbound);

		tokio::spawn(async move {
			debug!(id, %path, %kind, "Dispatching request");

			let result = caller.call(kind, &path, input).await.map_err(sanitize);

			if !outbound.send(ServerMessage::Response {
				id,
				body: ResponseEnvelope::from(result),
			}) {
				debug!(id, %path, "Response dropped, connection gone");
				outbound.teardown();
			}
		});
	}

	/// The id is reserved right away so an unsubscribe following the open on
	/// the same connection always finds it.
	fn subscribe(&self, SubscriptionOpenRequest { id, path, input }: SubscriptionOpenRequest) {
		if self.outbound.is_destroyed() {
			debug!(%id, %path, "Subscription opened on a destroyed connection, ignoring");
			return;
		}

		if let Some(kind) = self
			.caller
			.kind_of(&path)
			.filter(|kind| *kind != ProcedureKind::Subscription)
		{
			warn!(
				%id,
				%path,
				%kind,
				"Subscription opened on a non subscription procedure, abandoning"
			);
			return;
		}

		let gate = Gate::new();
		if !self.table.reserve(id.clone(), self.id, Arc::clone(&gate)) {
			warn!(%id, %path, "Subscription id already in use, ignoring");
			return;
		}

		// Teardown may have run between the check above and the reservation
		if self.outbound.is_destroyed() {
			self.table.cleanup(Cleanup::Subscription {
				owner: self.id,
				id: &id,
			});
			return;
		}

		let forwarder = Arc::new(Forwarder {
			id: id.clone(),
			gate: Arc::clone(&gate),
			outbound: Arc::clone(&self.outbound),
			table: Arc::clone(&self.table),
		});
		let caller = self.caller.clone();
		let table = Arc::clone(&self.table);

		tokio::spawn(async move {
			debug!(%id, %path, "Opening subscription");

			let source = match caller.open(&path, input).await {
				Ok(source) => source,
				Err(e) => {
					forwarder.on_error(e);
					return;
				}
			};

			let observer: Arc<dyn Observer> = forwarder.clone();
			match catch_unwind(AssertUnwindSafe(|| source.subscribe(observer))) {
				Ok(handle) => {
					if let Err(handle) = table.activate(&id, &gate, handle) {
						cancel_quietly(&id, handle);
					}
				}
				Err(_) => forwarder.on_error(Error::internal(format!(
					"subscription '{path}' panicked while starting"
				))),
			}
		});
	}
}

/// Client facing codes go out as they are, anything else is reported as an
/// internal error.
fn sanitize(error: Error) -> Error {
	if error.code().is_client_facing() {
		return error;
	}

	warn!(?error, "Procedure failed");
	Error::internal(error.message())
}
