//! Bridges the registry to windows over a multiplexed message channel.
//!
//! Each window gets a [`Connection`]: requests are answered exactly once,
//! subscriptions stream [`PushMessage`](crate::PushMessage)s tagged with their
//! id, and when the window goes away everything it opened is cancelled.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

use crate::{
	registry::Registry,
	wire::{ClientMessage, ServerMessage},
};

mod connection;
mod table;

pub use connection::{Connection, ConnectionCloser};
pub use table::{Cleanup, SubscriptionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for ConnectionId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for ConnectionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

type ContextFactory<Ctx> = Arc<dyn Fn(ConnectionId) -> Ctx + Send + Sync>;

/// Hands out connections sharing one registry and one subscription table.
pub struct Adapter<Ctx> {
	registry: Arc<Registry<Ctx>>,
	table: Arc<SubscriptionTable>,
	context: ContextFactory<Ctx>,
}

impl<Ctx> Clone for Adapter<Ctx> {
	fn clone(&self) -> Self {
		Self {
			registry: Arc::clone(&self.registry),
			table: Arc::clone(&self.table),
			context: Arc::clone(&self.context),
		}
	}
}

impl<Ctx> Adapter<Ctx>
where
	Ctx: Clone + Send + Sync + 'static,
{
	/// `context` builds the context every procedure of a connection is bound to.
	pub fn new(
		registry: Arc<Registry<Ctx>>,
		table: Arc<SubscriptionTable>,
		context: impl Fn(ConnectionId) -> Ctx + Send + Sync + 'static,
	) -> Self {
		Self {
			registry,
			table,
			context: Arc::new(context),
		}
	}

	#[must_use]
	pub const fn registry(&self) -> &Arc<Registry<Ctx>> {
		&self.registry
	}

	#[must_use]
	pub const fn table(&self) -> &Arc<SubscriptionTable> {
		&self.table
	}

	/// A connection writing everything it has to say into `outbound`.
	pub fn connection(&self, outbound: mpsc::UnboundedSender<ServerMessage>) -> Connection<Ctx> {
		let id = ConnectionId::new();

		Connection::new(
			id,
			self.registry.caller((self.context)(id)),
			Arc::clone(&self.table),
			outbound,
		)
	}

	/// Spawns a connection served over a pair of fresh channels, handing back
	/// the window's end of them.
	#[must_use]
	pub fn connect(&self) -> Peer {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

		let connection = self.connection(outbound_tx);
		let id = connection.id();
		let closer = connection.closer();

		Peer {
			id,
			tx: inbound_tx,
			rx: outbound_rx,
			closer,
			task: tokio::spawn(connection.serve(inbound_rx)),
		}
	}
}

/// The window side of a spawned [`Connection`].
pub struct Peer {
	pub id: ConnectionId,
	pub tx: mpsc::UnboundedSender<ClientMessage>,
	pub rx: mpsc::UnboundedReceiver<ServerMessage>,
	pub closer: ConnectionCloser,
	pub task: JoinHandle<()>,
}

impl Peer {
	/// False once the connection stopped reading.
	pub fn send(&self, msg: ClientMessage) -> bool {
		self.tx.send(msg).is_ok()
	}

	pub async fn recv(&mut self) -> Option<ServerMessage> {
		self.rx.recv().await
	}
}
