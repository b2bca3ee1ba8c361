//! # RPC core
//!
//! A static registry of named procedures (queries, mutations and
//! subscriptions) bound to a caller context, and a transport that serves the
//! registry to windows over a multiplexed message channel.
//!
//! ```
//! use std::sync::Arc;
//!
//! use sr_rpc::Registry;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = Arc::new(
//! 	Registry::builder()
//! 		.query("version", |(), (): ()| async { Ok("0.1.0") })
//! 		.build()
//! 		.unwrap(),
//! );
//!
//! let version: String = registry.caller(()).query("version", ()).await.unwrap();
//! assert_eq!(version, "0.1.0");
//! # }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod caller;
mod error;
mod procedure;
mod registry;
mod source;
pub mod transport;
mod wire;

pub use caller::{BoundProcedure, Caller};
pub use error::{Error, ErrorCode, ErrorShape, NotFound, RegistryError, Result};
pub use procedure::{ProcedureDescriptor, ProcedureKind};
pub use registry::{Node, Registry, RegistryBuilder, PATH_SEPARATOR};
pub use source::{BoxedSource, Observer, PushSource, StreamSource, Unsubscribe};
pub use transport::{
	Adapter, Cleanup, Connection, ConnectionCloser, ConnectionId, Peer, SubscriptionTable,
};
pub use wire::{
	ClientMessage, PushMessage, RequestEnvelope, ResponseEnvelope, ServerMessage, SubscriptionId,
	SubscriptionOpenRequest, UnsubscribeRequest,
};
