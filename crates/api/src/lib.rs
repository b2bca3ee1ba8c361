//! The media host: the procedures windows call, the collaborators they
//! reach and the bootstrap for config and logging.

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

use std::sync::Arc;

use sr_rpc::{Adapter, RegistryError, SubscriptionTable};

mod api;
pub mod config;
mod error;
mod library;
pub mod logging;
pub mod memory;

pub use api::{mount, Ctx};
pub use config::ApiConfig;
pub use error::ApiError;
pub use library::{MediaItem, MediaLibrary, SettingsStore, TagStore};

/// A transport adapter serving the mounted procedures, every connection
/// sharing `ctx`.
pub fn adapter(ctx: Ctx) -> Result<Adapter<Ctx>, RegistryError> {
	Ok(Adapter::new(
		Arc::new(mount()?),
		SubscriptionTable::new(),
		move |_| ctx.clone(),
	))
}
