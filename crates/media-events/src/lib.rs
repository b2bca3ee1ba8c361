//! Media library change notifications for the windows.
//!
//! Producers emit [`MediaEvent`]s on the [`MediaEventBus`]. Windows get them
//! through a [`CoalescingSource`] subscription, or a [`RemoteFeed`] on hosts
//! that only support one way pushes, so that a burst of changes (a folder
//! import, a batch of thumbnails) turns into a single deduplicated batch.

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

use std::time::Duration;

mod bus;
mod debounce;
mod event;
mod feed;
mod source;

pub use bus::MediaEventBus;
pub use debounce::{CoalescedBatch, DebounceState, Debouncer};
pub use event::{MediaEvent, MediaEventKind, REFRESH_SENTINEL};
pub use feed::RemoteFeed;
pub use source::CoalescingSource;

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);
